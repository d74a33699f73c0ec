//! Axum application wiring.
//!
//! - `routes/`: login/logout and the demo endpoints
//! - `errors.rs`: consistent JSON error responses and challenges

use std::sync::Arc;

use axum::{Router, routing::get};
use warden_auth::{SecurityConfig, SecurityContext, SecurityError};

use crate::middleware;
use crate::session::SessionRegistry;

pub mod errors;
pub mod routes;

/// Shared by every handler: the security context, the zone served, and the
/// session registry backing `Session` token storage.
#[derive(Debug, Clone)]
pub struct AppState {
    pub security: Arc<SecurityContext>,
    pub zone: Arc<str>,
    pub sessions: SessionRegistry,
}

/// Build the router from a security document (entrypoint used by `main.rs`).
pub fn build_app(config: SecurityConfig, zone: &str) -> Result<Router, SecurityError> {
    let security = SecurityContext::from_config(config)?;
    router(Arc::new(security), zone)
}

/// Build the router over an existing context. Fails when `zone` is unknown.
pub fn router(security: Arc<SecurityContext>, zone: &str) -> Result<Router, SecurityError> {
    security.firewall(zone)?;

    Ok(assemble(AppState {
        security,
        zone: Arc::from(zone),
        sessions: SessionRegistry::new(),
    }))
}

fn assemble(state: AppState) -> Router {
    let protected = routes::protected_router().layer(axum::middleware::from_fn_with_state(
        state.clone(),
        middleware::guard,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::auth::router())
        .merge(protected)
        .with_state(state)
}
