use axum::{Router, routing::get};

use super::AppState;

pub mod auth;
pub mod system;

/// Endpoints behind the firewall guard. Which of them need which roles is
/// decided by the zone's rules, not here.
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(system::me))
        .route("/admin/dashboard", get(system::admin_dashboard))
        .route("/public/info", get(system::public_info))
}
