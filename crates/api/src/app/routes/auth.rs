use std::collections::HashMap;

use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;
use warden_auth::{FirewallState, RequestContext};

use crate::app::AppState;
use crate::app::errors::{json_error, security_error};
use crate::context::{CurrentUser, request_context, write_cookies};

/// Authentication provider handling `POST /login`.
pub const FORM_PROVIDER: &str = "Form";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    user: CurrentUser,
    /// Sealed token for clients of stateless zones.
    token: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let (mut ctx, session) = request_context("/login", &headers, &state.sessions);
    for (name, value) in form {
        ctx = ctx.with_form_field(name, value);
    }

    let mut response = attempt_login(&state, &mut ctx);
    write_cookies(&mut response, &ctx, &session, &state.sessions);
    response
}

fn attempt_login(state: &AppState, ctx: &mut RequestContext) -> Response {
    let mut firewall = match state.security.firewall(&state.zone) {
        Ok(firewall) => firewall,
        Err(e) => return security_error(e),
    };

    match firewall.process_login(ctx, Some(FORM_PROVIDER)) {
        Ok(true) if firewall.state() == FirewallState::Authenticated => {
            let token = firewall.token_string(ctx);
            let user = CurrentUser::from_user(firewall.user(ctx));
            (StatusCode::OK, Json(LoginResponse { user, token })).into_response()
        }
        Ok(true) => json_error(
            StatusCode::BAD_REQUEST,
            "missing_credentials",
            "username is required",
        ),
        Ok(false) => json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid username or password",
        ),
        Err(e) => security_error(e),
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (mut ctx, session) = request_context("/logout", &headers, &state.sessions);

    let mut response = match state.security.firewall(&state.zone) {
        Ok(mut firewall) => {
            let logged_out = firewall.process_logout(&mut ctx);
            Json(serde_json::json!({ "logged_out": logged_out })).into_response()
        }
        Err(e) => security_error(e),
    };
    write_cookies(&mut response, &ctx, &session, &state.sessions);
    response
}
