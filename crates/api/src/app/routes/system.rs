use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::app::AppState;
use crate::context::CurrentUser;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn me(Extension(user): Extension<CurrentUser>) -> impl IntoResponse {
    Json(user)
}

pub async fn admin_dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> impl IntoResponse {
    Json(json!({
        "zone": state.zone.as_ref(),
        "welcome": user.username,
    }))
}

pub async fn public_info(Extension(user): Extension<CurrentUser>) -> impl IntoResponse {
    Json(json!({
        "authenticated": user.authenticated,
        "username": user.username,
    }))
}
