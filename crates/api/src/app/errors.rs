use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use serde_json::json;

use warden_auth::SecurityError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// 401 with a Basic challenge naming the zone's realm.
pub fn unauthorized(realm: &str) -> axum::response::Response {
    let mut response = json_error(
        StatusCode::UNAUTHORIZED,
        "unauthenticated",
        "authentication required",
    );
    let challenge = format!("Basic realm=\"{}\"", realm.replace('"', "'"));
    if let Ok(value) = HeaderValue::from_str(&challenge) {
        response.headers_mut().insert(WWW_AUTHENTICATE, value);
    }
    response
}

pub fn forbidden() -> axum::response::Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", "access denied")
}

pub fn security_error(err: SecurityError) -> axum::response::Response {
    tracing::error!(error = %err, "security misconfiguration");
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "security_misconfigured",
        err.to_string(),
    )
}
