//! Translation between axum requests/responses and the security core.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use serde::Serialize;
use warden_auth::{RequestContext, ResponseCookie, User};

use crate::session::{SessionHandle, SessionRegistry};

/// Caller resolved by the firewall, available to handlers as an extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentUser {
    pub username: String,
    pub roles: Vec<String>,
    pub authenticated: bool,
    pub auth_provider: String,
    pub user_provider: String,
}

impl CurrentUser {
    pub fn from_user(user: &dyn User) -> Self {
        Self {
            username: user.username().to_string(),
            roles: user.roles().iter().map(|r| r.as_str().to_string()).collect(),
            authenticated: user.is_authenticated(),
            auth_provider: user.auth_provider_name().to_string(),
            user_provider: user.user_provider_name().to_string(),
        }
    }
}

/// Build the core's view of a request: path, headers, cookies, and the
/// client's session.
pub fn request_context(
    path: &str,
    headers: &HeaderMap,
    sessions: &SessionRegistry,
) -> (RequestContext, SessionHandle) {
    let mut ctx = RequestContext::new(path);
    for (name, value) in headers {
        if *name == COOKIE {
            continue;
        }
        if let Ok(value) = value.to_str() {
            ctx = ctx.with_header(name.as_str(), value);
        }
    }
    for raw in headers.get_all(COOKIE) {
        if let Ok(raw) = raw.to_str() {
            ctx = ctx.with_cookie_header(raw);
        }
    }

    let session = sessions.open(&ctx);
    let ctx = ctx.with_session(session.store.clone());
    (ctx, session)
}

/// Copy cookies queued by the core, plus a fresh session cookie, onto the
/// response.
pub fn write_cookies(
    response: &mut Response,
    ctx: &RequestContext,
    session: &SessionHandle,
    sessions: &SessionRegistry,
) {
    let cookies = ctx
        .response_cookies()
        .iter()
        .cloned()
        .chain(sessions.commit(session));
    for cookie in cookies {
        append_cookie(response.headers_mut(), &cookie);
    }
}

fn append_cookie(headers: &mut HeaderMap, cookie: &ResponseCookie) {
    match HeaderValue::from_str(&cookie.to_header_value()) {
        Ok(value) => {
            headers.append(SET_COOKIE, value);
        }
        Err(e) => tracing::warn!(cookie = %cookie.name, error = %e, "dropping unrepresentable cookie"),
    }
}
