use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use warden_auth::{RequestContext, SecurityError};

use crate::app::AppState;
use crate::app::errors::{forbidden, security_error, unauthorized};
use crate::context::{CurrentUser, request_context, write_cookies};

/// Authentication provider consulted for `Authorization: Basic` requests.
pub const HTTP_PROVIDER: &str = "Http";

/// Run the zone's firewall in front of a route.
///
/// Anonymous callers that are denied get a 401 Basic challenge; authenticated
/// callers that are denied get a 403. Granted requests carry a
/// [`CurrentUser`] extension.
pub async fn guard(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let (mut ctx, session) = request_context(&path, req.headers(), &state.sessions);

    let mut response = match authorize(&state, &mut ctx) {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(denied) => denied,
    };

    write_cookies(&mut response, &ctx, &session, &state.sessions);
    response
}

fn authorize(state: &AppState, ctx: &mut RequestContext) -> Result<CurrentUser, Response> {
    let mut firewall = state.security.firewall(&state.zone).map_err(security_error)?;

    let basic = ctx
        .header("Authorization")
        .is_some_and(|value| value.starts_with("Basic "));
    if basic {
        match firewall.process_login(ctx, Some(HTTP_PROVIDER)) {
            Ok(true) => {}
            Ok(false) => return Err(unauthorized(firewall.realm_name())),
            Err(SecurityError::AuthProviderNotDefined(_)) => {
                tracing::debug!(zone = %state.zone, "basic credentials ignored; zone has no Http provider");
            }
            Err(e) => return Err(security_error(e)),
        }
    }

    let decision = firewall.access_decision(ctx);
    let user = CurrentUser::from_user(firewall.user(ctx));

    if decision.granted {
        return Ok(user);
    }

    tracing::info!(
        zone = %state.zone,
        path = %decision.path,
        username = %user.username,
        "access denied"
    );
    if user.authenticated {
        Err(forbidden())
    } else {
        Err(unauthorized(firewall.realm_name()))
    }
}
