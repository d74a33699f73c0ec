//! Authentication providers: turn the current request into a [`Login`].
//!
//! A provider knows one login protocol (a credential form, HTTP Basic, an
//! external identity provider callback) and receives lifecycle callbacks from
//! the firewall. Callback defaults only log.

use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::config::{AuthProviderConfig, ParamMap};
use crate::error::SecurityError;
use crate::login::Login;
use crate::request::RequestContext;
use crate::user::User;

pub trait AuthenticationProvider: Send + Sync + Debug {
    /// Build a login from the request. `None` when the request carries no
    /// login submission for this provider.
    fn get_login_object(&self, req: &RequestContext) -> Option<Login>;

    fn invalid_login_provided_callback(&self, _req: &mut RequestContext, login: &Login) {
        tracing::info!(username = %login.username, "invalid login provided");
    }

    fn login_successful_callback(&self, _req: &mut RequestContext, user: &dyn User) {
        tracing::info!(username = %user.username(), "login successful");
    }

    fn user_authorized_by_token_callback(&self, _req: &mut RequestContext, user: &dyn User) {
        tracing::debug!(username = %user.username(), "user authorized by token");
    }

    fn logout_callback(&self, _req: &mut RequestContext) {
        tracing::debug!("user logged out");
    }
}

/// Built-in authentication provider drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProviderDriver {
    Form,
    Http,
}

impl FromStr for AuthProviderDriver {
    type Err = SecurityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "form" => Ok(Self::Form),
            "http" | "httpbasic" | "basic" => Ok(Self::Http),
            _ => Err(SecurityError::unknown_driver("authentication provider", s)),
        }
    }
}

pub fn build_auth_provider(
    config: &AuthProviderConfig,
) -> Result<Arc<dyn AuthenticationProvider>, SecurityError> {
    let provider: Arc<dyn AuthenticationProvider> = match config.driver.parse()? {
        AuthProviderDriver::Form => Arc::new(FormProvider::from_params(&config.params)?),
        AuthProviderDriver::Http => Arc::new(HttpBasicProvider),
    };
    Ok(provider)
}

/// Credential form submission.
///
/// Field names default to `username`, `password`, `rememberMe` and can be
/// overridden with `UsernameField`, `PasswordField`, `RememberMeField`.
#[derive(Debug, Clone)]
pub struct FormProvider {
    username_field: String,
    password_field: String,
    remember_me_field: String,
}

impl Default for FormProvider {
    fn default() -> Self {
        Self {
            username_field: "username".to_string(),
            password_field: "password".to_string(),
            remember_me_field: "rememberMe".to_string(),
        }
    }
}

impl FormProvider {
    pub fn from_params(params: &ParamMap) -> Result<Self, SecurityError> {
        let mut provider = Self::default();
        for (key, slot) in [
            ("UsernameField", &mut provider.username_field),
            ("PasswordField", &mut provider.password_field),
            ("RememberMeField", &mut provider.remember_me_field),
        ] {
            if let Some(value) = params.get(key) {
                *slot = value
                    .as_str()
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| {
                        SecurityError::invalid_config(format!("Form provider {key} must be a string"))
                    })?
                    .to_string();
            }
        }
        Ok(provider)
    }
}

impl AuthenticationProvider for FormProvider {
    fn get_login_object(&self, req: &RequestContext) -> Option<Login> {
        let username = req.form_field(&self.username_field)?;
        let password = req.form_field(&self.password_field).unwrap_or_default();
        let remember_me = req
            .form_field(&self.remember_me_field)
            .is_some_and(is_truthy);
        Some(Login::new(username.trim(), password, remember_me))
    }
}

/// `Authorization: Basic <base64(username:password)>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpBasicProvider;

impl AuthenticationProvider for HttpBasicProvider {
    fn get_login_object(&self, req: &RequestContext) -> Option<Login> {
        let header = req.header("Authorization")?;
        let encoded = header
            .strip_prefix("Basic ")
            .or_else(|| header.strip_prefix("basic "))?;
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        Some(Login::new(username, password, false))
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}
