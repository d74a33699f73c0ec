//! Security error model.

use thiserror::Error;

use crate::cipher::CipherError;
use crate::encoder::EncoderError;

/// Result type used for fallible (configuration-time) security operations.
pub type SecurityResult<T> = Result<T, SecurityError>;

/// Fatal security error.
///
/// These surface misconfiguration to the operator. Recoverable authentication
/// failures (bad credentials, unknown user, expired token) never use this type;
/// they are reported as `false` / `None` / an anonymous user instead.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("firewall '{0}' is not defined")]
    FirewallNotDefined(String),

    #[error("encoder '{0}' is not defined")]
    EncoderNotDefined(String),

    #[error("user provider '{0}' is not defined")]
    UserProviderNotDefined(String),

    #[error("authentication provider '{0}' is not defined")]
    AuthProviderNotDefined(String),

    #[error("firewall '{0}' has no user providers configured")]
    NoUserProviders(String),

    /// Login was attempted without naming a provider and the firewall has
    /// zero or several authentication providers to choose from.
    #[error("firewall '{0}' cannot pick an authentication provider (none or several configured)")]
    NoAuthProviderConfigured(String),

    #[error("invalid decision strategy '{0}' (expected unanimous, affirmative or consensus)")]
    InvalidDecisionStrategy(String),

    #[error("unknown {kind} driver '{driver}'")]
    UnknownDriver { kind: &'static str, driver: String },

    #[error("invalid path pattern '{pattern}': {reason}")]
    InvalidPathPattern { pattern: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Encoder(#[from] EncoderError),
}

impl SecurityError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn unknown_driver(kind: &'static str, driver: impl Into<String>) -> Self {
        Self::UnknownDriver {
            kind,
            driver: driver.into(),
        }
    }
}
