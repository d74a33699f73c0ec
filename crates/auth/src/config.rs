//! Security configuration schema.
//!
//! Mirrors the operator-facing document:
//!
//! ```text
//! Firewalls:        <zone> -> FirewallConfig
//! Encoders:         <name> -> { Driver, Salt, Params }
//! UserProviders:    <name> -> { Driver, Params } | inline user table
//! AuthenticationProviders: <name> -> { Driver, Params }
//! ```
//!
//! Keys are PascalCase. Only shape is checked here; references between
//! sections are resolved (and rejected) by `SecurityContext`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::SecurityError;

/// Free-form driver parameters.
pub type ParamMap = serde_json::Map<String, JsonValue>;

/// Token lifetime when the login did not ask to be remembered.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 86_400;

/// Token lifetime for remembered logins when no explicit TTL is configured.
pub const REMEMBER_ME_TTL_SECS: i64 = 2_592_000;

/// Upper bound accepted for a configured `RememberMe` TTL (100 years).
pub const MAX_TOKEN_TTL_SECS: i64 = 100 * 365 * 86_400;

pub const DEFAULT_TOKEN_NAME: &str = "warden-token";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityConfig {
    #[serde(default)]
    pub firewalls: BTreeMap<String, FirewallConfig>,

    #[serde(default)]
    pub encoders: BTreeMap<String, EncoderConfig>,

    #[serde(default)]
    pub user_providers: BTreeMap<String, UserProviderConfig>,

    #[serde(default)]
    pub authentication_providers: BTreeMap<String, AuthProviderConfig>,
}

impl SecurityConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, SecurityError> {
        serde_json::from_str(raw).map_err(|e| SecurityError::invalid_config(e.to_string()))
    }

    pub fn from_json_value(value: JsonValue) -> Result<Self, SecurityError> {
        serde_json::from_value(value).map_err(|e| SecurityError::invalid_config(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SecurityError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SecurityError::invalid_config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }
}

/// One security zone.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FirewallConfig {
    #[serde(default)]
    pub realm_name: String,

    #[serde(default = "default_true")]
    pub anonymous_access: bool,

    /// Encoder name; `None` or `"_null"` selects the plaintext encoder.
    #[serde(default)]
    pub encoder: Option<String>,

    #[serde(default)]
    pub user_providers: Vec<String>,

    #[serde(default = "default_auth_providers")]
    pub authentication_providers: Vec<String>,

    pub token_storage: TokenStorageConfig,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    /// `unanimous` when absent.
    #[serde(default)]
    pub decision_strategy: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TokenStorageConfig {
    #[serde(default = "default_token_driver")]
    pub driver: String,

    pub security_key: String,

    #[serde(default)]
    pub remember_me: RememberMe,

    /// Session key / cookie name.
    #[serde(default = "default_token_name")]
    pub token_name: String,

    /// Cipher algorithm name, `aes-256-gcm` when absent.
    #[serde(default)]
    pub cipher: Option<String>,
}

/// TTL policy for logins that carry the remember-me flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RememberMe {
    Flag(bool),
    Seconds(u64),
}

impl Default for RememberMe {
    fn default() -> Self {
        RememberMe::Flag(true)
    }
}

impl RememberMe {
    /// Token lifetime in seconds for a login with the given remember-me flag.
    pub fn ttl_secs(&self, remember_me: bool) -> i64 {
        if !remember_me {
            return DEFAULT_TOKEN_TTL_SECS;
        }
        match *self {
            RememberMe::Flag(true) => REMEMBER_ME_TTL_SECS,
            RememberMe::Flag(false) => DEFAULT_TOKEN_TTL_SECS,
            RememberMe::Seconds(secs) => i64::try_from(secs).unwrap_or(REMEMBER_ME_TTL_SECS),
        }
    }
}

/// Path rule: first match in declaration order supplies the requested roles.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleConfig {
    pub path: String,

    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EncoderConfig {
    pub driver: String,

    #[serde(default)]
    pub salt: Option<String>,

    #[serde(default)]
    pub params: ParamMap,
}

/// A user provider: either a driver reference or an inline user table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserProviderConfig {
    Driver(DriverConfig),
    Inline(BTreeMap<String, MemoryUserConfig>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DriverConfig {
    pub driver: String,

    #[serde(default)]
    pub params: ParamMap,
}

/// Entry of an in-memory user table. `Password` is a digest produced by the
/// firewall's encoder.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MemoryUserConfig {
    pub password: String,

    #[serde(default)]
    pub roles: Vec<String>,
}

pub type AuthProviderConfig = DriverConfig;

fn default_true() -> bool {
    true
}

fn default_auth_providers() -> Vec<String> {
    vec!["Form".to_string()]
}

fn default_token_driver() -> String {
    "Session".to_string()
}

fn default_token_name() -> String {
    DEFAULT_TOKEN_NAME.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_document() {
        let config = SecurityConfig::from_json_value(json!({
            "Firewalls": {
                "Admin": {
                    "RealmName": "Administration",
                    "AnonymousAccess": false,
                    "Encoder": "Crypt",
                    "UserProviders": ["Staff"],
                    "TokenStorage": {
                        "Driver": "Stateless",
                        "SecurityKey": "secret",
                        "RememberMe": 3600
                    },
                    "Rules": [
                        { "Path": "/admin/login", "Roles": [] },
                        { "Path": "/admin", "Roles": ["ROLE_ADMIN"] }
                    ],
                    "DecisionStrategy": "affirmative"
                }
            },
            "Encoders": {
                "Crypt": { "Driver": "Argon2", "Params": { "TimeCost": 1 } }
            },
            "UserProviders": {
                "Staff": {
                    "alice": { "Password": "x", "Roles": ["ROLE_ADMIN"] }
                },
                "Ldap": { "Driver": "Ldap", "Params": { "Host": "ldap.local" } }
            }
        }))
        .unwrap();

        let admin = &config.firewalls["Admin"];
        assert!(!admin.anonymous_access);
        assert_eq!(admin.authentication_providers, vec!["Form".to_string()]);
        assert_eq!(admin.token_storage.remember_me, RememberMe::Seconds(3600));
        assert_eq!(admin.token_storage.token_name, DEFAULT_TOKEN_NAME);
        assert_eq!(admin.rules.len(), 2);
        assert!(matches!(config.user_providers["Staff"], UserProviderConfig::Inline(_)));
        assert!(matches!(config.user_providers["Ldap"], UserProviderConfig::Driver(_)));
    }

    #[test]
    fn remember_me_ttl_policy() {
        assert_eq!(RememberMe::Flag(true).ttl_secs(false), DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(RememberMe::Flag(true).ttl_secs(true), REMEMBER_ME_TTL_SECS);
        assert_eq!(RememberMe::Flag(false).ttl_secs(true), DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(RememberMe::Seconds(60).ttl_secs(true), 60);
    }

    #[test]
    fn malformed_document_is_config_error() {
        let err = SecurityConfig::from_json_str("{\"Firewalls\": 3}").unwrap_err();
        assert!(matches!(err, SecurityError::InvalidConfig(_)));
    }
}
