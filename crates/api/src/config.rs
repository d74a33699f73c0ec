//! Process settings and the security document the server runs with.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::json;
use warden_auth::SecurityConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_ZONE: &str = "Main";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub zone: String,
    /// JSON security document; the development default is used when unset.
    pub config_path: Option<PathBuf>,
}

impl ServerSettings {
    /// `WARDEN_ADDR`, `WARDEN_ZONE`, `WARDEN_CONFIG`.
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("WARDEN_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            zone: std::env::var("WARDEN_ZONE").unwrap_or_else(|_| DEFAULT_ZONE.to_string()),
            config_path: std::env::var_os("WARDEN_CONFIG").map(PathBuf::from),
        }
    }
}

pub fn load_security_config(path: Option<&Path>) -> anyhow::Result<SecurityConfig> {
    match path {
        Some(path) => SecurityConfig::from_json_file(path)
            .with_context(|| format!("invalid security config {}", path.display())),
        None => {
            tracing::warn!("WARDEN_CONFIG not set; using insecure development security config");
            Ok(dev_config())
        }
    }
}

/// Plaintext users and a fixed key. Development only.
pub fn dev_config() -> SecurityConfig {
    let document = json!({
        "Firewalls": {
            "Main": {
                "RealmName": "Warden (development)",
                "Encoder": "_null",
                "UserProviders": ["Dev"],
                "AuthenticationProviders": ["Form", "Http"],
                "TokenStorage": {
                    "Driver": "Session",
                    "SecurityKey": "dev-security-key",
                    "RememberMe": true
                },
                "Rules": [
                    { "Path": "/admin", "Roles": ["ROLE_ADMIN"] },
                    { "Path": "/me", "Roles": ["ROLE_USER", "ROLE_ADMIN"] }
                ],
                "DecisionStrategy": "unanimous"
            }
        },
        "UserProviders": {
            "Dev": {
                "admin": { "Password": "admin", "Roles": ["ROLE_ADMIN"] },
                "user": { "Password": "user", "Roles": ["ROLE_USER"] }
            }
        }
    });

    // The document above is static and matches the schema.
    SecurityConfig::from_json_value(document).unwrap_or_default()
}
