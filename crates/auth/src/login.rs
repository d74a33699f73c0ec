use std::collections::HashMap;

use serde_json::Value as JsonValue;

/// A single authentication attempt.
///
/// Built by an authentication provider from the current request and handed to
/// user providers. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Login {
    pub username: String,
    pub password: String,
    pub remember_me: bool,

    /// Out-of-band data attached by external providers (delegated server
    /// handles, derived roles, profile fields).
    pub attributes: HashMap<String, JsonValue>,
}

impl Login {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        remember_me: bool,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            remember_me,
            attributes: HashMap::new(),
        }
    }

    /// Login used to rehydrate a user named in a token (no credentials).
    pub fn for_token(username: impl Into<String>) -> Self {
        Self::new(username, String::new(), false)
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&JsonValue> {
        self.attributes.get(key)
    }
}
