//! User providers: resolve a [`Login`] into a [`User`].

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{MemoryUserConfig, ParamMap};
use crate::error::SecurityError;
use crate::login::Login;
use crate::roles::role_set;
use crate::user::{MemoryUser, User, UserData};

/// Recoverable miss: this provider does not know the login's user.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("user '{username}' not found by provider '{provider}'")]
pub struct UserNotFound {
    pub provider: String,
    pub username: String,
}

impl UserNotFound {
    pub fn new(provider: &str, username: &str) -> Self {
        Self {
            provider: provider.to_string(),
            username: username.to_string(),
        }
    }
}

/// Host-implemented lookup of users.
///
/// Providers are chained per firewall; the first one returning a user wins.
pub trait UserProvider: Send + Sync + Debug {
    fn get_user(&self, login: &Login) -> Result<Box<dyn User>, UserNotFound>;
}

/// Builds a provider from its `Params` block. Registered per driver name.
pub type UserProviderFactory =
    Arc<dyn Fn(&str, &ParamMap) -> Result<Arc<dyn UserProvider>, SecurityError> + Send + Sync>;

/// Provider over a fixed user table.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserProvider {
    name: String,
    users: BTreeMap<String, UserData>,
}

impl MemoryUserProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            users: BTreeMap::new(),
        }
    }

    /// `password` must already be a digest produced by the firewall's encoder.
    pub fn with_user<I, S>(mut self, username: &str, password: &str, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<crate::roles::Role>,
    {
        self.users.insert(
            username.to_string(),
            UserData::new(username, password, role_set(roles)),
        );
        self
    }

    pub fn from_table(name: &str, table: &BTreeMap<String, MemoryUserConfig>) -> Self {
        table
            .iter()
            .fold(Self::new(name), |provider, (username, entry)| {
                provider.with_user(username, &entry.password, entry.roles.iter().cloned())
            })
    }

    /// `Params: { "Users": { <username>: { Password, Roles } } }`
    pub fn from_params(name: &str, params: &ParamMap) -> Result<Self, SecurityError> {
        let Some(users) = params.get("Users") else {
            return Ok(Self::new(name));
        };
        let table: BTreeMap<String, MemoryUserConfig> = serde_json::from_value(users.clone())
            .map_err(|e| {
                SecurityError::invalid_config(format!("user provider '{name}': {e}"))
            })?;
        Ok(Self::from_table(name, &table))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserProvider for MemoryUserProvider {
    fn get_user(&self, login: &Login) -> Result<Box<dyn User>, UserNotFound> {
        let data = self
            .users
            .get(&login.username)
            .ok_or_else(|| UserNotFound::new(&self.name, &login.username))?;

        let mut data = data.clone();
        data.user_provider_name = self.name.clone();
        Ok(Box::new(MemoryUser::new(data)))
    }
}
