//! Users as seen by the security layer.
//!
//! Persistence of users is outside this crate: a user provider turns a
//! [`Login`] into something implementing [`User`], and the firewall only ever
//! needs the identity, the hashed password, and the role set.

use std::any::Any;
use std::fmt::Debug;

use crate::firewall::Firewall;
use crate::login::Login;
use crate::roles::{Role, RoleSet};

/// Username carried by [`AnonymousUser`].
pub const ANONYMOUS_USERNAME: &str = "anonymous";

/// State shared by every user variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserData {
    pub username: String,
    /// Password digest as produced by the firewall's encoder.
    pub password: String,
    pub roles: RoleSet,
    pub auth_provider_name: String,
    pub user_provider_name: String,
    pub authenticated: bool,
}

impl UserData {
    pub fn new(username: impl Into<String>, password: impl Into<String>, roles: RoleSet) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            roles,
            ..Default::default()
        }
    }
}

/// Capability set of an identity that can be authenticated and authorized.
///
/// Variants differ only in how [`User::authenticate`] verifies credentials.
pub trait User: Send + Sync + Debug {
    fn data(&self) -> &UserData;

    fn data_mut(&mut self) -> &mut UserData;

    /// Verify the login against this user. Must not mutate authentication
    /// state; the firewall marks the user authenticated on success.
    fn authenticate(&self, login: &Login, firewall: &Firewall) -> bool;

    /// Downcast hook for voters that only support specific user types.
    fn as_any(&self) -> &dyn Any;

    fn username(&self) -> &str {
        &self.data().username
    }

    fn password(&self) -> &str {
        &self.data().password
    }

    fn roles(&self) -> &RoleSet {
        &self.data().roles
    }

    fn has_role(&self, role: &Role) -> bool {
        self.data().roles.contains(role)
    }

    fn auth_provider_name(&self) -> &str {
        &self.data().auth_provider_name
    }

    fn user_provider_name(&self) -> &str {
        &self.data().user_provider_name
    }

    fn is_authenticated(&self) -> bool {
        self.data().authenticated
    }

    fn set_authenticated(&mut self, authenticated: bool) {
        self.data_mut().authenticated = authenticated;
    }

    fn set_auth_provider_name(&mut self, name: &str) {
        self.data_mut().auth_provider_name = name.to_string();
    }

    fn set_user_provider_name(&mut self, name: &str) {
        self.data_mut().user_provider_name = name.to_string();
    }
}

/// Sentinel subject used when no identity could be resolved.
#[derive(Debug, Clone)]
pub struct AnonymousUser {
    data: UserData,
}

impl AnonymousUser {
    pub fn new() -> Self {
        Self {
            data: UserData::new(ANONYMOUS_USERNAME, "", RoleSet::new()),
        }
    }
}

impl Default for AnonymousUser {
    fn default() -> Self {
        Self::new()
    }
}

impl User for AnonymousUser {
    fn data(&self) -> &UserData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut UserData {
        &mut self.data
    }

    fn authenticate(&self, _login: &Login, _firewall: &Firewall) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn is_authenticated(&self) -> bool {
        false
    }

    fn set_authenticated(&mut self, _authenticated: bool) {}
}

/// User backed by a static table (see `MemoryUserProvider`).
///
/// Credentials verify when the username matches and the firewall's encoder
/// accepts the submitted password against the stored digest.
#[derive(Debug, Clone)]
pub struct MemoryUser {
    data: UserData,
}

impl MemoryUser {
    pub fn new(data: UserData) -> Self {
        Self { data }
    }
}

impl User for MemoryUser {
    fn data(&self) -> &UserData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut UserData {
        &mut self.data
    }

    fn authenticate(&self, login: &Login, firewall: &Firewall) -> bool {
        if login.username != self.data.username {
            return false;
        }
        firewall.encoder().verify(&login.password, &self.data.password)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
