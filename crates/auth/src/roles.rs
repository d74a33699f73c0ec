use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Capability tag granted to users and requested by access rules.
///
/// Roles are opaque names; two roles are equal when their names are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

/// Set of roles held by a user or requested by a rule.
pub type RoleSet = BTreeSet<Role>;

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Self(Cow::Owned(value.to_string()))
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

/// Build a [`RoleSet`] from anything yielding role names.
pub fn role_set<I, S>(names: I) -> RoleSet
where
    I: IntoIterator<Item = S>,
    S: Into<Role>,
{
    names.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_name() {
        assert_eq!(Role::new("ROLE_ADMIN"), Role::from("ROLE_ADMIN".to_string()));
        assert_ne!(Role::new("ROLE_ADMIN"), Role::new("ROLE_USER"));
    }

    #[test]
    fn role_set_deduplicates() {
        let set = role_set(["ROLE_USER", "ROLE_USER", "ROLE_ADMIN"]);
        assert_eq!(set.len(), 2);
    }
}
