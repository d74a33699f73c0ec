//! Voters score whether a user satisfies a requested role set.

use std::fmt::Debug;

use crate::roles::RoleSet;
use crate::user::User;

/// Outcome of a single voter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vote {
    Grant,
    Abstain,
    Deny,
}

impl Vote {
    /// `+1`, `0`, `-1`.
    pub fn score(self) -> i32 {
        match self {
            Vote::Grant => 1,
            Vote::Abstain => 0,
            Vote::Deny => -1,
        }
    }
}

pub trait Voter: Send + Sync + Debug {
    /// Name used in decision logs.
    fn name(&self) -> &str;

    /// Voters that do not support the user's concrete type are skipped and do
    /// not count towards the decision.
    fn supports_user_class(&self, _user: &dyn User) -> bool {
        true
    }

    fn vote(&self, user: &dyn User, requested: &RoleSet) -> Vote;
}

/// Grants when the user holds any requested role.
///
/// Denies an authenticated user holding none of them; abstains for
/// unauthenticated users.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleVoter;

impl Voter for RoleVoter {
    fn name(&self) -> &str {
        "role"
    }

    fn vote(&self, user: &dyn User, requested: &RoleSet) -> Vote {
        if requested.iter().any(|role| user.has_role(role)) {
            Vote::Grant
        } else if user.is_authenticated() {
            Vote::Deny
        } else {
            Vote::Abstain
        }
    }
}

/// Baseline "must be logged in" check.
///
/// Grants an authenticated user when no role is requested, denies any
/// unauthenticated user, and otherwise leaves the decision to the other voters.
///
/// Only counted for unauthenticated users: for anyone logged in it would
/// merely abstain on role-restricted paths, which `consensus` counts as a
/// non-positive vote.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthenticationVoter;

impl Voter for AuthenticationVoter {
    fn name(&self) -> &str {
        "authentication"
    }

    fn supports_user_class(&self, user: &dyn User) -> bool {
        !user.is_authenticated()
    }

    fn vote(&self, user: &dyn User, requested: &RoleSet) -> Vote {
        if !user.is_authenticated() {
            Vote::Deny
        } else if requested.is_empty() {
            Vote::Grant
        } else {
            Vote::Abstain
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::role_set;
    use crate::user::{AnonymousUser, MemoryUser, UserData};

    fn user(roles: &[&str], authenticated: bool) -> MemoryUser {
        let mut user = MemoryUser::new(UserData::new("u", "", role_set(roles.iter().copied())));
        user.set_authenticated(authenticated);
        user
    }

    #[test]
    fn role_voter_grants_on_intersection() {
        let requested = role_set(["ROLE_ADMIN", "ROLE_EDITOR"]);
        assert_eq!(RoleVoter.vote(&user(&["ROLE_EDITOR"], true), &requested), Vote::Grant);
        assert_eq!(RoleVoter.vote(&user(&["ROLE_USER"], true), &requested), Vote::Deny);
        assert_eq!(RoleVoter.vote(&AnonymousUser::new(), &requested), Vote::Abstain);
    }

    #[test]
    fn authentication_voter() {
        let none = RoleSet::new();
        let some = role_set(["ROLE_USER"]);
        assert_eq!(AuthenticationVoter.vote(&user(&[], true), &none), Vote::Grant);
        assert_eq!(AuthenticationVoter.vote(&user(&[], true), &some), Vote::Abstain);
        assert_eq!(AuthenticationVoter.vote(&AnonymousUser::new(), &some), Vote::Deny);
    }

    #[test]
    fn authentication_voter_only_counts_for_anonymous_users() {
        assert!(AuthenticationVoter.supports_user_class(&AnonymousUser::new()));
        assert!(!AuthenticationVoter.supports_user_class(&user(&["ROLE_USER"], true)));
        assert!(RoleVoter.supports_user_class(&user(&["ROLE_USER"], true)));
    }

    #[test]
    fn scores() {
        assert_eq!(Vote::Grant.score(), 1);
        assert_eq!(Vote::Abstain.score(), 0);
        assert_eq!(Vote::Deny.score(), -1);
    }
}
