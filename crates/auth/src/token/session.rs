use crate::request::RequestContext;
use crate::user::User;

use super::{TokenData, TokenIssuer, TokenStorage};

/// Keeps the sealed token in the host's server-side session under
/// `token_name`.
#[derive(Debug)]
pub struct SessionTokenStorage {
    issuer: TokenIssuer,
    token_name: String,
}

impl SessionTokenStorage {
    pub fn new(issuer: TokenIssuer, token_name: String) -> Self {
        Self { issuer, token_name }
    }
}

impl TokenStorage for SessionTokenStorage {
    fn save_user_token(&mut self, req: &mut RequestContext, user: &dyn User) -> bool {
        let Some(session) = req.session().cloned() else {
            tracing::warn!(username = %user.username(), "session token storage used without a session");
            return false;
        };
        let Some((token, _)) = self.issuer.issue(user) else {
            return false;
        };
        let stored = session.set(&self.token_name, token.clone());
        if stored {
            self.issuer.set_explicit_token(Some(token));
        }
        stored
    }

    fn load_user_from_token(&mut self, req: &mut RequestContext) -> Option<TokenData> {
        let token = self.token_string(req)?;
        self.issuer.read(&token)
    }

    fn delete_user_token(&mut self, req: &mut RequestContext) -> bool {
        self.issuer.set_explicit_token(None);
        match req.session() {
            Some(session) => session.remove(&self.token_name),
            None => false,
        }
    }

    fn token_string(&self, req: &RequestContext) -> Option<String> {
        if let Some(token) = self.issuer.explicit_token() {
            return Some(token.to_string());
        }
        req.session()?.get(&self.token_name)
    }

    fn set_token_string(&mut self, token: String) {
        self.issuer.set_explicit_token(Some(token));
    }

    fn set_remember_me(&mut self, remember_me: bool) {
        self.issuer.set_remember_me(remember_me);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::cipher::AesGcmCipher;
    use crate::clock::ManualClock;
    use crate::config::RememberMe;
    use crate::request::{MemorySessionStore, SessionStore};
    use crate::roles::role_set;
    use crate::token::TokenCodec;
    use crate::user::{MemoryUser, UserData};

    fn storage(clock: Arc<ManualClock>) -> SessionTokenStorage {
        let codec = TokenCodec::new(Arc::new(AesGcmCipher::default()), "session-key").unwrap();
        SessionTokenStorage::new(
            TokenIssuer::new(codec, clock, RememberMe::default()),
            "sess-token".into(),
        )
    }

    fn alice() -> MemoryUser {
        let mut data = UserData::new("alice", "", role_set(["ROLE_USER"]));
        data.auth_provider_name = "Form".into();
        data.user_provider_name = "Memory".into();
        MemoryUser::new(data)
    }

    #[test]
    fn session_holds_encrypted_token_between_requests() {
        let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
        let session: Arc<MemorySessionStore> = Arc::new(MemorySessionStore::new());

        let mut first = RequestContext::new("/login").with_session(session.clone());
        assert!(storage(clock.clone()).save_user_token(&mut first, &alice()));

        let raw = session.get("sess-token").unwrap();
        assert!(!raw.contains("alice"));

        let mut second = RequestContext::new("/").with_session(session.clone());
        let data = storage(clock.clone()).load_user_from_token(&mut second).unwrap();
        assert_eq!(data.username, "alice");
        assert_eq!(data.user_provider_name, "Memory");

        let mut third = RequestContext::new("/logout").with_session(session.clone());
        assert!(storage(clock.clone()).delete_user_token(&mut third));
        assert!(session.get("sess-token").is_none());

        let mut fourth = RequestContext::new("/logout").with_session(session);
        assert!(!storage(clock).delete_user_token(&mut fourth));
    }

    #[test]
    fn save_without_session_fails() {
        let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
        let mut req = RequestContext::new("/login");
        assert!(!storage(clock).save_user_token(&mut req, &alice()));
    }

    #[test]
    fn session_token_expires_after_default_ttl() {
        let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
        let session: Arc<MemorySessionStore> = Arc::new(MemorySessionStore::new());
        let mut req = RequestContext::new("/login").with_session(session.clone());
        storage(clock.clone()).save_user_token(&mut req, &alice());

        clock.advance_secs(86_401);
        let mut later = RequestContext::new("/").with_session(session);
        assert!(storage(clock).load_user_from_token(&mut later).is_none());
    }
}
