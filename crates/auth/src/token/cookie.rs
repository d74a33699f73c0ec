use chrono::{DateTime, Utc};

use crate::request::{RequestContext, ResponseCookie};
use crate::user::User;

use super::{TokenData, TokenIssuer, TokenStorage};

/// Keeps the sealed token in a client cookie named `token_name`.
///
/// Remembered logins get a persistent cookie expiring with the token; other
/// logins get a browser-session cookie.
#[derive(Debug)]
pub struct CookieTokenStorage {
    issuer: TokenIssuer,
    token_name: String,
}

impl CookieTokenStorage {
    pub fn new(issuer: TokenIssuer, token_name: String) -> Self {
        Self { issuer, token_name }
    }

    fn cookie(&self, value: String, expires: Option<DateTime<Utc>>) -> ResponseCookie {
        ResponseCookie {
            name: self.token_name.clone(),
            value,
            expires,
            http_only: true,
            path: "/".to_string(),
        }
    }
}

impl TokenStorage for CookieTokenStorage {
    fn save_user_token(&mut self, req: &mut RequestContext, user: &dyn User) -> bool {
        let Some((token, valid_until)) = self.issuer.issue(user) else {
            return false;
        };
        let expires = self.issuer.is_remembered().then_some(valid_until);
        req.set_cookie(self.cookie(token.clone(), expires));
        self.issuer.set_explicit_token(Some(token));
        true
    }

    fn load_user_from_token(&mut self, req: &mut RequestContext) -> Option<TokenData> {
        let token = self.token_string(req)?;
        self.issuer.read(&token)
    }

    /// Expires the cookie; `false` when the client did not present one.
    fn delete_user_token(&mut self, req: &mut RequestContext) -> bool {
        let had_token = self.token_string(req).is_some();
        self.issuer.set_explicit_token(None);
        req.set_cookie(self.cookie(String::new(), Some(DateTime::<Utc>::UNIX_EPOCH)));
        had_token
    }

    fn token_string(&self, req: &RequestContext) -> Option<String> {
        if let Some(token) = self.issuer.explicit_token() {
            return Some(token.to_string());
        }
        req.cookie(&self.token_name).map(str::to_string)
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

    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::cipher::AesGcmCipher;
    use crate::clock::ManualClock;
    use crate::config::RememberMe;
    use crate::roles::RoleSet;
    use crate::token::TokenCodec;
    use crate::user::{MemoryUser, UserData};

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn storage(remember_me: RememberMe) -> CookieTokenStorage {
        let codec = TokenCodec::new(Arc::new(AesGcmCipher::default()), "cookie-key").unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        CookieTokenStorage::new(TokenIssuer::new(codec, clock, remember_me), "tok".into())
    }

    fn bob() -> MemoryUser {
        let mut data = UserData::new("bob", "", RoleSet::new());
        data.user_provider_name = "Memory".into();
        MemoryUser::new(data)
    }

    #[test]
    fn cookie_round_trips_through_the_client() {
        let mut login_req = RequestContext::new("/login");
        assert!(storage(RememberMe::default()).save_user_token(&mut login_req, &bob()));

        let emitted = &login_req.response_cookies()[0];
        assert_eq!(emitted.name, "tok");
        assert!(emitted.http_only);
        assert_eq!(emitted.expires, None);

        let mut next = RequestContext::new("/").with_cookie("tok", emitted.value.clone());
        let data = storage(RememberMe::default()).load_user_from_token(&mut next).unwrap();
        assert_eq!(data.username, "bob");
        assert_eq!(data.valid_until, t0() + Duration::seconds(86_400));
    }

    #[test]
    fn remembered_login_gets_persistent_cookie() {
        let mut storage = storage(RememberMe::Seconds(600));
        storage.set_remember_me(true);
        let mut req = RequestContext::new("/login");
        storage.save_user_token(&mut req, &bob());
        assert_eq!(req.response_cookies()[0].expires, Some(t0() + Duration::seconds(600)));
    }

    #[test]
    fn delete_expires_the_cookie() {
        let mut req = RequestContext::new("/logout").with_cookie("tok", "whatever");
        let mut storage = storage(RememberMe::default());
        assert!(storage.delete_user_token(&mut req));
        let cleared = &req.response_cookies()[0];
        assert!(cleared.value.is_empty());
        assert_eq!(cleared.expires, Some(DateTime::<Utc>::UNIX_EPOCH));
        assert!(storage.load_user_from_token(&mut req).is_none());
        assert!(!storage.delete_user_token(&mut req));
    }
}
