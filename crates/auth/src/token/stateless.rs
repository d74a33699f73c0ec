use crate::request::RequestContext;
use crate::user::User;

use super::{TokenData, TokenIssuer, TokenStorage};

/// Header and form field carrying a stateless token.
pub const AUTHORIZATION_FIELD: &str = "Authorization";

/// Bearer-token backing: nothing is stored server-side.
///
/// The token is read from, in order: a value set through
/// [`TokenStorage::set_token_string`], the `Authorization` header, the
/// `Authorization` form field. A `Bearer ` prefix is accepted. After a save
/// the fresh token is available from [`TokenStorage::token_string`] so the
/// host can hand it to the client.
#[derive(Debug)]
pub struct StatelessTokenStorage {
    issuer: TokenIssuer,
    /// Set by a delete; the request's token is ignored from then on.
    logged_out: bool,
}

impl StatelessTokenStorage {
    pub fn new(issuer: TokenIssuer) -> Self {
        Self {
            issuer,
            logged_out: false,
        }
    }
}

impl TokenStorage for StatelessTokenStorage {
    fn save_user_token(&mut self, _req: &mut RequestContext, user: &dyn User) -> bool {
        match self.issuer.issue(user) {
            Some((token, _)) => {
                self.issuer.set_explicit_token(Some(token));
                self.logged_out = false;
                true
            }
            None => false,
        }
    }

    fn load_user_from_token(&mut self, req: &mut RequestContext) -> Option<TokenData> {
        let token = self.token_string(req)?;
        self.issuer.read(&token)
    }

    /// Forgets the token for the rest of this request; `false` when there
    /// was none. A copy still held by the client stays valid until it
    /// expires.
    fn delete_user_token(&mut self, req: &mut RequestContext) -> bool {
        let had_token = self.token_string(req).is_some();
        self.issuer.set_explicit_token(None);
        self.logged_out = true;
        had_token
    }

    fn token_string(&self, req: &RequestContext) -> Option<String> {
        if let Some(token) = self.issuer.explicit_token() {
            return Some(token.to_string());
        }
        if self.logged_out {
            return None;
        }
        let raw = req
            .header(AUTHORIZATION_FIELD)
            .or_else(|| req.form_field(AUTHORIZATION_FIELD))?;
        let raw = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
        (!raw.is_empty()).then(|| raw.to_string())
    }

    fn set_token_string(&mut self, token: String) {
        self.issuer.set_explicit_token(Some(token));
        self.logged_out = false;
    }

    fn set_remember_me(&mut self, remember_me: bool) {
        self.issuer.set_remember_me(remember_me);
    }
}
