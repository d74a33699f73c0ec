//! One security zone per request.
//!
//! A [`Firewall`] is built from a `SecurityContext` for every request and owns
//! its token storage, encoder handle, ordered user providers, and access
//! control. It resolves the caller once and caches the result; nothing in here
//! is shared between concurrent requests.

use std::fmt;
use std::sync::Arc;

use crate::access::{AccessControl, AccessDecision};
use crate::auth_provider::AuthenticationProvider;
use crate::encoder::{Encoder, NullEncoder};
use crate::error::SecurityError;
use crate::login::Login;
use crate::provider::UserProvider;
use crate::request::RequestContext;
use crate::token::{TokenData, TokenStorage};
use crate::user::{AnonymousUser, User};

/// Authentication state of a firewall within one request.
///
/// `Anonymous -> LoginPending -> Authenticated -> LoggedOut`; a failed login
/// drops back to `Anonymous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FirewallState {
    #[default]
    Anonymous,
    LoginPending,
    Authenticated,
    LoggedOut,
}

pub struct Firewall {
    name: String,
    realm_name: String,
    anonymous_access: bool,
    encoder: Arc<dyn Encoder>,
    user_providers: Vec<(String, Arc<dyn UserProvider>)>,
    auth_providers: Vec<(String, Arc<dyn AuthenticationProvider>)>,
    token_storage: Box<dyn TokenStorage>,
    access_control: AccessControl,
    state: FirewallState,
    user: Option<Box<dyn User>>,
    token_checked: bool,
    anonymous: AnonymousUser,
}

impl fmt::Debug for Firewall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Firewall")
            .field("name", &self.name)
            .field("realm_name", &self.realm_name)
            .field("anonymous_access", &self.anonymous_access)
            .field("state", &self.state)
            .field("user", &self.user.as_ref().map(|u| u.username().to_string()))
            .finish_non_exhaustive()
    }
}

impl Firewall {
    pub fn builder(name: impl Into<String>) -> FirewallBuilder {
        FirewallBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable zone name used in authentication challenges. Falls back
    /// to the firewall name when no realm is configured.
    pub fn realm_name(&self) -> &str {
        if self.realm_name.is_empty() {
            &self.name
        } else {
            &self.realm_name
        }
    }

    pub fn anonymous_access(&self) -> bool {
        self.anonymous_access
    }

    pub fn encoder(&self) -> &dyn Encoder {
        self.encoder.as_ref()
    }

    pub fn state(&self) -> FirewallState {
        self.state
    }

    pub fn access_control(&self) -> &AccessControl {
        &self.access_control
    }

    /// Process a login submission for this request.
    ///
    /// `Ok(true)` when there is nothing to process or the login succeeded;
    /// `Ok(false)` when the credentials were rejected or no user provider
    /// knows the user. `Err` only for misconfiguration: an unknown provider
    /// name, or a submission without a name in a zone that does not have
    /// exactly one provider.
    pub fn process_login(
        &mut self,
        req: &mut RequestContext,
        provider_name: Option<&str>,
    ) -> Result<bool, SecurityError> {
        let Some((provider_name, provider, login)) = self.pending_login(req, provider_name)? else {
            return Ok(true);
        };

        self.state = FirewallState::LoginPending;
        tracing::debug!(
            firewall = %self.name,
            provider = %provider_name,
            username = %login.username,
            "processing login"
        );

        let Some(mut user) = self.find_user(&login) else {
            tracing::info!(
                firewall = %self.name,
                username = %login.username,
                "login rejected: no user provider knows this user"
            );
            self.state = FirewallState::Anonymous;
            provider.invalid_login_provided_callback(req, &login);
            return Ok(false);
        };

        if !user.authenticate(&login, self) {
            tracing::info!(
                firewall = %self.name,
                username = %login.username,
                "login rejected: credentials do not verify"
            );
            self.state = FirewallState::Anonymous;
            provider.invalid_login_provided_callback(req, &login);
            return Ok(false);
        }

        user.set_auth_provider_name(&provider_name);
        user.set_authenticated(true);

        self.token_storage.set_remember_me(login.remember_me);
        if !self.token_storage.save_user_token(req, user.as_ref()) {
            tracing::warn!(
                firewall = %self.name,
                username = %user.username(),
                "login succeeded but the token could not be persisted"
            );
        }

        provider.login_successful_callback(req, user.as_ref());

        self.user = Some(user);
        self.token_checked = true;
        self.state = FirewallState::Authenticated;
        Ok(true)
    }

    /// The caller for this request: the token-resolved user, or an anonymous
    /// user. Reads the token at most once and never processes a login.
    pub fn user(&mut self, req: &mut RequestContext) -> &dyn User {
        self.resolve_user(req);
        self.current_user()
    }

    pub fn is_user_allowed_access(&mut self, req: &mut RequestContext) -> bool {
        self.access_decision(req).granted
    }

    /// Access decision with the votes that produced it.
    pub fn access_decision(&mut self, req: &mut RequestContext) -> AccessDecision {
        self.resolve_user(req);
        let user = self.current_user();
        let mut decision = self.access_control.explain(user, req.path());

        if !self.anonymous_access && !user.is_authenticated() && decision.granted {
            tracing::debug!(
                firewall = %self.name,
                path = %req.path(),
                "anonymous access disabled for this zone"
            );
            decision.granted = false;
        }
        decision
    }

    /// Delete the token and fire the logout callback. Returns whether the
    /// storage held a token to remove.
    pub fn process_logout(&mut self, req: &mut RequestContext) -> bool {
        self.resolve_user(req);
        let provider_name = self.current_user().auth_provider_name().to_string();

        let deleted = self.token_storage.delete_user_token(req);

        let provider = self
            .auth_provider(&provider_name)
            .or_else(|| self.auth_providers.first().map(|(_, p)| p.clone()));
        if let Some(provider) = provider {
            provider.logout_callback(req);
        }

        tracing::debug!(firewall = %self.name, deleted, "logout processed");
        self.user = None;
        self.token_checked = true;
        self.state = FirewallState::LoggedOut;
        deleted
    }

    pub fn token_string(&self, req: &RequestContext) -> Option<String> {
        self.token_storage.token_string(req)
    }

    pub fn set_token_string(&mut self, token: String) {
        self.token_storage.set_token_string(token);
        self.token_checked = false;
        self.user = None;
    }

    fn current_user(&self) -> &dyn User {
        match &self.user {
            Some(user) => user.as_ref(),
            None => &self.anonymous,
        }
    }

    fn resolve_user(&mut self, req: &mut RequestContext) {
        if self.token_checked {
            return;
        }
        self.token_checked = true;

        let Some(token) = self.token_storage.load_user_from_token(req) else {
            return;
        };
        match self.rehydrate(req, &token) {
            Some(user) => {
                self.user = Some(user);
                self.state = FirewallState::Authenticated;
            }
            None => {
                tracing::debug!(
                    firewall = %self.name,
                    username = %token.username,
                    provider = %token.user_provider_name,
                    "token rejected: user provider no longer resolves this user"
                );
            }
        }
    }

    fn rehydrate(&self, req: &mut RequestContext, token: &TokenData) -> Option<Box<dyn User>> {
        let (_, provider) = self
            .user_providers
            .iter()
            .find(|(name, _)| *name == token.user_provider_name)?;

        let mut user = provider.get_user(&Login::for_token(&token.username)).ok()?;
        user.set_user_provider_name(&token.user_provider_name);
        user.set_auth_provider_name(&token.auth_provider_name);
        user.set_authenticated(true);

        if let Some(auth) = self.auth_provider(&token.auth_provider_name) {
            auth.user_authorized_by_token_callback(req, user.as_ref());
        }
        Some(user)
    }

    /// First user provider that knows the login wins.
    fn find_user(&self, login: &Login) -> Option<Box<dyn User>> {
        self.user_providers.iter().find_map(|(name, provider)| {
            match provider.get_user(login) {
                Ok(mut user) => {
                    user.set_user_provider_name(name);
                    Some(user)
                }
                Err(miss) => {
                    tracing::trace!(firewall = %self.name, error = %miss, "user provider miss");
                    None
                }
            }
        })
    }

    fn auth_provider(&self, name: &str) -> Option<Arc<dyn AuthenticationProvider>> {
        self.auth_providers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.clone())
    }

    /// The provider to use and the login it found in `req`, if any.
    ///
    /// Without a name the zone's sole provider is used. With several
    /// providers the choice only matters once one of them sees a submission.
    fn pending_login(
        &self,
        req: &RequestContext,
        name: Option<&str>,
    ) -> Result<Option<PendingLogin>, SecurityError> {
        let (name, provider) = match (name, self.auth_providers.as_slice()) {
            (Some(name), _) => {
                let provider = self
                    .auth_provider(name)
                    .ok_or_else(|| SecurityError::AuthProviderNotDefined(name.to_string()))?;
                (name.to_string(), provider)
            }
            (None, [(name, provider)]) => (name.clone(), provider.clone()),
            (None, providers) => {
                if providers.iter().any(|(_, p)| p.get_login_object(req).is_some()) {
                    return Err(SecurityError::NoAuthProviderConfigured(self.name.clone()));
                }
                return Ok(None);
            }
        };
        Ok(provider
            .get_login_object(req)
            .map(|login| (name, provider, login)))
    }
}

type PendingLogin = (String, Arc<dyn AuthenticationProvider>, Login);

/// Assembles a [`Firewall`] from already-built parts.
pub struct FirewallBuilder {
    name: String,
    realm_name: String,
    anonymous_access: bool,
    encoder: Arc<dyn Encoder>,
    user_providers: Vec<(String, Arc<dyn UserProvider>)>,
    auth_providers: Vec<(String, Arc<dyn AuthenticationProvider>)>,
    token_storage: Option<Box<dyn TokenStorage>>,
    access_control: Option<AccessControl>,
}

impl FirewallBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            realm_name: String::new(),
            anonymous_access: true,
            encoder: Arc::new(NullEncoder),
            user_providers: Vec::new(),
            auth_providers: Vec::new(),
            token_storage: None,
            access_control: None,
        }
    }

    pub fn realm_name(mut self, realm: impl Into<String>) -> Self {
        self.realm_name = realm.into();
        self
    }

    pub fn anonymous_access(mut self, allowed: bool) -> Self {
        self.anonymous_access = allowed;
        self
    }

    pub fn encoder(mut self, encoder: Arc<dyn Encoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn user_provider(mut self, name: impl Into<String>, provider: Arc<dyn UserProvider>) -> Self {
        self.user_providers.push((name.into(), provider));
        self
    }

    pub fn auth_provider(
        mut self,
        name: impl Into<String>,
        provider: Arc<dyn AuthenticationProvider>,
    ) -> Self {
        self.auth_providers.push((name.into(), provider));
        self
    }

    pub fn token_storage(mut self, storage: Box<dyn TokenStorage>) -> Self {
        self.token_storage = Some(storage);
        self
    }

    pub fn access_control(mut self, access_control: AccessControl) -> Self {
        self.access_control = Some(access_control);
        self
    }

    pub fn build(self) -> Result<Firewall, SecurityError> {
        if self.user_providers.is_empty() {
            return Err(SecurityError::NoUserProviders(self.name));
        }
        let token_storage = self.token_storage.ok_or_else(|| {
            SecurityError::invalid_config(format!("firewall '{}' has no token storage", self.name))
        })?;
        let access_control = self.access_control.unwrap_or_else(|| {
            AccessControl::new(Default::default(), Vec::new(), Vec::new())
        });

        Ok(Firewall {
            name: self.name,
            realm_name: self.realm_name,
            anonymous_access: self.anonymous_access,
            encoder: self.encoder,
            user_providers: self.user_providers,
            auth_providers: self.auth_providers,
            token_storage,
            access_control,
            state: FirewallState::Anonymous,
            user: None,
            token_checked: false,
            anonymous: AnonymousUser::new(),
        })
    }
}
