//! Explicit security context.
//!
//! Built once at startup from a [`SecurityConfig`] plus host registrations,
//! then shared (behind an `Arc`) by whatever handles requests. Every reference
//! between config sections is resolved while building, so a context that
//! exists can always hand out its firewalls.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::access::{AccessControl, AccessRule, DecisionStrategy};
use crate::auth_provider::{
    AuthenticationProvider, FormProvider, HttpBasicProvider, build_auth_provider,
};
use crate::clock::{Clock, SystemClock};
use crate::config::{FirewallConfig, ParamMap, SecurityConfig, UserProviderConfig};
use crate::encoder::{Encoder, NULL_ENCODER, NullEncoder, build_encoder};
use crate::error::SecurityError;
use crate::firewall::Firewall;
use crate::provider::{MemoryUserProvider, UserProvider, UserProviderFactory};
use crate::token::TokenStorageFactory;
use crate::voter::Voter;

/// Driver name of the built-in in-memory user provider.
pub const MEMORY_USER_PROVIDER: &str = "Memory";

/// Resolved, validated settings of one zone.
struct Zone {
    realm_name: String,
    anonymous_access: bool,
    encoder: Arc<dyn Encoder>,
    user_providers: Vec<(String, Arc<dyn UserProvider>)>,
    auth_providers: Vec<(String, Arc<dyn AuthenticationProvider>)>,
    token_storage: TokenStorageFactory,
    strategy: DecisionStrategy,
    rules: Vec<AccessRule>,
}

pub struct SecurityContext {
    zones: BTreeMap<String, Zone>,
    voters: Vec<Arc<dyn Voter>>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityContext")
            .field("zones", &self.zones.keys().collect::<Vec<_>>())
            .field("voters", &self.voters)
            .finish_non_exhaustive()
    }
}

impl SecurityContext {
    /// Context with only built-in drivers.
    pub fn from_config(config: SecurityConfig) -> Result<Self, SecurityError> {
        Self::builder(config).build()
    }

    pub fn builder(config: SecurityConfig) -> SecurityContextBuilder {
        SecurityContextBuilder::new(config)
    }

    pub fn zone_names(&self) -> impl Iterator<Item = &str> {
        self.zones.keys().map(String::as_str)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Fresh firewall for one request in `zone`.
    pub fn firewall(&self, zone: &str) -> Result<Firewall, SecurityError> {
        let settings = self
            .zones
            .get(zone)
            .ok_or_else(|| SecurityError::FirewallNotDefined(zone.to_string()))?;

        let access_control =
            AccessControl::new(settings.strategy, settings.rules.clone(), self.voters.clone());

        let mut builder = Firewall::builder(zone)
            .realm_name(settings.realm_name.clone())
            .anonymous_access(settings.anonymous_access)
            .encoder(settings.encoder.clone())
            .token_storage(settings.token_storage.build(self.clock.clone()))
            .access_control(access_control);
        for (name, provider) in &settings.user_providers {
            builder = builder.user_provider(name.clone(), provider.clone());
        }
        for (name, provider) in &settings.auth_providers {
            builder = builder.auth_provider(name.clone(), provider.clone());
        }
        builder.build()
    }
}

/// Collects host registrations before the config is resolved.
pub struct SecurityContextBuilder {
    config: SecurityConfig,
    user_provider_factories: BTreeMap<String, UserProviderFactory>,
    user_providers: BTreeMap<String, Arc<dyn UserProvider>>,
    auth_providers: BTreeMap<String, Arc<dyn AuthenticationProvider>>,
    voters: Vec<Arc<dyn Voter>>,
    clock: Arc<dyn Clock>,
}

impl SecurityContextBuilder {
    fn new(config: SecurityConfig) -> Self {
        Self {
            config,
            user_provider_factories: BTreeMap::new(),
            user_providers: BTreeMap::new(),
            auth_providers: BTreeMap::new(),
            voters: Vec::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Make `driver` usable in `UserProviders.<name>.Driver`.
    pub fn user_provider_factory<F>(mut self, driver: &str, factory: F) -> Self
    where
        F: Fn(&str, &ParamMap) -> Result<Arc<dyn UserProvider>, SecurityError>
            + Send
            + Sync
            + 'static,
    {
        self.user_provider_factories
            .insert(driver.to_ascii_lowercase(), Arc::new(factory));
        self
    }

    /// Register a ready-made provider under `name`; takes precedence over a
    /// config entry of the same name.
    pub fn user_provider(mut self, name: &str, provider: Arc<dyn UserProvider>) -> Self {
        self.user_providers.insert(name.to_string(), provider);
        self
    }

    pub fn auth_provider(mut self, name: &str, provider: Arc<dyn AuthenticationProvider>) -> Self {
        self.auth_providers.insert(name.to_string(), provider);
        self
    }

    /// Custom voters are consulted, in registration order, before the
    /// built-in ones.
    pub fn voter(mut self, voter: Arc<dyn Voter>) -> Self {
        self.voters.push(voter);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<SecurityContext, SecurityError> {
        let encoders = self.build_encoders()?;
        let user_providers = self.build_user_providers()?;
        let auth_providers = self.build_auth_providers()?;

        let mut zones = BTreeMap::new();
        for (name, config) in &self.config.firewalls {
            let zone = resolve_zone(name, config, &encoders, &user_providers, &auth_providers)?;
            tracing::debug!(
                firewall = %name,
                strategy = %zone.strategy,
                rules = zone.rules.len(),
                token_storage = ?zone.token_storage.driver(),
                "firewall configured"
            );
            zones.insert(name.clone(), zone);
        }

        Ok(SecurityContext {
            zones,
            voters: self.voters,
            clock: self.clock,
        })
    }

    fn build_encoders(&self) -> Result<BTreeMap<String, Arc<dyn Encoder>>, SecurityError> {
        let mut encoders: BTreeMap<String, Arc<dyn Encoder>> = BTreeMap::new();
        encoders.insert(NULL_ENCODER.to_string(), Arc::new(NullEncoder));
        for (name, config) in &self.config.encoders {
            encoders.insert(name.clone(), build_encoder(config)?);
        }
        Ok(encoders)
    }

    fn build_user_providers(&self) -> Result<BTreeMap<String, Arc<dyn UserProvider>>, SecurityError> {
        let mut providers = BTreeMap::new();
        for (name, config) in &self.config.user_providers {
            let provider: Arc<dyn UserProvider> = match config {
                UserProviderConfig::Inline(table) => {
                    Arc::new(MemoryUserProvider::from_table(name, table))
                }
                UserProviderConfig::Driver(driver)
                    if driver.driver.eq_ignore_ascii_case(MEMORY_USER_PROVIDER) =>
                {
                    Arc::new(MemoryUserProvider::from_params(name, &driver.params)?)
                }
                UserProviderConfig::Driver(driver) => {
                    let factory = self
                        .user_provider_factories
                        .get(&driver.driver.to_ascii_lowercase())
                        .ok_or_else(|| {
                            SecurityError::unknown_driver("user provider", &driver.driver)
                        })?;
                    (factory.as_ref())(name, &driver.params)?
                }
            };
            providers.insert(name.clone(), provider);
        }
        for (name, provider) in &self.user_providers {
            providers.insert(name.clone(), provider.clone());
        }
        Ok(providers)
    }

    fn build_auth_providers(
        &self,
    ) -> Result<BTreeMap<String, Arc<dyn AuthenticationProvider>>, SecurityError> {
        let mut providers: BTreeMap<String, Arc<dyn AuthenticationProvider>> = BTreeMap::new();
        providers.insert("Form".to_string(), Arc::new(FormProvider::default()));
        providers.insert("Http".to_string(), Arc::new(HttpBasicProvider));
        for (name, config) in &self.config.authentication_providers {
            providers.insert(name.clone(), build_auth_provider(config)?);
        }
        for (name, provider) in &self.auth_providers {
            providers.insert(name.clone(), provider.clone());
        }
        Ok(providers)
    }
}

fn resolve_zone(
    name: &str,
    config: &FirewallConfig,
    encoders: &BTreeMap<String, Arc<dyn Encoder>>,
    user_providers: &BTreeMap<String, Arc<dyn UserProvider>>,
    auth_providers: &BTreeMap<String, Arc<dyn AuthenticationProvider>>,
) -> Result<Zone, SecurityError> {
    let encoder_name = config.encoder.as_deref().unwrap_or(NULL_ENCODER);
    let encoder = encoders
        .get(encoder_name)
        .cloned()
        .ok_or_else(|| SecurityError::EncoderNotDefined(encoder_name.to_string()))?;

    if config.user_providers.is_empty() {
        return Err(SecurityError::NoUserProviders(name.to_string()));
    }
    let user_providers = config
        .user_providers
        .iter()
        .map(|provider| {
            user_providers
                .get(provider)
                .map(|p| (provider.clone(), p.clone()))
                .ok_or_else(|| SecurityError::UserProviderNotDefined(provider.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let auth_providers = config
        .authentication_providers
        .iter()
        .map(|provider| {
            auth_providers
                .get(provider)
                .map(|p| (provider.clone(), p.clone()))
                .ok_or_else(|| SecurityError::AuthProviderNotDefined(provider.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let strategy = match &config.decision_strategy {
        Some(raw) => raw.parse()?,
        None => DecisionStrategy::default(),
    };

    let rules = config
        .rules
        .iter()
        .map(AccessRule::from_config)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Zone {
        realm_name: config.realm_name.clone(),
        anonymous_access: config.anonymous_access,
        encoder,
        user_providers,
        auth_providers,
        token_storage: TokenStorageFactory::from_config(&config.token_storage)?,
        strategy,
        rules,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::login::Login;
    use crate::provider::UserNotFound;
    use crate::request::RequestContext;
    use crate::user::User;

    fn zone(extra: Value) -> Value {
        let mut zone = json!({
            "UserProviders": ["Staff"],
            "TokenStorage": { "Driver": "Stateless", "SecurityKey": "s3cret" }
        });
        if let (Some(zone), Some(extra)) = (zone.as_object_mut(), extra.as_object()) {
            zone.extend(extra.clone());
        }
        zone
    }

    fn config(zone: Value) -> SecurityConfig {
        SecurityConfig::from_json_value(json!({
            "Firewalls": { "Main": zone },
            "UserProviders": {
                "Staff": { "alice": { "Password": "pw", "Roles": ["ROLE_ADMIN"] } }
            }
        }))
        .unwrap()
    }

    #[test]
    fn builds_firewall_for_configured_zone() {
        let ctx = SecurityContext::from_config(config(zone(json!({})))).unwrap();
        let fw = ctx.firewall("Main").unwrap();
        assert_eq!(fw.name(), "Main");
        assert_eq!(ctx.zone_names().collect::<Vec<_>>(), vec!["Main"]);
    }

    #[test]
    fn unknown_zone_is_an_error() {
        let ctx = SecurityContext::from_config(config(zone(json!({})))).unwrap();
        assert!(matches!(
            ctx.firewall("Admin"),
            Err(SecurityError::FirewallNotDefined(zone)) if zone == "Admin"
        ));
    }

    #[test]
    fn configuration_errors_are_fatal() {
        let cases = [
            (json!({ "Encoder": "Missing" }), "encoder"),
            (json!({ "UserProviders": [] }), "no user providers"),
            (json!({ "UserProviders": ["Ghost"] }), "user provider"),
            (json!({ "AuthenticationProviders": ["OAuth"] }), "authentication provider"),
            (json!({ "DecisionStrategy": "majority" }), "decision strategy"),
            (json!({ "Rules": [{ "Path": "^/(", "Roles": [] }] }), "path pattern"),
        ];
        for (extra, label) in cases {
            let err = SecurityContext::from_config(config(zone(extra))).unwrap_err();
            match (label, &err) {
                ("encoder", SecurityError::EncoderNotDefined(_))
                | ("no user providers", SecurityError::NoUserProviders(_))
                | ("user provider", SecurityError::UserProviderNotDefined(_))
                | ("authentication provider", SecurityError::AuthProviderNotDefined(_))
                | ("decision strategy", SecurityError::InvalidDecisionStrategy(_))
                | ("path pattern", SecurityError::InvalidPathPattern { .. }) => {}
                _ => panic!("{label}: unexpected error {err:?}"),
            }
        }
    }

    #[test]
    fn unknown_token_driver_is_fatal() {
        let zone = json!({
            "UserProviders": ["Staff"],
            "TokenStorage": { "Driver": "Redis", "SecurityKey": "k" }
        });
        assert!(matches!(
            SecurityContext::from_config(config(zone)),
            Err(SecurityError::UnknownDriver { kind: "token storage", .. })
        ));
    }

    #[derive(Debug)]
    struct Directory;

    impl UserProvider for Directory {
        fn get_user(&self, login: &Login) -> Result<Box<dyn User>, UserNotFound> {
            Err(UserNotFound::new("Directory", &login.username))
        }
    }

    #[test]
    fn host_factories_resolve_custom_drivers() {
        let raw = json!({
            "Firewalls": {
                "Main": {
                    "UserProviders": ["Ldap"],
                    "TokenStorage": { "SecurityKey": "k" }
                }
            },
            "UserProviders": { "Ldap": { "Driver": "Ldap", "Params": { "Host": "x" } } }
        });

        let err = SecurityContext::from_config(SecurityConfig::from_json_value(raw.clone()).unwrap())
            .unwrap_err();
        assert!(matches!(err, SecurityError::UnknownDriver { kind: "user provider", .. }));

        let ctx = SecurityContext::builder(SecurityConfig::from_json_value(raw).unwrap())
            .user_provider_factory("ldap", |_name, params| {
                assert_eq!(params.get("Host").and_then(|v| v.as_str()), Some("x"));
                Ok(Arc::new(Directory) as Arc<dyn UserProvider>)
            })
            .build()
            .unwrap();

        let mut fw = ctx.firewall("Main").unwrap();
        let mut req = RequestContext::new("/login")
            .with_form_field("username", "alice")
            .with_form_field("password", "pw");
        assert!(!fw.process_login(&mut req, None).unwrap());
    }

    #[test]
    fn firewalls_do_not_share_token_state() {
        let ctx = SecurityContext::from_config(config(zone(json!({})))).unwrap();

        let mut first = ctx.firewall("Main").unwrap();
        let mut req = RequestContext::new("/login")
            .with_form_field("username", "alice")
            .with_form_field("password", "pw");
        assert!(first.process_login(&mut req, None).unwrap());
        assert!(first.token_string(&req).is_some());

        let mut second = ctx.firewall("Main").unwrap();
        let mut fresh = RequestContext::new("/");
        assert!(second.token_string(&fresh).is_none());
        assert!(!second.user(&mut fresh).is_authenticated());
    }
}
