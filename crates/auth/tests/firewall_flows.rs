use std::any::Any;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use warden_auth::encoder::{Argon2Encoder, Encoder};
use warden_auth::roles::role_set;
use warden_auth::{
    AuthenticationProvider, Firewall, FirewallState, Login, ManualClock, MemorySessionStore,
    RequestContext, Role, RoleSet, SecurityConfig, SecurityContext, SecurityError, User,
    UserData, UserNotFound, UserProvider, Vote, Voter,
};

fn argon2_params() -> Value {
    json!({ "MemoryCost": 4096, "TimeCost": 1, "Parallelism": 1 })
}

fn digest(password: &str) -> String {
    let params = argon2_params();
    Argon2Encoder::from_params("pepper", params.as_object().unwrap())
        .unwrap()
        .hash(password)
        .unwrap()
}

/// Two zones with separate keys and storages over one shared user table.
fn config() -> SecurityConfig {
    SecurityConfig::from_json_value(json!({
        "Firewalls": {
            "Admin": {
                "RealmName": "Administration",
                "Encoder": "Crypt",
                "UserProviders": ["Staff"],
                "TokenStorage": {
                    "Driver": "Stateless",
                    "SecurityKey": "admin-key",
                    "RememberMe": 3600
                },
                "Rules": [
                    { "Path": "/admin/login", "Roles": [] },
                    { "Path": "/admin", "Roles": ["ROLE_ADMIN"] },
                    { "Path": "^/reports/\\d+$", "Roles": ["ROLE_ADMIN", "ROLE_AUDITOR"] }
                ]
            },
            "Public": {
                "Encoder": "Crypt",
                "UserProviders": ["Staff"],
                "AuthenticationProviders": ["Form", "Http"],
                "TokenStorage": {
                    "Driver": "Cookie",
                    "SecurityKey": "public-key",
                    "TokenName": "pub"
                },
                "Rules": [
                    { "Path": "/account", "Roles": ["ROLE_USER", "ROLE_ADMIN"] }
                ],
                "DecisionStrategy": "affirmative"
            },
            "Members": {
                "AnonymousAccess": false,
                "Encoder": "Crypt",
                "UserProviders": ["Staff"],
                "TokenStorage": { "Driver": "Session", "SecurityKey": "members-key" }
            }
        },
        "Encoders": {
            "Crypt": { "Driver": "Argon2", "Salt": "pepper", "Params": argon2_params() }
        },
        "UserProviders": {
            "Staff": {
                "alice": { "Password": digest("wonderland"), "Roles": ["ROLE_ADMIN"] },
                "bob": { "Password": digest("builder"), "Roles": ["ROLE_USER"] }
            }
        }
    }))
    .unwrap()
}

fn t0() -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

fn context_at(clock: Arc<ManualClock>) -> SecurityContext {
    SecurityContext::builder(config()).clock(clock).build().unwrap()
}

fn login(path: &str, username: &str, password: &str, remember_me: bool) -> RequestContext {
    let req = RequestContext::new(path)
        .with_form_field("username", username)
        .with_form_field("password", password);
    if remember_me {
        req.with_form_field("rememberMe", "1")
    } else {
        req
    }
}

#[test]
fn stateless_token_honours_remember_me_ttl() {
    let clock = Arc::new(ManualClock::new(t0()));
    let ctx = context_at(clock.clone());

    let mut fw = ctx.firewall("Admin").unwrap();
    let mut req = login("/admin/login", "alice", "wonderland", true);
    assert!(fw.process_login(&mut req, None).unwrap());
    let token = fw.token_string(&req).unwrap();

    clock.advance_secs(1800);
    let mut fw = ctx.firewall("Admin").unwrap();
    let mut req = RequestContext::new("/admin/users").with_header("Authorization", format!("Bearer {token}"));
    assert!(fw.is_user_allowed_access(&mut req));
    assert_eq!(fw.user(&mut req).username(), "alice");

    clock.advance_secs(1801);
    let mut fw = ctx.firewall("Admin").unwrap();
    let mut req = RequestContext::new("/admin/users").with_header("Authorization", token);
    assert!(!fw.user(&mut req).is_authenticated());
    assert!(!fw.is_user_allowed_access(&mut req));
}

#[test]
fn token_can_travel_in_form_field() {
    let ctx = context_at(Arc::new(ManualClock::new(t0())));

    let mut fw = ctx.firewall("Admin").unwrap();
    let mut req = login("/admin/login", "alice", "wonderland", false);
    fw.process_login(&mut req, None).unwrap();
    let token = fw.token_string(&req).unwrap();

    let mut fw = ctx.firewall("Admin").unwrap();
    let mut req = RequestContext::new("/reports/7").with_form_field("Authorization", token);
    assert!(fw.is_user_allowed_access(&mut req));
}

#[test]
fn zones_do_not_accept_each_others_tokens() {
    let ctx = context_at(Arc::new(ManualClock::new(t0())));

    let mut admin = ctx.firewall("Admin").unwrap();
    let mut req = login("/admin/login", "alice", "wonderland", false);
    admin.process_login(&mut req, None).unwrap();
    let token = admin.token_string(&req).unwrap();

    let mut public = ctx.firewall("Public").unwrap();
    let mut req = RequestContext::new("/account").with_cookie("pub", token);
    assert!(!public.user(&mut req).is_authenticated());
    assert!(!public.is_user_allowed_access(&mut req));
}

#[test]
fn role_rules_follow_declaration_order() {
    let ctx = context_at(Arc::new(ManualClock::new(t0())));

    let mut fw = ctx.firewall("Admin").unwrap();
    let mut req = login("/admin/login", "bob", "builder", false);
    assert!(fw.process_login(&mut req, None).unwrap());

    let mut login_page = RequestContext::new("/admin/login");
    assert!(fw.is_user_allowed_access(&mut login_page));

    let mut panel = RequestContext::new("/admin/panel");
    assert!(!fw.is_user_allowed_access(&mut panel));

    let decision = fw.access_decision(&mut panel);
    assert_eq!(decision.matched_rule.as_deref(), Some("/admin"));
    assert_eq!(decision.requested_roles, vec!["ROLE_ADMIN".to_string()]);
    assert_eq!(decision.username, "bob");
}

#[test]
fn cookie_zone_sets_persistent_cookie_only_when_remembered() {
    let ctx = context_at(Arc::new(ManualClock::new(t0())));

    let mut fw = ctx.firewall("Public").unwrap();
    let mut req = login("/login", "bob", "builder", true);
    assert!(fw.process_login(&mut req, Some("Form")).unwrap());
    let cookie = req.response_cookies()[0].clone();
    assert_eq!(cookie.name, "pub");
    assert_eq!(cookie.expires, Some(t0() + chrono::Duration::seconds(2_592_000)));

    let mut fw = ctx.firewall("Public").unwrap();
    let mut req = login("/login", "bob", "builder", false);
    assert!(fw.process_login(&mut req, Some("Form")).unwrap());
    assert_eq!(req.response_cookies()[0].expires, None);

    let mut fw = ctx.firewall("Public").unwrap();
    let mut next = RequestContext::new("/account")
        .with_cookie_header(&format!("theme=dark; pub={}", req.response_cookies()[0].value));
    assert!(fw.is_user_allowed_access(&mut next));
    assert_eq!(fw.state(), FirewallState::Authenticated);
}

#[test]
fn zone_with_several_providers_needs_a_name_only_for_submissions() {
    let ctx = context_at(Arc::new(ManualClock::new(t0())));

    let mut fw = ctx.firewall("Public").unwrap();
    let mut browse = RequestContext::new("/account");
    assert!(fw.process_login(&mut browse, None).unwrap());
    assert_eq!(fw.state(), FirewallState::Anonymous);

    let mut fw = ctx.firewall("Public").unwrap();
    let mut req = login("/login", "bob", "builder", false);
    assert!(matches!(
        fw.process_login(&mut req, None),
        Err(SecurityError::NoAuthProviderConfigured(zone)) if zone == "Public"
    ));
}

#[test]
fn members_zone_requires_login() {
    let ctx = context_at(Arc::new(ManualClock::new(t0())));
    let session = Arc::new(MemorySessionStore::new());

    let mut fw = ctx.firewall("Members").unwrap();
    let mut req = RequestContext::new("/feed").with_session(session.clone());
    assert!(!fw.is_user_allowed_access(&mut req));

    let mut fw = ctx.firewall("Members").unwrap();
    let mut req = login("/login", "bob", "builder", false).with_session(session.clone());
    assert!(fw.process_login(&mut req, None).unwrap());

    let mut fw = ctx.firewall("Members").unwrap();
    let mut req = RequestContext::new("/feed").with_session(session.clone());
    assert!(fw.is_user_allowed_access(&mut req));

    assert!(fw.process_logout(&mut req));
    let mut fw = ctx.firewall("Members").unwrap();
    let mut req = RequestContext::new("/feed").with_session(session);
    assert!(!fw.is_user_allowed_access(&mut req));
}

#[test]
fn wrong_password_against_argon2_digest() {
    let ctx = context_at(Arc::new(ManualClock::new(t0())));
    let mut fw = ctx.firewall("Admin").unwrap();
    let mut req = login("/admin/login", "alice", "looking-glass", false);
    assert!(!fw.process_login(&mut req, None).unwrap());
    assert!(fw.token_string(&req).is_none());
}

/// Denies everyone inside a maintenance window.
#[derive(Debug)]
struct MaintenanceVoter;

impl Voter for MaintenanceVoter {
    fn name(&self) -> &str {
        "maintenance"
    }

    fn vote(&self, _user: &dyn User, requested: &RoleSet) -> Vote {
        if requested.contains(&Role::new("ROLE_ADMIN")) {
            Vote::Deny
        } else {
            Vote::Abstain
        }
    }
}

#[test]
fn custom_voters_take_part_in_decisions() {
    let ctx = SecurityContext::builder(config())
        .clock(Arc::new(ManualClock::new(t0())))
        .voter(Arc::new(MaintenanceVoter))
        .build()
        .unwrap();

    let mut fw = ctx.firewall("Admin").unwrap();
    let mut req = login("/admin/login", "alice", "wonderland", false);
    assert!(fw.process_login(&mut req, None).unwrap());

    let mut panel = RequestContext::new("/admin/panel");
    let decision = fw.access_decision(&mut panel);
    assert!(!decision.granted);
    assert_eq!(decision.votes[0].voter, "maintenance");
    assert_eq!(decision.votes[0].vote, -1);

    // Under affirmative a single grant still wins.
    let mut fw = ctx.firewall("Public").unwrap();
    let mut req = login("/login", "alice", "wonderland", false);
    assert!(fw.process_login(&mut req, Some("Form")).unwrap());
    let mut account = RequestContext::new("/account");
    assert!(fw.is_user_allowed_access(&mut account));
}

/// Single sign-on gateway: the upstream proxy vouches for the subject and
/// forwards its groups, so the login carries no password.
#[derive(Debug)]
struct GatewayProvider;

impl AuthenticationProvider for GatewayProvider {
    fn get_login_object(&self, req: &RequestContext) -> Option<Login> {
        let subject = req.header("X-Gateway-Subject")?;
        let groups: Vec<&str> = req
            .header("X-Gateway-Groups")
            .map(|raw| raw.split(',').map(str::trim).collect())
            .unwrap_or_default();
        let verified = req.header("X-Gateway-Signature") == Some("ok");
        Some(
            Login::new(subject, "", false)
                .with_attribute("verified", Value::Bool(verified))
                .with_attribute("groups", json!(groups)),
        )
    }
}

#[derive(Debug)]
struct GatewayUser(UserData);

impl User for GatewayUser {
    fn data(&self) -> &UserData {
        &self.0
    }
    fn data_mut(&mut self) -> &mut UserData {
        &mut self.0
    }
    fn authenticate(&self, login: &Login, _firewall: &Firewall) -> bool {
        login.attribute("verified").and_then(Value::as_bool).unwrap_or(false)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Derives roles from the groups the gateway attached to the login.
#[derive(Debug)]
struct GatewayDirectory;

impl UserProvider for GatewayDirectory {
    fn get_user(&self, login: &Login) -> Result<Box<dyn User>, UserNotFound> {
        let groups = login
            .attribute("groups")
            .and_then(Value::as_array)
            .ok_or_else(|| UserNotFound::new("Gateway", &login.username))?;
        let roles = role_set(
            groups
                .iter()
                .filter_map(Value::as_str)
                .map(|group| format!("ROLE_{}", group.to_ascii_uppercase())),
        );
        Ok(Box::new(GatewayUser(UserData::new(login.username.clone(), "", roles))))
    }
}

#[test]
fn external_provider_passes_attributes_to_the_user() {
    let config = SecurityConfig::from_json_value(json!({
        "Firewalls": {
            "Audit": {
                "UserProviders": ["Gateway"],
                "AuthenticationProviders": ["Gateway"],
                "TokenStorage": { "Driver": "Stateless", "SecurityKey": "audit-key" },
                "Rules": [{ "Path": "/reports", "Roles": ["ROLE_AUDITOR"] }]
            }
        }
    }))
    .unwrap();
    let ctx = SecurityContext::builder(config)
        .clock(Arc::new(ManualClock::new(t0())))
        .user_provider("Gateway", Arc::new(GatewayDirectory))
        .auth_provider("Gateway", Arc::new(GatewayProvider))
        .build()
        .unwrap();

    let mut fw = ctx.firewall("Audit").unwrap();
    let mut req = RequestContext::new("/reports/q3")
        .with_header("X-Gateway-Subject", "carol")
        .with_header("X-Gateway-Groups", "auditor, staff")
        .with_header("X-Gateway-Signature", "ok");
    assert!(fw.process_login(&mut req, None).unwrap());
    assert!(fw.user(&mut req).has_role(&Role::new("ROLE_AUDITOR")));
    assert!(fw.is_user_allowed_access(&mut req));

    let mut fw = ctx.firewall("Audit").unwrap();
    let mut forged = RequestContext::new("/reports/q3")
        .with_header("X-Gateway-Subject", "carol")
        .with_header("X-Gateway-Groups", "auditor");
    assert!(!fw.process_login(&mut forged, None).unwrap());
    assert!(!fw.is_user_allowed_access(&mut forged));
}
