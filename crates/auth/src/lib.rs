//! `warden-auth`: request-scoped authentication and authorization.
//!
//! The crate is decoupled from any HTTP framework: hosts translate their
//! requests into a [`RequestContext`], ask a [`SecurityContext`] for the
//! [`Firewall`] of the zone, and map its answers onto responses.
//!
//! Per request:
//! 1. `Firewall::process_login` turns a login submission (if any) into an
//!    authenticated user and persists a token.
//! 2. `Firewall::user` resolves the caller from that token, or yields an
//!    anonymous user.
//! 3. `Firewall::is_user_allowed_access` maps the path to requested roles and
//!    lets the voters decide.

pub mod access;
pub mod auth_provider;
pub mod cipher;
pub mod clock;
pub mod config;
pub mod context;
pub mod encoder;
pub mod error;
pub mod firewall;
pub mod login;
pub mod provider;
pub mod request;
pub mod roles;
pub mod token;
pub mod user;
pub mod voter;

pub use access::{AccessControl, AccessDecision, AccessRule, DecisionStrategy, PathPattern};
pub use auth_provider::{AuthenticationProvider, FormProvider, HttpBasicProvider};
pub use cipher::{AesGcmCipher, Cipher, CipherAlgorithm, CipherError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{RememberMe, SecurityConfig};
pub use context::{SecurityContext, SecurityContextBuilder};
pub use encoder::{Argon2Encoder, Encoder, EncoderError, NullEncoder, Sha512Encoder};
pub use error::{SecurityError, SecurityResult};
pub use firewall::{Firewall, FirewallState};
pub use login::Login;
pub use provider::{MemoryUserProvider, UserNotFound, UserProvider};
pub use request::{MemorySessionStore, RequestContext, ResponseCookie, SessionStore};
pub use roles::{Role, RoleSet};
pub use token::{TokenData, TokenStorage};
pub use user::{AnonymousUser, MemoryUser, User, UserData};
pub use voter::{AuthenticationVoter, RoleVoter, Vote, Voter};
