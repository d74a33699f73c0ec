//! Token persistence across requests.
//!
//! Every backing shares one encoding: the [`TokenData`] payload is serialized
//! to JSON, sealed with the configured [`Cipher`] under `sha512(SecurityKey)`,
//! and rendered as unpadded base64url. The backings differ only in where that
//! string lives between requests:
//!
//! - [`SessionTokenStorage`]: the host's server-side session
//! - [`CookieTokenStorage`]: a client cookie
//! - [`StatelessTokenStorage`]: nowhere; the client presents it on every request

use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::cipher::{AesGcmCipher, Cipher, CipherAlgorithm, CipherError};
use crate::clock::Clock;
use crate::config::{MAX_TOKEN_TTL_SECS, RememberMe, TokenStorageConfig};
use crate::error::SecurityError;
use crate::request::RequestContext;
use crate::user::User;

mod cookie;
mod session;
mod stateless;

pub use cookie::CookieTokenStorage;
pub use session::SessionTokenStorage;
pub use stateless::{AUTHORIZATION_FIELD, StatelessTokenStorage};

/// Canonical token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    #[serde(rename = "u")]
    pub username: String,

    #[serde(rename = "vu", with = "chrono::serde::ts_seconds")]
    pub valid_until: DateTime<Utc>,

    #[serde(rename = "ap")]
    pub auth_provider_name: String,

    #[serde(rename = "up")]
    pub user_provider_name: String,
}

impl TokenData {
    pub fn for_user(user: &dyn User, valid_until: DateTime<Utc>) -> Self {
        Self {
            username: user.username().to_string(),
            valid_until,
            auth_provider_name: user.auth_provider_name().to_string(),
            user_provider_name: user.user_provider_name().to_string(),
        }
    }

    /// Usable iff the structural fields are present and `valid_until` is
    /// strictly after `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.username.is_empty()
            && !self.user_provider_name.is_empty()
            && self.valid_until > now
    }
}

/// Key material for token sealing: `sha512(security_key)`.
pub fn derive_key(security_key: &str) -> [u8; 64] {
    let mut key = [0u8; 64];
    key.copy_from_slice(&Sha512::digest(security_key.as_bytes()));
    key
}

/// Encrypt/decrypt helper shared by every backing.
#[derive(Clone)]
pub struct TokenCodec {
    cipher: Arc<dyn Cipher>,
    key: Vec<u8>,
}

impl Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("cipher", &self.cipher)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Key is `sha512(security_key)` truncated to the cipher's key length.
    pub fn new(cipher: Arc<dyn Cipher>, security_key: &str) -> Result<Self, CipherError> {
        let digest = derive_key(security_key);
        let key_len = cipher.key_len();
        if key_len > digest.len() {
            return Err(CipherError::InvalidKeyLength {
                algorithm: "sha512-derived",
                expected: key_len,
                actual: digest.len(),
            });
        }
        Ok(Self {
            cipher,
            key: digest[..key_len].to_vec(),
        })
    }

    pub fn encode(&self, data: &TokenData) -> Result<String, CipherError> {
        let json = serde_json::to_vec(data).map_err(|_| CipherError::Encrypt)?;
        let sealed = self.cipher.encrypt(&json, &self.key)?;
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Decode a token string. Pure: depends only on the input, the key and
    /// `now`. Every failure yields `None`.
    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> Option<TokenData> {
        let token = token.trim().trim_end_matches('=');
        if token.is_empty() {
            return None;
        }

        let sealed = match URL_SAFE_NO_PAD.decode(token) {
            Ok(bytes) => bytes,
            Err(_) => {
                tracing::debug!("token rejected: not base64url");
                return None;
            }
        };

        let json = match self.cipher.decrypt(&sealed, &self.key) {
            Ok(json) => json,
            Err(e) => {
                tracing::debug!(error = %e, "token rejected: decrypt failed");
                return None;
            }
        };

        let data: TokenData = match serde_json::from_slice(&json) {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!(error = %e, "token rejected: malformed payload");
                return None;
            }
        };

        if !data.is_valid_at(now) {
            tracing::debug!(username = %data.username, "token rejected: expired or incomplete");
            return None;
        }

        Some(data)
    }
}

/// Persists and retrieves the authenticated identity across requests.
pub trait TokenStorage: Send + Sync + Debug {
    /// Issue a token for `user` and persist it. `false` when nothing could be
    /// persisted (no session available, cipher failure).
    fn save_user_token(&mut self, req: &mut RequestContext, user: &dyn User) -> bool;

    /// Decode the current token. `None` when absent, malformed, tampered or
    /// expired.
    fn load_user_from_token(&mut self, req: &mut RequestContext) -> Option<TokenData>;

    /// Drop the token. `true` when there was one to drop.
    fn delete_user_token(&mut self, req: &mut RequestContext) -> bool;

    /// Token string for this request: an explicitly set value wins, otherwise
    /// the backing's own source.
    fn token_string(&self, req: &RequestContext) -> Option<String>;

    fn set_token_string(&mut self, token: String);

    /// Remember-me flag of the login whose token is about to be saved.
    fn set_remember_me(&mut self, remember_me: bool);
}

/// Token storage backings selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStorageDriver {
    Session,
    Cookie,
    Stateless,
}

impl FromStr for TokenStorageDriver {
    type Err = SecurityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "session" => Ok(Self::Session),
            "cookie" => Ok(Self::Cookie),
            "stateless" => Ok(Self::Stateless),
            _ => Err(SecurityError::unknown_driver("token storage", s)),
        }
    }
}

/// Validated token storage settings for one firewall. Builds a fresh storage
/// per firewall instance.
#[derive(Debug, Clone)]
pub struct TokenStorageFactory {
    driver: TokenStorageDriver,
    codec: TokenCodec,
    remember_me: RememberMe,
    token_name: String,
}

impl TokenStorageFactory {
    pub fn from_config(config: &TokenStorageConfig) -> Result<Self, SecurityError> {
        let driver = config.driver.parse::<TokenStorageDriver>()?;
        if config.security_key.is_empty() {
            return Err(SecurityError::invalid_config(
                "TokenStorage.SecurityKey must not be empty",
            ));
        }
        if config.token_name.is_empty() {
            return Err(SecurityError::invalid_config(
                "TokenStorage.TokenName must not be empty",
            ));
        }
        if let RememberMe::Seconds(secs) = config.remember_me {
            if secs == 0 || secs > MAX_TOKEN_TTL_SECS as u64 {
                return Err(SecurityError::invalid_config(format!(
                    "TokenStorage.RememberMe must be between 1 and {MAX_TOKEN_TTL_SECS} seconds, got {secs}"
                )));
            }
        }
        let algorithm = match &config.cipher {
            Some(name) => name.parse::<CipherAlgorithm>()?,
            None => CipherAlgorithm::default(),
        };
        let codec = TokenCodec::new(Arc::new(AesGcmCipher::new(algorithm)), &config.security_key)?;

        Ok(Self {
            driver,
            codec,
            remember_me: config.remember_me,
            token_name: config.token_name.clone(),
        })
    }

    pub fn driver(&self) -> TokenStorageDriver {
        self.driver
    }

    pub fn build(&self, clock: Arc<dyn Clock>) -> Box<dyn TokenStorage> {
        let issuer = TokenIssuer::new(self.codec.clone(), clock, self.remember_me);
        match self.driver {
            TokenStorageDriver::Session => {
                Box::new(SessionTokenStorage::new(issuer, self.token_name.clone()))
            }
            TokenStorageDriver::Cookie => {
                Box::new(CookieTokenStorage::new(issuer, self.token_name.clone()))
            }
            TokenStorageDriver::Stateless => Box::new(StatelessTokenStorage::new(issuer)),
        }
    }
}

/// State every backing carries: codec, time source, TTL policy, and the
/// explicitly set token string.
#[derive(Debug)]
pub struct TokenIssuer {
    codec: TokenCodec,
    clock: Arc<dyn Clock>,
    remember_me_policy: RememberMe,
    remember_me: bool,
    explicit_token: Option<String>,
}

impl TokenIssuer {
    pub fn new(codec: TokenCodec, clock: Arc<dyn Clock>, remember_me_policy: RememberMe) -> Self {
        Self {
            codec,
            clock,
            remember_me_policy,
            remember_me: false,
            explicit_token: None,
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.remember_me_policy.ttl_secs(self.remember_me)
    }

    pub fn is_remembered(&self) -> bool {
        self.remember_me
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Seal a fresh token for `user`; returns the token and its expiry.
    pub fn issue(&self, user: &dyn User) -> Option<(String, DateTime<Utc>)> {
        let ttl = self.ttl_secs();
        let Some(valid_until) =
            Duration::try_seconds(ttl).and_then(|ttl| self.now().checked_add_signed(ttl))
        else {
            tracing::warn!(ttl_secs = ttl, "token lifetime out of range");
            return None;
        };
        let data = TokenData::for_user(user, valid_until);
        match self.codec.encode(&data) {
            Ok(token) => Some((token, valid_until)),
            Err(e) => {
                tracing::warn!(error = %e, username = %data.username, "failed to seal user token");
                None
            }
        }
    }

    pub fn read(&self, token: &str) -> Option<TokenData> {
        self.codec.decode(token, self.now())
    }

    pub fn explicit_token(&self) -> Option<&str> {
        self.explicit_token.as_deref()
    }

    pub fn set_explicit_token(&mut self, token: Option<String>) {
        self.explicit_token = token;
    }

    pub fn set_remember_me(&mut self, remember_me: bool) {
        self.remember_me = remember_me;
    }
}
