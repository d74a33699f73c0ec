//! Password digest adapters.
//!
//! An [`Encoder`] creates and verifies one-way password digests. The hashing
//! algorithms themselves come from `argon2` / `sha2`; this module only adapts
//! them to a common contract and maps configuration onto them.

use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;

use argon2::{Algorithm, Argon2, Params, Version};
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::{EncoderConfig, ParamMap};
use crate::error::SecurityError;

/// Name under which the no-op encoder is always available.
pub const NULL_ENCODER: &str = "_null";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncoderError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("invalid encoder parameters: {0}")]
    InvalidParams(String),
}

/// One-way password digest.
///
/// `verify` must not leak timing information about where a mismatch occurs.
pub trait Encoder: Send + Sync + Debug {
    fn hash(&self, plain: &str) -> Result<String, EncoderError>;

    fn verify(&self, plain: &str, digest: &str) -> bool;
}

/// Encoder drivers selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderDriver {
    Argon2,
    Sha512,
    Null,
}

impl FromStr for EncoderDriver {
    type Err = SecurityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "argon2" | "argon2id" => Ok(Self::Argon2),
            "sha512" => Ok(Self::Sha512),
            "_null" | "null" | "plain" => Ok(Self::Null),
            _ => Err(SecurityError::unknown_driver("encoder", s)),
        }
    }
}

/// Build an encoder from its configuration entry.
pub fn build_encoder(config: &EncoderConfig) -> Result<Arc<dyn Encoder>, SecurityError> {
    let encoder: Arc<dyn Encoder> = match config.driver.parse::<EncoderDriver>()? {
        EncoderDriver::Argon2 => Arc::new(Argon2Encoder::from_params(
            config.salt.as_deref().unwrap_or_default(),
            &config.params,
        )?),
        EncoderDriver::Sha512 => Arc::new(Sha512Encoder::new(
            config.salt.clone().unwrap_or_default(),
        )),
        EncoderDriver::Null => Arc::new(NullEncoder),
    };
    Ok(encoder)
}

// ─────────────────────────────────────────────────────────────────────────────
// Argon2id
// ─────────────────────────────────────────────────────────────────────────────

/// Argon2id encoder producing PHC strings.
///
/// The configured salt is used as the Argon2 secret (pepper); a random
/// per-digest salt is always generated.
#[derive(Clone)]
pub struct Argon2Encoder {
    pepper: Vec<u8>,
    params: Params,
}

impl Debug for Argon2Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Argon2Encoder")
            .field("params", &self.params)
            .field("peppered", &!self.pepper.is_empty())
            .finish()
    }
}

impl Argon2Encoder {
    pub fn new(pepper: impl Into<Vec<u8>>, params: Params) -> Self {
        Self {
            pepper: pepper.into(),
            params,
        }
    }

    /// Build from config params `MemoryCost` (KiB), `TimeCost`, `Parallelism`.
    pub fn from_params(pepper: &str, params: &ParamMap) -> Result<Self, EncoderError> {
        let m_cost = param_u32(params, "MemoryCost")?.unwrap_or(Params::DEFAULT_M_COST);
        let t_cost = param_u32(params, "TimeCost")?.unwrap_or(Params::DEFAULT_T_COST);
        let p_cost = param_u32(params, "Parallelism")?.unwrap_or(Params::DEFAULT_P_COST);

        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| EncoderError::InvalidParams(e.to_string()))?;

        Ok(Self::new(pepper.as_bytes().to_vec(), params))
    }

    fn hasher(&self) -> Result<Argon2<'_>, EncoderError> {
        if self.pepper.is_empty() {
            return Ok(Argon2::new(
                Algorithm::Argon2id,
                Version::V0x13,
                self.params.clone(),
            ));
        }
        Argon2::new_with_secret(
            &self.pepper,
            Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
        .map_err(|e| EncoderError::InvalidParams(e.to_string()))
    }
}

impl Default for Argon2Encoder {
    fn default() -> Self {
        Self::new(Vec::new(), Params::default())
    }
}

impl Encoder for Argon2Encoder {
    fn hash(&self, plain: &str) -> Result<String, EncoderError> {
        let salt = SaltString::generate(&mut OsRng);
        let digest = self
            .hasher()?
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| EncoderError::Hash(e.to_string()))?;
        Ok(digest.to_string())
    }

    fn verify(&self, plain: &str, digest: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return false;
        };
        match self.hasher() {
            Ok(hasher) => hasher.verify_password(plain.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Salted SHA-512
// ─────────────────────────────────────────────────────────────────────────────

/// Hex-encoded `sha512(salt || plain)`.
///
/// For deployments migrating legacy digests; prefer [`Argon2Encoder`].
#[derive(Clone)]
pub struct Sha512Encoder {
    salt: String,
}

impl Debug for Sha512Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sha512Encoder").finish_non_exhaustive()
    }
}

impl Sha512Encoder {
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    fn digest(&self, plain: &str) -> String {
        let mut hasher = Sha512::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(plain.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl Encoder for Sha512Encoder {
    fn hash(&self, plain: &str) -> Result<String, EncoderError> {
        Ok(self.digest(plain))
    }

    fn verify(&self, plain: &str, digest: &str) -> bool {
        let expected = self.digest(plain);
        bool::from(
            expected
                .as_bytes()
                .ct_eq(digest.to_ascii_lowercase().as_bytes()),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Null
// ─────────────────────────────────────────────────────────────────────────────

/// Stores passwords as given. Default when a firewall names no encoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEncoder;

impl Encoder for NullEncoder {
    fn hash(&self, plain: &str) -> Result<String, EncoderError> {
        Ok(plain.to_string())
    }

    fn verify(&self, plain: &str, digest: &str) -> bool {
        bool::from(plain.as_bytes().ct_eq(digest.as_bytes()))
    }
}

fn param_u32(params: &ParamMap, key: &str) -> Result<Option<u32>, EncoderError> {
    match params.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| EncoderError::InvalidParams(format!("{key} must be a u32"))),
    }
}
