//! Symmetric encryption adapter used by token storage.
//!
//! Ciphertext layout: `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
//! The AEAD tag makes any modification of the ciphertext a decrypt failure.

use std::fmt::Debug;
use std::str::FromStr;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, Nonce, OsRng};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use thiserror::Error;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("invalid key length for {algorithm}: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        algorithm: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("unknown cipher algorithm '{0}'")]
    UnknownAlgorithm(String),

    #[error("ciphertext is truncated")]
    Truncated,

    #[error("encryption failed")]
    Encrypt,

    /// Wrong key, corrupted or tampered ciphertext.
    #[error("decryption failed")]
    Decrypt,
}

/// Symmetric encrypt/decrypt primitive.
pub trait Cipher: Send + Sync + Debug {
    /// Key length in bytes this cipher requires.
    fn key_len(&self) -> usize;

    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError>;

    fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CipherAlgorithm {
    Aes128Gcm,
    #[default]
    Aes256Gcm,
}

impl CipherAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            CipherAlgorithm::Aes128Gcm => "aes-128-gcm",
            CipherAlgorithm::Aes256Gcm => "aes-256-gcm",
        }
    }

    pub fn key_len(&self) -> usize {
        match self {
            CipherAlgorithm::Aes128Gcm => 16,
            CipherAlgorithm::Aes256Gcm => 32,
        }
    }
}

impl FromStr for CipherAlgorithm {
    type Err = CipherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "aes-128-gcm" | "aes128gcm" => Ok(Self::Aes128Gcm),
            "aes-256-gcm" | "aes256gcm" => Ok(Self::Aes256Gcm),
            _ => Err(CipherError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// AES-GCM cipher with a random nonce per message.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmCipher {
    algorithm: CipherAlgorithm,
}

impl AesGcmCipher {
    pub fn new(algorithm: CipherAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> CipherAlgorithm {
        self.algorithm
    }

    fn check_key(&self, key: &[u8]) -> Result<(), CipherError> {
        let expected = self.algorithm.key_len();
        if key.len() != expected {
            return Err(CipherError::InvalidKeyLength {
                algorithm: self.algorithm.as_str(),
                expected,
                actual: key.len(),
            });
        }
        Ok(())
    }
}

impl Cipher for AesGcmCipher {
    fn key_len(&self) -> usize {
        self.algorithm.key_len()
    }

    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError> {
        self.check_key(key)?;

        let (nonce, sealed) = match self.algorithm {
            CipherAlgorithm::Aes128Gcm => seal::<Aes128Gcm>(plaintext, key)?,
            CipherAlgorithm::Aes256Gcm => seal::<Aes256Gcm>(plaintext, key)?,
        };

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError> {
        self.check_key(key)?;

        if ciphertext.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::Truncated);
        }
        let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);

        match self.algorithm {
            CipherAlgorithm::Aes128Gcm => open::<Aes128Gcm>(nonce, sealed, key),
            CipherAlgorithm::Aes256Gcm => open::<Aes256Gcm>(nonce, sealed, key),
        }
    }
}

fn seal<C>(plaintext: &[u8], key: &[u8]) -> Result<(Vec<u8>, Vec<u8>), CipherError>
where
    C: Aead + AeadCore + KeyInit,
{
    let cipher = C::new_from_slice(key).map_err(|_| CipherError::Encrypt)?;
    let nonce = C::generate_nonce(&mut OsRng);
    let sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CipherError::Encrypt)?;
    Ok((nonce.to_vec(), sealed))
}

fn open<C>(nonce: &[u8], sealed: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError>
where
    C: Aead + AeadCore + KeyInit,
{
    let cipher = C::new_from_slice(key).map_err(|_| CipherError::Decrypt)?;
    cipher
        .decrypt(Nonce::<C>::from_slice(nonce), sealed)
        .map_err(|_| CipherError::Decrypt)
}
