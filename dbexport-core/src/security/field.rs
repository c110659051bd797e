//! AES-GCM field decryption with Argon2id key derivation.
//!
//! Encrypted cells are text of the form
//!
//! ```text
//! enc:v1:<base64( salt[16] | nonce[12] | ciphertext | tag[16] )>
//! ```
//!
//! The key is derived from the category password and the embedded salt with
//! Argon2id. Derived keys are cached per salt, so a table whose cells share a
//! salt pays for the KDF once. Cells salted individually still cost one
//! derivation each.
//!
//! # Security Guarantees
//! - AES-GCM-256 authenticated decryption; tampered cells fail
//! - Argon2id parameters match the rest of the toolchain (64 MiB, t=3, p=4)
//! - Derived keys and the password live in `Zeroizing` containers
//!
//! # Cryptographic Standards
//! - AES-GCM: NIST SP 800-38D
//! - Argon2id: RFC 9106

use super::decrypt::{CapabilityProvider, DecryptError, Decryptor};
use super::password::PasswordStore;
use crate::Result;
use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use argon2::{Argon2, Params, Version};
use base64::Engine;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use zeroize::Zeroizing;

/// Marker that distinguishes field ciphertext from ordinary text.
pub const FIELD_PREFIX: &str = "enc:v1:";

/// AES-GCM nonce size: 96 bits (NIST SP 800-38D §8.2.1)
const AES_GCM_NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size: 128 bits (NIST SP 800-38D §5.2.1)
const AES_GCM_TAG_SIZE: usize = 16;

/// AES key size: 256 bits
const AES_KEY_SIZE: usize = 32;

/// Argon2id salt size: 128 bits (RFC 9106 §4)
const ARGON2_SALT_SIZE: usize = 16;

/// Argon2id memory cost: 64 MiB (65536 KiB)
const ARGON2_MEMORY_COST: u32 = 65536;

/// Argon2id time cost: 3 iterations
const ARGON2_TIME_COST: u32 = 3;

/// Argon2id parallelism: 4 lanes
const ARGON2_PARALLELISM: u32 = 4;

/// Distinct salts whose keys are kept; the oldest is evicted beyond this.
const MAX_CACHED_KEYS: usize = 8;

type Salt = [u8; ARGON2_SALT_SIZE];
type DerivedKey = Zeroizing<[u8; AES_KEY_SIZE]>;

/// Derives an AES-256 key from a password and salt using Argon2id.
fn derive_key(password: &str, salt: &Salt) -> std::result::Result<DerivedKey, DecryptError> {
    let params = Params::new(
        ARGON2_MEMORY_COST,
        ARGON2_TIME_COST,
        ARGON2_PARALLELISM,
        Some(AES_KEY_SIZE),
    )
    .map_err(|e| DecryptError::KeyUnavailable(format!("invalid Argon2 parameters: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; AES_KEY_SIZE]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut *key)
        .map_err(|e| DecryptError::KeyUnavailable(format!("key derivation failed: {}", e)))?;

    Ok(key)
}

/// Derived keys by salt, evicting the oldest entry once full.
#[derive(Default)]
struct KeyCache {
    keys: HashMap<Salt, DerivedKey>,
    order: VecDeque<Salt>,
}

impl KeyCache {
    fn get(&self, salt: &Salt) -> Option<DerivedKey> {
        self.keys.get(salt).cloned()
    }

    fn insert(&mut self, salt: Salt, key: DerivedKey) {
        if self.keys.contains_key(&salt) {
            return;
        }
        if self.order.len() >= MAX_CACHED_KEYS
            && let Some(oldest) = self.order.pop_front()
        {
            self.keys.remove(&oldest);
        }
        self.order.push_back(salt);
        self.keys.insert(salt, key);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Field-level decrypt capability bound to one password.
///
/// Keeps the keys of the last eight distinct salts it has seen. Every cell
/// whose salt is not cached costs a full Argon2id derivation (64 MiB), so
/// tables written with a fresh salt per value decrypt at KDF speed.
pub struct FieldDecryptor {
    password: Zeroizing<String>,
    keys: Mutex<KeyCache>,
}

impl std::fmt::Debug for FieldDecryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDecryptor").finish_non_exhaustive()
    }
}

impl FieldDecryptor {
    /// Creates a capability for cells encrypted under `password`.
    pub fn new(password: Zeroizing<String>) -> Self {
        Self {
            password,
            keys: Mutex::new(KeyCache::default()),
        }
    }

    /// Returns the derived key for `salt`, deriving and caching on first use.
    fn key_for(&self, salt: &Salt) -> std::result::Result<DerivedKey, DecryptError> {
        if let Ok(keys) = self.keys.lock()
            && let Some(key) = keys.get(salt)
        {
            return Ok(key);
        }

        let key = derive_key(&self.password, salt)?;

        if let Ok(mut keys) = self.keys.lock() {
            keys.insert(*salt, key.clone());
        }

        Ok(key)
    }
}

impl Decryptor for FieldDecryptor {
    fn decrypt(&self, value: Option<&str>) -> std::result::Result<String, DecryptError> {
        let value = value.ok_or(DecryptError::NullValue)?;
        let encoded = value
            .strip_prefix(FIELD_PREFIX)
            .ok_or(DecryptError::NotEncrypted)?;

        let payload = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| DecryptError::Malformed(format!("invalid base64: {}", e)))?;

        let minimum = ARGON2_SALT_SIZE + AES_GCM_NONCE_SIZE + AES_GCM_TAG_SIZE;
        if payload.len() < minimum {
            return Err(DecryptError::Malformed(format!(
                "payload too short: expected at least {} bytes, got {}",
                minimum,
                payload.len()
            )));
        }

        let (salt, rest) = payload.split_at(ARGON2_SALT_SIZE);
        let (nonce, sealed) = rest.split_at(AES_GCM_NONCE_SIZE);

        let mut salt_bytes: Salt = [0u8; ARGON2_SALT_SIZE];
        salt_bytes.copy_from_slice(salt);
        let key = self.key_for(&salt_bytes)?;

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| DecryptError::Authentication)?;

        String::from_utf8(plaintext)
            .map_err(|_| DecryptError::Malformed("plaintext is not UTF-8".to_string()))
    }
}

/// Builds [`FieldDecryptor`] capabilities from a password store.
#[derive(Debug, Clone)]
pub struct PasswordCapabilityProvider<S> {
    store: S,
}

impl<S: PasswordStore> PasswordCapabilityProvider<S> {
    /// Creates a provider looking passwords up in `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: PasswordStore> CapabilityProvider for PasswordCapabilityProvider<S> {
    fn capability(&self, category: &str) -> Result<Arc<dyn Decryptor>> {
        let password = self.store.password(category)?;
        tracing::debug!("Built field decrypt capability for category '{}'", category);
        Ok(Arc::new(FieldDecryptor::new(password)))
    }
}
