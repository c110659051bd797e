//! Decrypt capability traits and the marker-prefix capability.

use crate::Result;
use std::sync::Arc;
use thiserror::Error;

/// Why a single value could not be decrypted.
///
/// These failures are routine: on the detection row they mark a column as
/// plaintext, on later rows they become cell errors in the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecryptError {
    /// The cell is SQL NULL
    #[error("Decryption failed: value is null")]
    NullValue,

    /// The value does not carry this capability's ciphertext format
    #[error("Decryption failed: value is not encrypted")]
    NotEncrypted,

    /// The value looks encrypted but cannot be parsed
    #[error("Decryption failed: malformed ciphertext ({0})")]
    Malformed(String),

    /// Authentication tag mismatch: wrong key or corrupted data
    #[error("Decryption failed: authentication failed (wrong key or corrupted data)")]
    Authentication,

    /// The key for this value could not be produced
    #[error("Decryption failed: key unavailable ({0})")]
    KeyUnavailable(String),
}

/// A decrypt capability bound to one secret.
///
/// Implementations must be deterministic for a given input and must fail,
/// rather than pass the input through, when the value is not encrypted.
pub trait Decryptor: Send + Sync {
    /// Decrypts a raw cell value (`None` is SQL NULL).
    ///
    /// # Errors
    /// Returns [`DecryptError`] when the value is not validly encrypted
    /// under this capability.
    fn decrypt(&self, value: Option<&str>) -> std::result::Result<String, DecryptError>;
}

impl<F> Decryptor for F
where
    F: Fn(Option<&str>) -> std::result::Result<String, DecryptError> + Send + Sync,
{
    fn decrypt(&self, value: Option<&str>) -> std::result::Result<String, DecryptError> {
        self(value)
    }
}

/// Looks up a decrypt capability by category (for example `PII`).
pub trait CapabilityProvider {
    /// Returns the capability for `category`.
    ///
    /// # Errors
    /// Returns a configuration error if no secret is available for the
    /// category; this is fatal to the run.
    fn capability(&self, category: &str) -> Result<Arc<dyn Decryptor>>;
}

/// Capability for values marked with a textual prefix.
///
/// `ENC:123-45-6789` decrypts to `123-45-6789`; anything without the prefix,
/// including NULL, fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixDecryptor {
    prefix: String,
}

impl Default for PrefixDecryptor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PREFIX)
    }
}

impl PrefixDecryptor {
    /// Marker used when none is configured.
    pub const DEFAULT_PREFIX: &'static str = "ENC:";

    /// Creates a capability for values starting with `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The marker this capability strips.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Decryptor for PrefixDecryptor {
    fn decrypt(&self, value: Option<&str>) -> std::result::Result<String, DecryptError> {
        let value = value.ok_or(DecryptError::NullValue)?;
        value
            .strip_prefix(self.prefix.as_str())
            .map(str::to_string)
            .ok_or(DecryptError::NotEncrypted)
    }
}
