//! Decryption capabilities and the secrets they are built from.
//!
//! The export engine never sees key material. It is handed a
//! [`Decryptor`]: an opaque function from a raw cell value to plaintext that
//! fails with [`DecryptError`] when the value is not encrypted under it.
//!
//! # Module Structure
//! - `decrypt`: the capability traits, `DecryptError`, and the marker-prefix
//!   capability
//! - `password`: category-keyed password stores with zeroizing storage
//! - `field`: AES-256-GCM field decryption with Argon2id key derivation
//!   (feature-gated)

mod decrypt;
mod password;

#[cfg(feature = "encryption")]
pub mod field;

pub use decrypt::{CapabilityProvider, DecryptError, Decryptor, PrefixDecryptor};
pub use password::{EnvPasswordStore, PasswordStore, StaticPasswordStore};

#[cfg(feature = "encryption")]
pub use field::{FieldDecryptor, PasswordCapabilityProvider};

/// Category used when no other is configured.
pub const DEFAULT_CATEGORY: &str = "PII";
