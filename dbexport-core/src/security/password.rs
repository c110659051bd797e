//! Category-keyed password stores.
//!
//! Passwords are returned in `Zeroizing` containers so they are cleared
//! from memory once the capability built from them is dropped. No store
//! exposes a password through `Debug`.

use crate::{Result, error::ExportError};
use std::collections::HashMap;
use zeroize::Zeroizing;

/// Source of field-encryption passwords, looked up by category.
pub trait PasswordStore: Send + Sync {
    /// Returns the password for `category`.
    ///
    /// # Errors
    /// Returns a configuration error if the category has no password.
    fn password(&self, category: &str) -> Result<Zeroizing<String>>;
}

/// Reads passwords from `<PREFIX><CATEGORY>` environment variables.
///
/// The category is upper-cased and every non-alphanumeric character becomes
/// `_`, so category `pii` maps to `DBEXPORT_PASSWORD_PII`.
#[derive(Debug, Clone)]
pub struct EnvPasswordStore {
    prefix: String,
}

impl Default for EnvPasswordStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PREFIX)
    }
}

impl EnvPasswordStore {
    /// Variable prefix used by [`EnvPasswordStore::default`].
    pub const DEFAULT_PREFIX: &'static str = "DBEXPORT_PASSWORD_";

    /// Creates a store reading `<prefix><CATEGORY>` variables.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Environment variable consulted for `category`.
    pub fn variable_name(&self, category: &str) -> String {
        let suffix: String = category
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}{}", self.prefix, suffix)
    }
}

impl PasswordStore for EnvPasswordStore {
    fn password(&self, category: &str) -> Result<Zeroizing<String>> {
        let variable = self.variable_name(category);
        match std::env::var(&variable) {
            Ok(password) if !password.is_empty() => Ok(Zeroizing::new(password)),
            _ => Err(ExportError::configuration(format!(
                "No password for category '{}' (set {})",
                category, variable
            ))),
        }
    }
}

/// In-memory password store.
#[derive(Clone, Default)]
pub struct StaticPasswordStore {
    entries: HashMap<String, Zeroizing<String>>,
}

impl std::fmt::Debug for StaticPasswordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut categories: Vec<&String> = self.entries.keys().collect();
        categories.sort();
        f.debug_struct("StaticPasswordStore")
            .field("categories", &categories)
            .finish()
    }
}

impl StaticPasswordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to register a password for a category.
    pub fn with_password(mut self, category: impl Into<String>, password: impl Into<String>) -> Self {
        self.entries
            .insert(category.into(), Zeroizing::new(password.into()));
        self
    }
}

impl PasswordStore for StaticPasswordStore {
    fn password(&self, category: &str) -> Result<Zeroizing<String>> {
        self.entries.get(category).cloned().ok_or_else(|| {
            ExportError::configuration(format!("No password for category '{}'", category))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_name_normalizes_category() {
        let store = EnvPasswordStore::default();
        assert_eq!(store.variable_name("PII"), "DBEXPORT_PASSWORD_PII");
        assert_eq!(store.variable_name("pii-v2"), "DBEXPORT_PASSWORD_PII_V2");
    }

    #[test]
    fn test_env_store_missing_variable() {
        let store = EnvPasswordStore::new("DBEXPORT_TEST_UNSET_");
        let error = store.password("nothing").unwrap_err().to_string();
        assert!(error.contains("DBEXPORT_TEST_UNSET_NOTHING"));
    }

    #[test]
    fn test_static_store_lookup() {
        let store = StaticPasswordStore::new().with_password("PII", "s3cret");
        assert_eq!(store.password("PII").unwrap().as_str(), "s3cret");
        assert!(store.password("PHI").is_err());
    }

    #[test]
    fn test_static_store_debug_hides_passwords() {
        let store = StaticPasswordStore::new().with_password("PII", "s3cret");
        let debug = format!("{:?}", store);
        assert!(debug.contains("PII"));
        assert!(!debug.contains("s3cret"));
    }
}
