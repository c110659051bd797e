//! Column decryption classification.
//!
//! The first data row of a table decides, column by column, whether values
//! are encrypted: a column is decryptable exactly when the capability
//! succeeded on its first value. Failures on that row are expected and are
//! never reported as cell errors.

use crate::adapters::RowValues;
use crate::security::Decryptor;

/// Per-column decryptability flags, fixed by the first data row.
///
/// Scoped to a single table export and never reused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnClassification {
    flags: Vec<bool>,
}

impl ColumnClassification {
    /// Flags in result-set column order.
    pub fn flags(&self) -> &[bool] {
        &self.flags
    }

    /// Whether later values in column `index` should be decrypted.
    pub fn is_decryptable(&self, index: usize) -> bool {
        self.flags.get(index).copied().unwrap_or(false)
    }

    /// Number of flagged columns.
    pub fn decryptable_count(&self) -> usize {
        self.flags.iter().filter(|flag| **flag).count()
    }
}

impl From<Vec<bool>> for ColumnClassification {
    fn from(flags: Vec<bool>) -> Self {
        Self { flags }
    }
}

/// Classifies the detection row and returns the values to emit for it.
///
/// Each column is tried independently. On success the plaintext replaces
/// the raw value and the column is flagged; on failure the raw value is kept
/// and the column is not flagged. NULL cells are handed to the capability
/// like any other value.
pub fn classify(raw_values: RowValues, decryptor: &dyn Decryptor) -> (RowValues, ColumnClassification) {
    let mut flags = Vec::with_capacity(raw_values.len());
    let values = raw_values
        .into_iter()
        .map(|raw| match decryptor.decrypt(raw.as_deref()) {
            Ok(plaintext) => {
                flags.push(true);
                Some(plaintext)
            }
            Err(_) => {
                flags.push(false);
                raw
            }
        })
        .collect();

    (values, ColumnClassification { flags })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::{DecryptError, PrefixDecryptor};

    fn row(values: &[Option<&str>]) -> RowValues {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    #[test]
    fn test_flags_follow_first_row() {
        let (values, classification) =
            classify(row(&[Some("1"), Some("ENC:123-45-6789")]), &PrefixDecryptor::default());

        assert_eq!(classification.flags(), [false, true]);
        assert_eq!(values, row(&[Some("1"), Some("123-45-6789")]));
        assert!(classification.is_decryptable(1));
        assert!(!classification.is_decryptable(0));
        assert!(!classification.is_decryptable(7));
        assert_eq!(classification.decryptable_count(), 1);
    }

    #[test]
    fn test_null_rejected_by_capability_is_plaintext() {
        let (values, classification) =
            classify(row(&[None, Some("ENC:x")]), &PrefixDecryptor::default());

        assert_eq!(classification.flags(), [false, true]);
        assert_eq!(values, row(&[None, Some("x")]));
    }

    #[test]
    fn test_null_accepted_by_capability_flags_column() {
        let null_tolerant = |value: Option<&str>| -> Result<String, DecryptError> {
            match value {
                None => Ok(String::new()),
                Some(v) => Err(if v.is_empty() {
                    DecryptError::Malformed("empty".to_string())
                } else {
                    DecryptError::NotEncrypted
                }),
            }
        };

        let (values, classification) = classify(row(&[None, Some("plain")]), &null_tolerant);

        assert_eq!(classification.flags(), [true, false]);
        assert_eq!(values, row(&[Some(""), Some("plain")]));
    }

    #[test]
    fn test_empty_row() {
        let (values, classification) = classify(Vec::new(), &PrefixDecryptor::default());
        assert!(values.is_empty());
        assert!(classification.flags().is_empty());
    }
}
