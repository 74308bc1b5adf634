//! Placeholder invariant between a source segment and its translation
//!
//! A translation is accepted when it carries the same number of placeholders
//! as the source and the same set of distinct tokens. Order is free, since
//! target languages may move arguments around.

use std::collections::BTreeSet;
use std::fmt;

use crate::core::placeholder::PlaceholderCodec;

/// Why a translation failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderMismatch {
    Count { original: usize, translated: usize },
    Missing(Vec<String>),
    Extra(Vec<String>),
}

impl fmt::Display for PlaceholderMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaceholderMismatch::Count { original, translated } => write!(
                f,
                "Placeholder count mismatch: original has {}, translated has {}",
                original, translated
            ),
            PlaceholderMismatch::Missing(tokens) => {
                write!(f, "Missing placeholders: {}", tokens.join(", "))
            }
            PlaceholderMismatch::Extra(tokens) => {
                write!(f, "Extra placeholders: {}", tokens.join(", "))
            }
        }
    }
}

/// Checks the placeholder invariant
#[derive(Debug, Clone, Default)]
pub struct PlaceholderValidator {
    codec: PlaceholderCodec,
}

impl PlaceholderValidator {
    /// Validator that finds placeholders with `codec`
    pub fn new(codec: PlaceholderCodec) -> Self {
        Self { codec }
    }

    /// Check that `translated` keeps the placeholders of `original`.
    ///
    /// Missing tokens are reported first, then extra ones, then a count mismatch
    /// caused by a duplicated or dropped repeat of a known token.
    pub fn validate(&self, original: &str, translated: &str) -> Result<(), PlaceholderMismatch> {
        let original_tokens = self.codec.find(original);
        let translated_tokens = self.codec.find(translated);

        // a count mismatch that is really a dropped token reads better as "missing"
        let original_set: BTreeSet<&str> = original_tokens.iter().map(|p| p.literal.as_str()).collect();
        let translated_set: BTreeSet<&str> =
            translated_tokens.iter().map(|p| p.literal.as_str()).collect();

        let missing: Vec<String> = original_set
            .difference(&translated_set)
            .map(|s| s.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PlaceholderMismatch::Missing(missing));
        }

        let extra: Vec<String> = translated_set
            .difference(&original_set)
            .map(|s| s.to_string())
            .collect();
        if !extra.is_empty() {
            return Err(PlaceholderMismatch::Extra(extra));
        }

        if original_tokens.len() != translated_tokens.len() {
            return Err(PlaceholderMismatch::Count {
                original: original_tokens.len(),
                translated: translated_tokens.len(),
            });
        }

        Ok(())
    }
}
