//! Decides whether a segment needs a translation call at all

use crate::core::placeholder::PlaceholderCodec;

/// Segments that are exactly one of these are never translated
pub const UNIT_LITERALS: &[&str] = &[
    "kg", "lbs", "ml", "oz", "min", "sec", "hr", "km", "mi", "ft", "in", "m", "cm",
];

/// Leftovers that do not count as translatable text
pub const BARE_PUNCTUATION: &[&str] = &[".", ",", "!", "?", "...", ":", ";"];

/// Skip rules for empty, unit-only and placeholder-only segments
#[derive(Debug, Clone, Default)]
pub struct SkipPolicy {
    codec: PlaceholderCodec,
}

impl SkipPolicy {
    /// Skip rules that recognize placeholders with `codec`
    pub fn new(codec: PlaceholderCodec) -> Self {
        Self { codec }
    }

    /// Whether `text` can be kept as is without a translation call
    pub fn should_skip(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return true;
        }

        if UNIT_LITERALS.contains(&trimmed) {
            return true;
        }

        let rest = self.codec.strip(text);
        let rest = rest.trim();
        rest.is_empty() || BARE_PUNCTUATION.contains(&rest)
    }
}
