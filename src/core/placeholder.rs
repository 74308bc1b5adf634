//! Placeholder tokenization
//!
//! Format specifiers, variable references, brace indices, decorative symbols
//! and measurement-unit literals must survive machine translation byte for
//! byte. Before a segment is sent out every protected token is swapped for a
//! marker (`__PH0__`, `__PH1__`, ...) and swapped back afterwards.
//!
//! A marker-shaped sequence already present in the source is itself protected
//! as a token, so it comes back unchanged.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Conversion part of a printf-style specifier (`@`, `d`, `lld`, `.2f`, ...)
const CONVERSION: &str = r"(?:@|s|(?:ll|l|h)?[diu]|l?f|\.\d+f)";

/// Unit abbreviations protected inside running text
pub const PROTECTED_UNITS: &[&str] = &["kg", "lbs", "ml", "oz", "min", "sec", "hr", "km", "ft", "cm"];

/// Marker prefix reserved for extracted placeholders
pub const MARKER_PREFIX: &str = "__PH";

/// Grammar variants, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaceholderKind {
    /// `__PH3__` written literally in the source
    ReservedMarker,
    /// `%1$@`, `%2$lld`
    PositionalSpecifier,
    /// `%@`, `%d`, `%lld`, `%.1f`
    FormatSpecifier,
    /// `$(PRODUCT_NAME)`
    VariableReference,
    /// `{0}`
    BraceIndex,
    /// `°C`, `°F`, `💧`
    DecorativeSymbol,
    /// `kg`, `ml`, `min`, ...
    UnitLiteral,
}

impl PlaceholderKind {
    /// All variants in the order they are tried
    pub const ALL: [PlaceholderKind; 7] = [
        PlaceholderKind::ReservedMarker,
        PlaceholderKind::PositionalSpecifier,
        PlaceholderKind::FormatSpecifier,
        PlaceholderKind::VariableReference,
        PlaceholderKind::BraceIndex,
        PlaceholderKind::DecorativeSymbol,
        PlaceholderKind::UnitLiteral,
    ];

    fn pattern(&self) -> String {
        match self {
            PlaceholderKind::ReservedMarker => format!(r"{}\d+__", MARKER_PREFIX),
            PlaceholderKind::PositionalSpecifier => format!(r"%\d+\${}", CONVERSION),
            PlaceholderKind::FormatSpecifier => format!("%{}", CONVERSION),
            PlaceholderKind::VariableReference => r"\$\([^)\n]*\)".to_string(),
            PlaceholderKind::BraceIndex => r"\{\d+\}".to_string(),
            PlaceholderKind::DecorativeSymbol => "°[CF]|💧".to_string(),
            // group 1 is the token; a leading digit is allowed so "5kg" is covered
            PlaceholderKind::UnitLiteral => {
                format!(r"(?:\b|\d)({})\b", PROTECTED_UNITS.join("|"))
            }
        }
    }
}

impl fmt::Display for PlaceholderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaceholderKind::ReservedMarker => "reserved marker",
            PlaceholderKind::PositionalSpecifier => "positional specifier",
            PlaceholderKind::FormatSpecifier => "format specifier",
            PlaceholderKind::VariableReference => "variable reference",
            PlaceholderKind::BraceIndex => "brace index",
            PlaceholderKind::DecorativeSymbol => "decorative symbol",
            PlaceholderKind::UnitLiteral => "unit literal",
        };
        write!(f, "{}", name)
    }
}

/// A protected substring found in a segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    pub kind: PlaceholderKind,
    pub literal: String,
    pub ordinal: usize,
}

impl Placeholder {
    /// Marker standing in for this placeholder while the text is translated
    pub fn marker(&self) -> String {
        format!("{}{}__", MARKER_PREFIX, self.ordinal)
    }
}

/// Result of [`PlaceholderCodec::extract`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Text with every placeholder replaced by its marker
    pub text: String,
    /// Placeholders in order of appearance
    pub tokens: Vec<Placeholder>,
}

impl Extracted {
    /// True when nothing but markers and whitespace is left
    pub fn is_blank(&self) -> bool {
        let mut rest = self.text.clone();
        for token in &self.tokens {
            rest = rest.replace(&token.marker(), "");
        }
        rest.trim().is_empty()
    }
}

/// One independently testable grammar variant
#[derive(Debug, Clone)]
pub struct Matcher {
    kind: PlaceholderKind,
    regex: Regex,
}

impl Matcher {
    fn new(kind: PlaceholderKind) -> Self {
        let regex = Regex::new(&kind.pattern()).expect("placeholder patterns are valid");
        Self { kind, regex }
    }

    /// Grammar variant this matcher recognizes
    pub fn kind(&self) -> PlaceholderKind {
        self.kind
    }

    /// Byte range of the first token starting at or after `start`
    pub fn find_at(&self, text: &str, start: usize) -> Option<Range<usize>> {
        let caps = self.regex.captures_at(text, start)?;
        let token = caps.get(1).or_else(|| caps.get(0))?;
        Some(token.range())
    }
}

/// Tokenizes and detokenizes protected substrings
#[derive(Debug, Clone)]
pub struct PlaceholderCodec {
    matchers: Vec<Matcher>,
    marker: Regex,
}

impl Default for PlaceholderCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaceholderCodec {
    /// Create a codec with every grammar variant enabled
    pub fn new() -> Self {
        Self {
            matchers: PlaceholderKind::ALL.iter().copied().map(Matcher::new).collect(),
            marker: Regex::new(r"__PH(\d+)__").expect("marker pattern is valid"),
        }
    }

    /// Leftmost, non-overlapping scan; ties go to the earlier variant.
    fn scan(&self, text: &str) -> Vec<(PlaceholderKind, Range<usize>)> {
        let mut found = Vec::new();
        let mut pos = 0;

        while pos < text.len() {
            let mut best: Option<(PlaceholderKind, Range<usize>)> = None;
            for matcher in &self.matchers {
                if let Some(range) = matcher.find_at(text, pos) {
                    let better = best.as_ref().map_or(true, |(_, b)| range.start < b.start);
                    if better {
                        best = Some((matcher.kind, range));
                    }
                }
            }

            match best {
                Some((kind, range)) => {
                    pos = range.end;
                    found.push((kind, range));
                }
                None => break,
            }
        }

        found
    }

    /// Placeholders present in `text`, in order
    pub fn find(&self, text: &str) -> Vec<Placeholder> {
        self.scan(text)
            .into_iter()
            .enumerate()
            .map(|(ordinal, (kind, range))| Placeholder {
                kind,
                literal: text[range].to_string(),
                ordinal,
            })
            .collect()
    }

    /// `text` with every placeholder removed
    pub fn strip(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for (_, range) in self.scan(text) {
            out.push_str(&text[last..range.start]);
            last = range.end;
        }
        out.push_str(&text[last..]);
        out
    }

    /// Replace every placeholder with its marker
    pub fn extract(&self, text: &str) -> Extracted {
        let mut out = String::with_capacity(text.len());
        let mut tokens = Vec::new();
        let mut last = 0;

        for (ordinal, (kind, range)) in self.scan(text).into_iter().enumerate() {
            out.push_str(&text[last..range.start]);
            let token = Placeholder {
                kind,
                literal: text[range.clone()].to_string(),
                ordinal,
            };
            out.push_str(&token.marker());
            tokens.push(token);
            last = range.end;
        }
        out.push_str(&text[last..]);

        Extracted { text: out, tokens }
    }

    /// Put the original literals back in place of their markers.
    ///
    /// Single pass, so a literal that looks like a marker is never expanded
    /// again. Markers with an unknown ordinal are left untouched.
    pub fn restore(&self, text: &str, tokens: &[Placeholder]) -> String {
        if tokens.is_empty() {
            return text.to_string();
        }

        self.marker
            .replace_all(text, |caps: &Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| tokens.iter().find(|t| t.ordinal == n))
                    .map(|t| t.literal.clone())
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}
