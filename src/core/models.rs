//! Core data models for translation

use serde::{Deserialize, Serialize};
use std::fmt;

/// XLIFF state written for accepted machine translations
pub const STATE_TRANSLATED: &str = "translated";

/// XLIFF state written for units that must be looked at again
pub const STATE_NEEDS_REVIEW: &str = "needs-review-l10n";

/// What to do when translated text loses or gains placeholders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Reject the translation and keep the source text
    Strict,
    /// Accept the translation and log a warning
    #[default]
    Relaxed,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Strict => write!(f, "strict"),
            FailurePolicy::Relaxed => write!(f, "relaxed"),
        }
    }
}

/// Translation state of a unit's target segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitState {
    /// No target element at all
    Missing,
    /// Target element present but blank
    Empty,
    /// Target flagged `needs-review-*`
    NeedsReview,
    /// Target flagged `translated`
    Translated,
    /// Any other target with text (`final`, `signed-off`, no state, ...)
    UpToDate,
}

impl UnitState {
    /// Derive the state from a target segment and its `state` attribute
    pub fn classify(target: Option<&str>, state_attr: Option<&str>) -> Self {
        match target {
            None => UnitState::Missing,
            Some(text) if text.trim().is_empty() => UnitState::Empty,
            Some(_) => match state_attr {
                Some(state) if state.starts_with("needs-review") => UnitState::NeedsReview,
                Some(STATE_TRANSLATED) => UnitState::Translated,
                _ => UnitState::UpToDate,
            },
        }
    }

    /// Attribute value written back for this state, if it is one we write
    pub fn as_attr(&self) -> Option<&'static str> {
        match self {
            UnitState::Translated => Some(STATE_TRANSLATED),
            UnitState::NeedsReview => Some(STATE_NEEDS_REVIEW),
            _ => None,
        }
    }
}

/// One source/target segment pair of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub id: String,
    pub source_text: String,
    pub target_text: Option<String>,
    pub state: UnitState,
    #[serde(skip)]
    pub(crate) modified: bool,
    /// A `<target>` element existed when the unit was parsed
    #[serde(skip)]
    pub(crate) target_element: bool,
}

impl TranslationUnit {
    /// Unit without a `<target>` element
    pub fn new(id: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_text: source_text.into(),
            target_text: None,
            state: UnitState::Missing,
            modified: false,
            target_element: false,
        }
    }

    /// Attach the target read from the file, classifying its state
    pub fn with_target(mut self, target: impl Into<String>, state_attr: Option<&str>) -> Self {
        let target = target.into();
        self.state = UnitState::classify(Some(&target), state_attr);
        self.target_text = Some(target);
        self.target_element = true;
        self
    }

    /// Whether the unit was changed since the document was loaded
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Target equals source once surrounding whitespace is ignored
    pub fn target_matches_source(&self) -> bool {
        self.target_text
            .as_deref()
            .is_some_and(|t| t.trim() == self.source_text.trim())
    }

    /// Set the target segment and mark the unit for persistence
    pub fn set_target(&mut self, text: impl Into<String>, state: UnitState) {
        self.target_text = Some(text.into());
        self.state = state;
        self.modified = true;
    }
}

/// Translation request handed to a translation service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
    pub source_lang: Option<String>,
    pub target_lang: String,
}

impl TranslationRequest {
    pub fn new(text: String, target_lang: String) -> Self {
        Self {
            text,
            source_lang: None,
            target_lang,
        }
    }

    pub fn with_source_lang(mut self, source_lang: impl Into<String>) -> Self {
        self.source_lang = Some(source_lang.into());
        self
    }

    /// Source language sent to the service (`auto` when unknown)
    pub fn source_or_auto(&self) -> &str {
        self.source_lang.as_deref().unwrap_or("auto")
    }
}

/// Per-file counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResult {
    pub translated: usize,
    pub errors: usize,
}

impl FileResult {
    pub fn new(translated: usize, errors: usize) -> Self {
        Self { translated, errors }
    }
}

impl std::ops::AddAssign for FileResult {
    fn add_assign(&mut self, rhs: Self) {
        self.translated += rhs.translated;
        self.errors += rhs.errors;
    }
}

/// Maximum characters of source text kept in an error record
pub const ERROR_SNIPPET_CHARS: usize = 50;

/// One failed unit or file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub file: String,
    pub text: String,
    pub message: String,
    pub at: chrono::DateTime<chrono::Utc>,
}

impl ErrorRecord {
    /// Record timestamped now; `text` is cut to [`ERROR_SNIPPET_CHARS`]
    pub fn new(file: impl Into<String>, text: &str, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            text: text.chars().take(ERROR_SNIPPET_CHARS).collect(),
            message: message.into(),
            at: chrono::Utc::now(),
        }
    }
}
