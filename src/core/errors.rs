//! Custom error types for translation operations

use thiserror::Error;

/// Translation-related errors
#[derive(Error, Debug)]
pub enum TranslationError {
    /// API request failed
    #[error("API error: {status} - {message}")]
    ApiError {
        status: u16,
        message: String,
    },

    /// The translation service call failed or was rejected
    #[error("Translation error: {message}")]
    ServiceError {
        message: String,
    },

    /// The translation service asked us to slow down
    #[error("Rate limit exceeded. Retry after {retry_after:?} seconds")]
    RateLimitError {
        retry_after: Option<u64>,
    },

    /// Request timeout
    #[error("Request timeout")]
    TimeoutError,

    /// Translated text did not keep the source placeholders
    #[error("Placeholder validation failed: {message}")]
    ValidationError {
        message: String,
    },

    /// Writing or verifying a rewritten document failed; the file was rolled back
    #[error("Persistence error: {path} - {message}")]
    PersistenceError {
        path: String,
        message: String,
    },

    /// Locale has no service code in the catalog
    #[error("Unsupported locale: {locale}")]
    UnsupportedLocale {
        locale: String,
    },

    /// File operation error
    #[error("File error: {path} - {message}")]
    FileError {
        path: String,
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
    },

    /// Malformed document
    #[error("Invalid document: {message}")]
    InvalidFormat {
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Reqwest error
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// XML error
    #[error("XML error: {0}")]
    XmlError(#[from] quick_xml::Error),
}

impl TranslationError {
    /// Whether this error came from the external translation service
    pub fn is_service_error(&self) -> bool {
        matches!(
            self,
            TranslationError::ApiError { .. }
                | TranslationError::ServiceError { .. }
                | TranslationError::RateLimitError { .. }
                | TranslationError::TimeoutError
                | TranslationError::HttpError(_)
        )
    }

    /// Whether repeating the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::RateLimitError { .. }
            | TranslationError::TimeoutError
            | TranslationError::HttpError(_) => true,
            TranslationError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether this error is a placeholder validation failure
    pub fn is_validation_error(&self) -> bool {
        matches!(self, TranslationError::ValidationError { .. })
    }
}

impl From<config::ConfigError> for TranslationError {
    fn from(err: config::ConfigError) -> Self {
        TranslationError::ConfigError {
            message: err.to_string(),
        }
    }
}

/// Result type for translation operations
pub type Result<T> = std::result::Result<T, TranslationError>;
