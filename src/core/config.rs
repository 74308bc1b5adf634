//! Configuration management

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::errors::{Result, TranslationError};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "xcloc-translator.toml";

/// Prefix of environment variable overrides (`XCLOC_API_KEY`, ...)
pub const ENV_PREFIX: &str = "XCLOC";

/// Keyless web endpoint used when no API key is configured
pub const DEFAULT_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

/// Largest accepted `max_retries`
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Extra locale mapping on top of the built-in catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageOverride {
    pub locale: String,
    pub service_code: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Configuration for translator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub api_endpoint: String,
    pub api_key: Option<String>,
    pub source_lang: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub units_per_pause: usize,
    pub unit_pause_ms: u64,
    pub language_pause_ms: u64,
    pub bundle_extension: String,
    pub document_extension: String,
    pub default_skip: Vec<String>,
    pub languages: Vec<LanguageOverride>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            source_lang: "en".to_string(),
            timeout_ms: 30000,
            max_retries: 2,
            retry_delay_ms: 1000,
            units_per_pause: 10,
            unit_pause_ms: 500,
            language_pause_ms: 1000,
            bundle_extension: "xcloc".to_string(),
            document_extension: "xliff".to_string(),
            default_skip: vec!["en".to_string()],
            languages: vec![],
        }
    }
}

impl TranslatorConfig {
    /// Load configuration: defaults, then the config file, then `XCLOC_*` variables.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(TranslationError::ConfigError {
                        message: format!("config file not found: {}", path.display()),
                    });
                }
                info!("Loading configuration from {}", path.display());
                builder = builder.add_source(File::from(path));
            }
            None => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false));
            }
        }

        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_endpoint.trim().is_empty() {
            return Err(config_error("api_endpoint is required"));
        }

        if self.source_lang.trim().is_empty() {
            return Err(config_error("source_lang is required"));
        }

        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(config_error(&format!(
                "max_retries must be at most {}",
                MAX_RETRIES_LIMIT
            )));
        }

        if self.units_per_pause == 0 {
            return Err(config_error("units_per_pause must be greater than 0"));
        }

        if self.bundle_extension.is_empty() || self.document_extension.is_empty() {
            return Err(config_error("bundle and document extensions must not be empty"));
        }

        if self.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            warn!("Empty api_key configured, falling back to the keyless endpoint");
        }

        Ok(())
    }

    /// API key, if a non-blank one is configured
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// Pause taken after every `units_per_pause` translated units
    pub fn unit_pause(&self) -> Duration {
        Duration::from_millis(self.unit_pause_ms)
    }

    /// Pause taken between two languages of a batch
    pub fn language_pause(&self) -> Duration {
        Duration::from_millis(self.language_pause_ms)
    }

    /// HTTP request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Config without any pauses, for tests and dry local runs
    pub fn without_pauses(mut self) -> Self {
        self.unit_pause_ms = 0;
        self.language_pause_ms = 0;
        self
    }
}

fn config_error(message: &str) -> TranslationError {
    TranslationError::ConfigError {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_validation() {
        let config = TranslatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.unit_pause(), Duration::from_millis(500));
        assert_eq!(config.units_per_pause, 10);
        assert!(config.api_key().is_none());
    }

    #[test]
    fn test_config_validation_rejects_zero_pause_interval() {
        let config = TranslatorConfig {
            units_per_pause: 0,
            ..Default::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_missing_endpoint() {
        let config = TranslatorConfig {
            api_endpoint: "".to_string(),
            ..Default::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_caps_retries() {
        let config = TranslatorConfig {
            max_retries: MAX_RETRIES_LIMIT,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let config = TranslatorConfig {
            max_retries: 64,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_retries"));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
source_lang = "en"
unit_pause_ms = 0
default_skip = ["en", "ar"]

[[languages]]
locale = "en-GB"
service_code = "en"
name = "English (UK)"
"#
        )
        .unwrap();

        let config = TranslatorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.unit_pause_ms, 0);
        assert_eq!(config.default_skip, vec!["en", "ar"]);
        assert_eq!(config.languages.len(), 1);
        assert_eq!(config.languages[0].locale, "en-GB");
        // untouched keys keep their defaults
        assert_eq!(config.document_extension, "xliff");
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let result = TranslatorConfig::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(TranslationError::ConfigError { .. })));
    }

    #[test]
    fn test_load_from_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"max_retries": 5, "bundle_extension": "xcloc"}}"#).unwrap();

        let config = TranslatorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.source_lang, "en");
    }
}
