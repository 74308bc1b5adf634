//! Translate-and-validate pipeline for a single translation unit

use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::errors::TranslationError;
use crate::core::models::{FailurePolicy, TranslationRequest, TranslationUnit};
use crate::core::placeholder::PlaceholderCodec;
use crate::core::service::TranslationService;
use crate::core::skip::SkipPolicy;
use crate::core::validator::PlaceholderValidator;

/// Text to store for a unit plus what went wrong producing it
#[derive(Debug)]
pub struct UnitOutcome {
    pub text: String,
    pub error: Option<TranslationError>,
    /// Validation problem accepted under [`FailurePolicy::Relaxed`]
    pub warning: Option<String>,
}

impl UnitOutcome {
    fn unchanged(text: &str) -> Self {
        Self {
            text: text.to_string(),
            error: None,
            warning: None,
        }
    }

    fn failed(text: &str, error: TranslationError) -> Self {
        Self {
            text: text.to_string(),
            error: Some(error),
            warning: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Orchestrates skip policy, placeholder codec, service call and validation.
///
/// Performs no persistence; callers apply the outcome to the unit.
#[derive(Clone)]
pub struct UnitProcessor {
    codec: PlaceholderCodec,
    skip: SkipPolicy,
    validator: PlaceholderValidator,
    service: Arc<dyn TranslationService>,
}

impl UnitProcessor {
    /// Processor with the default placeholder grammar
    pub fn new(service: Arc<dyn TranslationService>) -> Self {
        let codec = PlaceholderCodec::new();
        Self {
            skip: SkipPolicy::new(codec.clone()),
            validator: PlaceholderValidator::new(codec.clone()),
            codec,
            service,
        }
    }

    pub fn service(&self) -> &Arc<dyn TranslationService> {
        &self.service
    }

    /// Translate the source segment of `unit`
    pub async fn translate_unit(
        &self,
        unit: &TranslationUnit,
        source_lang: &str,
        target_lang: &str,
        policy: FailurePolicy,
    ) -> UnitOutcome {
        self.translate_text(&unit.source_text, source_lang, target_lang, policy)
            .await
    }

    /// Translate one segment, keeping its placeholders intact
    pub async fn translate_text(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        policy: FailurePolicy,
    ) -> UnitOutcome {
        if self.skip.should_skip(text) {
            debug!("Skipping non-linguistic segment {:?}", text);
            return UnitOutcome::unchanged(text);
        }

        let extracted = self.codec.extract(text);
        if extracted.is_blank() {
            return UnitOutcome::unchanged(text);
        }

        let request = TranslationRequest::new(extracted.text.clone(), target_lang.to_string())
            .with_source_lang(source_lang);

        let translated = match self.service.translate(&request).await {
            Ok(translated) => translated,
            Err(e) => {
                let error = match e {
                    TranslationError::ServiceError { .. } => e,
                    other => TranslationError::ServiceError {
                        message: other.to_string(),
                    },
                };
                return UnitOutcome::failed(text, error);
            }
        };

        let restored = self.codec.restore(&translated, &extracted.tokens);

        match self.validator.validate(text, &restored) {
            Ok(()) => UnitOutcome {
                text: restored,
                error: None,
                warning: None,
            },
            Err(mismatch) => match policy {
                FailurePolicy::Strict => UnitOutcome::failed(
                    text,
                    TranslationError::ValidationError {
                        message: mismatch.to_string(),
                    },
                ),
                FailurePolicy::Relaxed => {
                    warn!("Placeholder validation failed for {:?}: {}", text, mismatch);
                    UnitOutcome {
                        text: restored,
                        error: None,
                        warning: Some(mismatch.to_string()),
                    }
                }
            },
        }
    }
}
