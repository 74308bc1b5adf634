//! Translation service seam

use async_trait::async_trait;

use crate::core::errors::Result;
use crate::core::models::TranslationRequest;

/// Maps text from one language to another.
///
/// Implementations may fail or be rate limited; callers decide whether to
/// retry, skip or abort.
#[async_trait]
pub trait TranslationService: Send + Sync {
    /// Translate `request.text` into `request.target_lang`
    async fn translate(&self, request: &TranslationRequest) -> Result<String>;

    /// Human-readable service name for logs
    fn name(&self) -> &str;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::core::errors::TranslationError;
    use parking_lot::Mutex;

    type Handler = Box<dyn Fn(&TranslationRequest) -> Result<String> + Send + Sync>;

    /// Closure-driven service that records every request it sees
    pub(crate) struct MockTranslator {
        handler: Handler,
        pub(crate) requests: Mutex<Vec<TranslationRequest>>,
    }

    impl MockTranslator {
        pub(crate) fn new<F>(handler: F) -> Self
        where
            F: Fn(&TranslationRequest) -> Result<String> + Send + Sync + 'static,
        {
            Self {
                handler: Box::new(handler),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Prefixes the text with the target language: `[fr] Hello __PH0__`
        pub(crate) fn tagging() -> Self {
            Self::new(|req| Ok(format!("[{}] {}", req.target_lang, req.text)))
        }

        pub(crate) fn failing(message: &'static str) -> Self {
            Self::new(move |_| {
                Err(TranslationError::ServiceError {
                    message: message.to_string(),
                })
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.requests.lock().len()
        }
    }

    #[async_trait]
    impl TranslationService for MockTranslator {
        async fn translate(&self, request: &TranslationRequest) -> Result<String> {
            self.requests.lock().push(request.clone());
            (self.handler)(request)
        }

        fn name(&self) -> &str {
            "mock"
        }
    }
}
