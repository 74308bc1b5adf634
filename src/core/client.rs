//! Google Translate client with retry logic

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::core::config::{TranslatorConfig, DEFAULT_ENDPOINT};
use crate::core::errors::{Result, TranslationError};
use crate::core::models::TranslationRequest;
use crate::core::service::TranslationService;

/// Official Cloud Translation v2 endpoint, used when an API key is configured
pub const V2_ENDPOINT: &str = "https://translation.googleapis.com/language/translate/v2";

/// Texts longer than this are rejected before any request is made
const MAX_CHARS_PER_REQUEST: usize = 30_000;

/// Wait before retry `attempt` (1-based): `base_ms` doubled per earlier retry, saturating
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor))
}

/// Which Google endpoint flavour is spoken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApiMode {
    /// Keyless `translate_a/single?client=gtx`
    Web,
    /// Keyed Cloud Translation v2
    Cloud,
}

/// Async Google Translate client
#[derive(Clone)]
pub struct GoogleTranslator {
    client: reqwest::Client,
    config: Arc<TranslatorConfig>,
    endpoint: String,
    mode: ApiMode,
}

impl std::fmt::Debug for GoogleTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleTranslator")
            .field("endpoint", &self.endpoint)
            .field("mode", &self.mode)
            .field("api_key", &self.config.api_key().map(|_| "***"))
            .finish()
    }
}

impl GoogleTranslator {
    /// Create a new translator
    pub fn new(config: TranslatorConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .pool_max_idle_per_host(4)
            .build()?;

        let (mode, endpoint) = match config.api_key() {
            Some(_) if config.api_endpoint == DEFAULT_ENDPOINT => (ApiMode::Cloud, V2_ENDPOINT.to_string()),
            Some(_) => (ApiMode::Cloud, config.api_endpoint.clone()),
            None => (ApiMode::Web, config.api_endpoint.clone()),
        };

        info!("Using {} translation endpoint {}", mode.label(), endpoint);

        Ok(Self {
            client,
            config: Arc::new(config),
            endpoint,
            mode,
        })
    }

    /// Translate with retries and exponential backoff
    async fn translate_with_retries(&self, request: &TranslationRequest) -> Result<String> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.config.retry_delay_ms, attempt);
                debug!("Retry attempt {} in {:?}", attempt, delay);
                sleep(delay).await;
            }

            match self.send_request(request).await {
                Ok(text) => {
                    if attempt > 0 {
                        info!("Successfully translated after {} retries", attempt);
                    }
                    return Ok(text);
                }
                Err(e) => {
                    let retryable = e.is_retryable();
                    warn!("Translation request failed: {}", e);
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| TranslationError::ServiceError {
            message: "no translation attempt was made".to_string(),
        }))
    }

    /// Send actual HTTP request
    async fn send_request(&self, request: &TranslationRequest) -> Result<String> {
        let builder = match self.mode {
            ApiMode::Web => self.client.get(&self.endpoint).query(&[
                ("client", "gtx"),
                ("sl", request.source_or_auto()),
                ("tl", request.target_lang.as_str()),
                ("dt", "t"),
                ("q", request.text.as_str()),
            ]),
            ApiMode::Cloud => {
                let mut body = serde_json::json!({
                    "q": [request.text],
                    "target": request.target_lang,
                    "format": "text",
                });
                if let Some(source) = &request.source_lang {
                    body["source"] = serde_json::json!(source);
                }
                self.client
                    .post(&self.endpoint)
                    .query(&[("key", self.config.api_key().unwrap_or_default())])
                    .json(&body)
            }
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TranslationError::TimeoutError
            } else {
                TranslationError::HttpError(e)
            }
        })?;

        let status = response.status();

        if status.is_success() {
            let json: serde_json::Value = response.json().await.map_err(|e| {
                TranslationError::ServiceError {
                    message: format!("Invalid response: {}", e),
                }
            })?;

            return match self.mode {
                ApiMode::Web => parse_web_response(&json),
                ApiMode::Cloud => parse_cloud_response(&json),
            };
        }

        let status_code = status.as_u16();

        if status_code == 429 {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(TranslationError::RateLimitError { retry_after });
        }

        let error_text = response.text().await.unwrap_or_default();
        Err(TranslationError::ApiError {
            status: status_code,
            message: error_text,
        })
    }
}

impl ApiMode {
    fn label(&self) -> &'static str {
        match self {
            ApiMode::Web => "keyless web",
            ApiMode::Cloud => "Cloud Translation v2",
        }
    }
}

#[async_trait]
impl TranslationService for GoogleTranslator {
    async fn translate(&self, request: &TranslationRequest) -> Result<String> {
        if request.text.trim().is_empty() {
            return Ok(request.text.clone());
        }

        if request.text.chars().count() > MAX_CHARS_PER_REQUEST {
            return Err(TranslationError::ServiceError {
                message: format!("Text exceeds maximum length of {} characters", MAX_CHARS_PER_REQUEST),
            });
        }

        self.translate_with_retries(request).await
    }

    fn name(&self) -> &str {
        "Google Translate"
    }
}

/// `[[["Bonjour","Hello",...],["le monde","world",...]],null,"en",...]`
fn parse_web_response(json: &serde_json::Value) -> Result<String> {
    let segments = json
        .get(0)
        .and_then(|v| v.as_array())
        .ok_or_else(|| TranslationError::ServiceError {
            message: "Invalid response: missing sentence array".to_string(),
        })?;

    let translation: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(|t| t.as_str()))
        .collect();

    if translation.is_empty() {
        return Err(TranslationError::ServiceError {
            message: "No translation in response".to_string(),
        });
    }

    Ok(translation)
}

/// `{"data":{"translations":[{"translatedText":"Bonjour"}]}}`
fn parse_cloud_response(json: &serde_json::Value) -> Result<String> {
    json["data"]["translations"]
        .get(0)
        .and_then(|t| t["translatedText"].as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| TranslationError::ServiceError {
            message: "Invalid response: missing 'data.translations[0].translatedText'".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backoff_doubles_and_saturates() {
        assert_eq!(backoff_delay(1000, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1000, 3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(0, 40), Duration::ZERO);
        assert_eq!(backoff_delay(1000, 64), Duration::from_millis(u64::MAX));
        assert_eq!(backoff_delay(1000, u32::MAX), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_translator_creation_picks_mode() {
        let translator = GoogleTranslator::new(TranslatorConfig::default()).unwrap();
        assert_eq!(translator.mode, ApiMode::Web);
        assert_eq!(translator.endpoint, DEFAULT_ENDPOINT);

        let config = TranslatorConfig {
            api_key: Some("secret".to_string()),
            ..Default::default()
        };
        let translator = GoogleTranslator::new(config).unwrap();
        assert_eq!(translator.mode, ApiMode::Cloud);
        assert_eq!(translator.endpoint, V2_ENDPOINT);
        assert!(!format!("{:?}", translator).contains("secret"));
    }

    #[test]
    fn test_parse_web_response_joins_sentences() {
        let body = json!([[["Bonjour ", "Hello ", null, null, 10], ["le monde", "world", null, null, 10]], null, "en"]);
        assert_eq!(parse_web_response(&body).unwrap(), "Bonjour le monde");
    }

    #[test]
    fn test_parse_web_response_rejects_garbage() {
        assert!(parse_web_response(&json!({"error": "nope"})).is_err());
        assert!(parse_web_response(&json!([[]])).is_err());
    }

    #[test]
    fn test_parse_cloud_response() {
        let body = json!({"data": {"translations": [{"translatedText": "Hallo __PH0__"}]}});
        assert_eq!(parse_cloud_response(&body).unwrap(), "Hallo __PH0__");
        assert!(parse_cloud_response(&json!({"data": {}})).is_err());
    }

    #[tokio::test]
    async fn test_blank_text_short_circuits() {
        let translator = GoogleTranslator::new(TranslatorConfig::default()).unwrap();
        let request = TranslationRequest::new("   ".to_string(), "fr".to_string());
        assert_eq!(translator.translate(&request).await.unwrap(), "   ");
    }
}
