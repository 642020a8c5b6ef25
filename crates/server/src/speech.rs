use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::config::Settings;

const RESPONSE_FORMAT: &str = "wav";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("speech provider is not configured")]
    NotConfigured,
    #[error("speech provider rate limited the request: {0}")]
    RateLimited(String),
    #[error("speech provider returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("speech provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Turns text into WAV audio.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError>;
}

pub struct MissingSpeechProvider;

#[async_trait]
impl SpeechProvider for MissingSpeechProvider {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, ProviderError> {
        Err(ProviderError::NotConfigured)
    }
}

#[derive(Serialize)]
struct UpstreamSpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

/// Client for an OpenAI-compatible `POST {base}/audio/speech` endpoint.
pub struct OpenAiSpeechProvider {
    http: Client,
    endpoint: Url,
    api_key: String,
    model: String,
    voice: String,
}

impl OpenAiSpeechProvider {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        voice: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let endpoint = Url::parse(&format!("{}/audio/speech", base_url.trim_end_matches('/')))?;
        Ok(Self {
            http: Client::new(),
            endpoint,
            api_key: api_key.into(),
            model: model.into(),
            voice: voice.into(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl SpeechProvider for OpenAiSpeechProvider {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&UpstreamSpeechRequest {
                model: &self.model,
                voice: &self.voice,
                input: text,
                response_format: RESPONSE_FORMAT,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.bytes().await?.to_vec());
        }

        let raw = response.text().await.unwrap_or_default();
        let message = upstream_error_message(&raw);
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited(message));
        }
        Err(ProviderError::Upstream {
            status: status.as_u16(),
            message,
        })
    }
}

/// Reads `{"error":{"message":..}}`, `{"error":".."}` or falls back to the raw body.
pub(crate) fn upstream_error_message(raw: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(raw).ok();
    let from_json = parsed.as_ref().and_then(|value| {
        let error = value.get("error")?;
        error
            .get("message")
            .and_then(|message| message.as_str())
            .or_else(|| error.as_str())
            .map(str::to_string)
    });

    from_json.unwrap_or_else(|| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            "no error details".to_string()
        } else {
            trimmed.to_string()
        }
    })
}

pub fn build_speech_provider(
    settings: &Settings,
) -> anyhow::Result<Arc<dyn SpeechProvider>> {
    match settings.speech_api_key.as_deref() {
        Some(api_key) => {
            let provider = OpenAiSpeechProvider::new(
                &settings.speech_api_base_url,
                api_key,
                &settings.speech_model,
                &settings.speech_voice,
            )?;
            info!(
                endpoint = %provider.endpoint(),
                model = %settings.speech_model,
                voice = %settings.speech_voice,
                "speech provider configured"
            );
            Ok(Arc::new(provider))
        }
        None => {
            warn!("no speech API key configured; /api/tts will fail");
            Ok(Arc::new(MissingSpeechProvider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_base_path() {
        let provider =
            OpenAiSpeechProvider::new("https://api.groq.com/openai/v1/", "k", "m", "v")
                .expect("provider");
        assert_eq!(
            provider.endpoint().as_str(),
            "https://api.groq.com/openai/v1/audio/speech"
        );
    }

    #[test]
    fn extracts_nested_error_message() {
        let raw = r#"{"error":{"message":"Rate limit reached for model playai-tts","code":"rate_limit_exceeded"}}"#;
        assert_eq!(
            upstream_error_message(raw),
            "Rate limit reached for model playai-tts"
        );
    }

    #[test]
    fn extracts_flat_error_and_raw_text() {
        assert_eq!(upstream_error_message(r#"{"error":"bad voice"}"#), "bad voice");
        assert_eq!(upstream_error_message("gateway timeout"), "gateway timeout");
        assert_eq!(upstream_error_message(""), "no error details");
    }

    #[tokio::test]
    async fn missing_provider_reports_not_configured() {
        let err = MissingSpeechProvider
            .synthesize("Boil water")
            .await
            .expect_err("should fail");
        assert!(matches!(err, ProviderError::NotConfigured));
    }
}
