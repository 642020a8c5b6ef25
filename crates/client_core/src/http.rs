use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use shared::{
    error::ErrorBody,
    protocol::{
        healthz_route, newsletter_route, tts_route, NewsletterRequest, NewsletterResponse,
        SpeechRequest,
    },
};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{error::SpeechError, ports::SpeechService};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("server returned {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("response is not WAV audio ({0})")]
    InvalidAudio(String),
}

impl From<ClientError> for SpeechError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::RateLimited(message) => SpeechError::RateLimited(message),
            ClientError::Rejected { status, message } => SpeechError::Rejected { status, message },
            ClientError::InvalidAudio(detail) => SpeechError::InvalidAudio(detail),
            other => SpeechError::Transport(other.to_string()),
        }
    }
}

/// HTTP client for the CookFlow request handlers.
#[derive(Debug, Clone)]
pub struct CookflowClient {
    http: Client,
    base_url: Url,
}

impl CookflowClient {
    pub fn new(server_url: &str) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(server_url.trim())?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, route: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(route.trim_start_matches('/'))?)
    }

    pub async fn check_health(&self) -> Result<(), ClientError> {
        let response = self.http.get(self.endpoint(healthz_route())?).send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    pub async fn synthesize_speech(&self, text: &str) -> Result<Vec<u8>, ClientError> {
        let response = self
            .http
            .post(self.endpoint(tts_route())?)
            .json(&SpeechRequest {
                text: text.to_string(),
            })
            .send()
            .await?;
        let audio = ensure_success(response).await?.bytes().await?;
        if !looks_like_wav(&audio) {
            return Err(ClientError::InvalidAudio(format!(
                "{} bytes without a RIFF/WAVE header",
                audio.len()
            )));
        }
        debug!(bytes = audio.len(), "received narration audio");
        Ok(audio.to_vec())
    }

    pub async fn subscribe_newsletter(&self, email: &str) -> Result<String, ClientError> {
        let response = self
            .http
            .post(self.endpoint(newsletter_route())?)
            .json(&NewsletterRequest {
                email: email.to_string(),
            })
            .send()
            .await?;
        let body: NewsletterResponse = ensure_success(response).await?.json().await?;
        Ok(body.message)
    }
}

#[async_trait]
impl SpeechService for CookflowClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        Ok(self.synthesize_speech(text).await?)
    }
}

async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let raw = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&raw)
        .map(|body| body.error)
        .unwrap_or_else(|_| {
            if raw.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                raw.trim().to_string()
            }
        });

    if status == StatusCode::TOO_MANY_REQUESTS {
        Err(ClientError::RateLimited(message))
    } else {
        Err(ClientError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

pub fn looks_like_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
