use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::IntoResponse,
    Json,
};
use lettre::Address;
use shared::protocol::{NewsletterRequest, NewsletterResponse, SpeechRequest, WAV_CONTENT_TYPE};
use tracing::{error, info, warn};

use crate::{
    app_state::AppState,
    error::AppError,
    mailer::welcome_email,
    speech::ProviderError,
};

pub const MAX_SPEECH_TEXT_CHARS: usize = 4096;

const SPEECH_FAILED: &str = "Failed to generate speech";
const SPEECH_RATE_LIMITED: &str =
    "Rate limit reached for speech synthesis, please try again later";

pub(crate) fn validate_speech_text(text: &str) -> Result<&str, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("Text is required".into()));
    }
    if text.chars().count() > MAX_SPEECH_TEXT_CHARS {
        return Err(AppError::Validation(format!(
            "Text exceeds {MAX_SPEECH_TEXT_CHARS} characters"
        )));
    }
    Ok(text)
}

pub(crate) fn validate_email(email: &str) -> Result<Address, AppError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AppError::Validation("Email is required".into()));
    }
    email
        .parse::<Address>()
        .map_err(|_| AppError::Validation("Invalid email address".into()))
}

pub(crate) async fn synthesize_speech(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SpeechRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;
    let text = validate_speech_text(&req.text)?;

    match state.speech.synthesize(text).await {
        Ok(audio) => {
            info!(chars = text.len(), bytes = audio.len(), "speech generated");
            Ok(([(header::CONTENT_TYPE, WAV_CONTENT_TYPE)], audio))
        }
        Err(ProviderError::RateLimited(message)) => {
            warn!(%message, "speech provider rate limited");
            Err(AppError::RateLimited(SPEECH_RATE_LIMITED.into()))
        }
        Err(err) => {
            error!(error = %err, "tts error");
            Err(AppError::Internal(SPEECH_FAILED.into()))
        }
    }
}

pub(crate) async fn subscribe_newsletter(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewsletterRequest>, JsonRejection>,
) -> Result<Json<NewsletterResponse>, AppError> {
    let Json(req) = payload?;
    let address = validate_email(&req.email)?;

    let message_id = state
        .mailer
        .send(welcome_email(address.as_ref()))
        .await
        .map_err(|err| {
            error!(error = %err, "failed to send welcome email");
            AppError::Internal("Failed to send welcome email".into())
        })?;

    info!(%message_id, "newsletter subscription confirmed");
    Ok(Json(NewsletterResponse {
        message: "Subscribed successfully".into(),
    }))
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
