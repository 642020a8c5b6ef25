use serde::Serialize;
use thiserror::Error;

/// Rejections returned by session operations. These indicate a caller bug:
/// a well-behaved renderer never offers the rejected action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("step {requested} is outside 0..{step_count}")]
    InvalidStep { requested: isize, step_count: usize },
    #[error("cannot {operation}: {reason}")]
    InvalidTransition {
        operation: &'static str,
        reason: String,
    },
    #[error("recipe has no steps")]
    EmptyRecipe,
}

/// Narration for one step could not be played. Never aborts the session.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("narration failed for step {step_index}: {reason}")]
pub struct NarrationFailure {
    pub step_index: usize,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech request failed: {0}")]
    Transport(String),
    #[error("speech service rate limited the request: {0}")]
    RateLimited(String),
    #[error("speech service returned {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("speech service returned unplayable audio: {0}")]
    InvalidAudio(String),
    #[error("speech service is unavailable")]
    Unavailable,
}

impl SpeechError {
    /// Message suitable for showing next to the narration toggle.
    pub fn friendly_reason(&self) -> String {
        match self {
            SpeechError::RateLimited(_) => USAGE_LIMIT_MESSAGE.to_string(),
            other => friendly_narration_reason(&other.to_string()),
        }
    }
}

const USAGE_LIMIT_MESSAGE: &str =
    "Voice narration is temporarily unavailable because the usage limit was reached. Please try again later.";

pub fn friendly_narration_reason(message: &str) -> String {
    let lower = message.to_ascii_lowercase();
    if lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("quota")
        || lower.contains("too many requests")
        || lower.contains("429")
    {
        USAGE_LIMIT_MESSAGE.to_string()
    } else if lower.contains("connection")
        || lower.contains("timed out")
        || lower.contains("dns")
        || lower.contains("unavailable")
    {
        "Voice narration could not reach the speech service; check your connection.".to_string()
    } else {
        format!("Voice narration failed: {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_phrases_become_usage_limit_message() {
        for raw in [
            "Rate limit reached for model playai-tts",
            "You exceeded your current quota",
            "server returned 429",
            "Too Many Requests",
        ] {
            assert_eq!(friendly_narration_reason(raw), USAGE_LIMIT_MESSAGE, "{raw}");
        }
        assert_eq!(
            SpeechError::RateLimited("anything".into()).friendly_reason(),
            USAGE_LIMIT_MESSAGE
        );
    }

    #[test]
    fn other_failures_keep_their_detail() {
        let reason = SpeechError::InvalidAudio("expected a WAV buffer".into()).friendly_reason();
        assert!(reason.starts_with("Voice narration failed:"));
        assert!(reason.contains("WAV"));
    }

    #[test]
    fn connectivity_failures_get_a_connection_hint() {
        let reason = SpeechError::Transport("error sending request: connection refused".into())
            .friendly_reason();
        assert!(reason.contains("check your connection"));
    }
}
