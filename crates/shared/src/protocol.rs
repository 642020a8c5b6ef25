use serde::{Deserialize, Serialize};

pub fn tts_route() -> &'static str {
    "/api/tts"
}

pub fn newsletter_route() -> &'static str {
    "/api/newsletter"
}

pub fn healthz_route() -> &'static str {
    "/healthz"
}

pub const WAV_CONTENT_TYPE: &str = "audio/wav";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsletterRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsletterResponse {
    pub message: String,
}
