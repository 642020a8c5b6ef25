use std::{collections::HashMap, fs, path::Path};

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

const CONFIG_FILE: &str = "server.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub speech_api_base_url: String,
    pub speech_api_key: Option<String>,
    pub speech_model: String,
    pub speech_voice: String,
    pub smtp: SmtpSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpSettings {
    /// `None` keeps the server in development mode: mail is logged, not sent.
    pub host: Option<String>,
    pub port: u16,
    /// Implicit TLS (usually port 465). Otherwise STARTTLS is used.
    pub secure: bool,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub from: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8443".into(),
            speech_api_base_url: "https://api.groq.com/openai/v1".into(),
            speech_api_key: None,
            speech_model: "playai-tts".into(),
            speech_voice: "Fritz-PlayAI".into(),
            smtp: SmtpSettings::default(),
        }
    }
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: None,
            port: 587,
            secure: false,
            user: None,
            pass: None,
            from: "\"CookFlow\" <noreply@cookflow.com>".into(),
        }
    }
}

/// Defaults, then `server.toml` in the working directory, then environment.
pub fn load_settings() -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if Path::new(CONFIG_FILE).exists() {
        let raw = fs::read_to_string(CONFIG_FILE)
            .with_context(|| format!("failed to read {CONFIG_FILE}"))?;
        let file_cfg = toml::from_str::<HashMap<String, String>>(&raw)
            .with_context(|| format!("failed to parse {CONFIG_FILE}"))?;
        apply_file_overrides(&mut settings, &file_cfg);
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

pub(crate) fn apply_file_overrides(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("bind_addr") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = file_cfg.get("speech_api_base_url") {
        settings.speech_api_base_url = v.clone();
    }
    if let Some(v) = file_cfg.get("speech_api_key") {
        settings.speech_api_key = non_empty(v);
    }
    if let Some(v) = file_cfg.get("speech_model") {
        settings.speech_model = v.clone();
    }
    if let Some(v) = file_cfg.get("speech_voice") {
        settings.speech_voice = v.clone();
    }
    if let Some(v) = file_cfg.get("smtp_host") {
        settings.smtp.host = non_empty(v);
    }
    if let Some(v) = file_cfg.get("smtp_port") {
        set_port(&mut settings.smtp.port, "smtp_port", v);
    }
    if let Some(v) = file_cfg.get("smtp_secure") {
        settings.smtp.secure = parse_flag(v);
    }
    if let Some(v) = file_cfg.get("smtp_user") {
        settings.smtp.user = non_empty(v);
    }
    if let Some(v) = file_cfg.get("smtp_pass") {
        settings.smtp.pass = non_empty(v);
    }
    if let Some(v) = file_cfg.get("smtp_from") {
        settings.smtp.from = v.clone();
    }
}

/// Each setting accepts an `APP__` name and the bare name; the `APP__` one wins.
pub(crate) fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    let get = |plain: &str, prefixed: &str| lookup(prefixed).or_else(|| lookup(plain));

    if let Some(v) = get("SERVER_BIND", "APP__BIND_ADDR") {
        settings.server_bind = v;
    }
    if let Some(v) = get("SPEECH_API_BASE_URL", "APP__SPEECH_API_BASE_URL") {
        settings.speech_api_base_url = v;
    }
    if let Some(v) = get("GROQ_API_KEY", "APP__SPEECH_API_KEY") {
        settings.speech_api_key = non_empty(&v);
    }
    if let Some(v) = get("SPEECH_MODEL", "APP__SPEECH_MODEL") {
        settings.speech_model = v;
    }
    if let Some(v) = get("SPEECH_VOICE", "APP__SPEECH_VOICE") {
        settings.speech_voice = v;
    }
    if let Some(v) = get("SMTP_HOST", "APP__SMTP_HOST") {
        settings.smtp.host = non_empty(&v);
    }
    if let Some(v) = get("SMTP_PORT", "APP__SMTP_PORT") {
        set_port(&mut settings.smtp.port, "SMTP_PORT", &v);
    }
    if let Some(v) = get("SMTP_SECURE", "APP__SMTP_SECURE") {
        settings.smtp.secure = parse_flag(&v);
    }
    if let Some(v) = get("SMTP_USER", "APP__SMTP_USER") {
        settings.smtp.user = non_empty(&v);
    }
    if let Some(v) = get("SMTP_PASS", "APP__SMTP_PASS") {
        settings.smtp.pass = non_empty(&v);
    }
    if let Some(v) = get("SMTP_FROM", "APP__SMTP_FROM") {
        settings.smtp.from = v;
    }
}

fn set_port(target: &mut u16, key: &str, raw: &str) {
    match raw.trim().parse::<u16>() {
        Ok(port) => *target = port,
        Err(error) => warn!(key, value = raw, %error, "ignoring invalid port"),
    }
}

fn parse_flag(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
