use std::{net::SocketAddr, sync::Arc};

use axum::{
    routing::{get, post},
    Router,
};
use shared::protocol::{healthz_route, newsletter_route, tts_route};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;
mod error;
mod mailer;
mod speech;

use app_state::AppState;
use config::load_settings;

const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings()?;
    let state = AppState {
        speech: speech::build_speech_provider(&settings)?,
        mailer: mailer::build_mailer(&settings.smtp)?,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(healthz_route(), get(healthz))
        .route(tts_route(), post(api::synthesize_speech))
        .route(newsletter_route(), post(api::subscribe_newsletter))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
