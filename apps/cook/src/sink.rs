use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use client_core::{NarrationSink, NarrationTicket};
use tracing::{debug, info};

/// Saves each narration clip as a WAV file instead of playing it.
pub struct WavFileSink {
    dir: PathBuf,
}

impl WavFileSink {
    pub async fn create(dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create narration dir {}", dir.display()))?;
        Ok(Self { dir })
    }
}

#[async_trait]
impl NarrationSink for WavFileSink {
    async fn play(&self, ticket: NarrationTicket, audio: Vec<u8>) -> Result<()> {
        let path = self.dir.join(format!(
            "step-{:02}-{}.wav",
            ticket.step_index + 1,
            ticket.sequence
        ));
        tokio::fs::write(&path, &audio)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), bytes = audio.len(), "narration saved");
        Ok(())
    }

    fn stop(&self) {
        debug!("narration interrupted");
    }
}
