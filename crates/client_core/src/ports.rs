use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use shared::domain::{Recipe, RecipeId, RecipeRecord};

use crate::{error::SpeechError, session::NarrationTicket};

/// Turns step text into playable WAV audio.
#[async_trait]
pub trait SpeechService: Send + Sync {
    async fn synthesize(&self, text: &str) -> std::result::Result<Vec<u8>, SpeechError>;
}

pub struct MissingSpeechService;

#[async_trait]
impl SpeechService for MissingSpeechService {
    async fn synthesize(&self, _text: &str) -> std::result::Result<Vec<u8>, SpeechError> {
        Err(SpeechError::Unavailable)
    }
}

/// Plays narration audio. `play` resolves once playback has finished;
/// `stop` interrupts whatever is currently playing.
#[async_trait]
pub trait NarrationSink: Send + Sync {
    async fn play(&self, ticket: NarrationTicket, audio: Vec<u8>) -> Result<()>;
    fn stop(&self);
}

pub struct DiscardNarrationSink;

#[async_trait]
impl NarrationSink for DiscardNarrationSink {
    async fn play(&self, _ticket: NarrationTicket, _audio: Vec<u8>) -> Result<()> {
        Ok(())
    }

    fn stop(&self) {}
}

/// Source of recipes for a cooking session.
#[async_trait]
pub trait RecipeSupply: Send + Sync {
    async fn fetch_recipe(&self, id: Option<RecipeId>) -> Result<Recipe>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecipeFile {
    Many(Vec<RecipeRecord>),
    One(RecipeRecord),
}

/// Reads recipe exports from a JSON file holding one record or an array.
pub struct JsonFileRecipeSupply {
    path: PathBuf,
}

impl JsonFileRecipeSupply {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RecipeSupply for JsonFileRecipeSupply {
    async fn fetch_recipe(&self, id: Option<RecipeId>) -> Result<Recipe> {
        let raw = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read recipe file {}", self.path.display()))?;
        let records = match serde_json::from_slice::<RecipeFile>(&raw)
            .with_context(|| format!("invalid recipe file {}", self.path.display()))?
        {
            RecipeFile::Many(records) => records,
            RecipeFile::One(record) => vec![record],
        };

        let record = match id {
            Some(id) => records
                .into_iter()
                .find(|record| record.id == id)
                .ok_or_else(|| anyhow!("recipe {id} not found in {}", self.path.display()))?,
            None => records
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("no recipes in {}", self.path.display()))?,
        };
        Ok(Recipe::from_record(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "cookflow-{}-{name}.json",
            RecipeId::new_random()
        ));
        std::fs::write(&path, contents).expect("write recipe file");
        path
    }

    const PANCAKES: &str = r#"{
        "id": "0c8e3b8e-52f5-4c3c-a8a4-3a3f6f0f8c11",
        "title": "Pancakes",
        "steps": [
            {"id": "8f2c1a34-4d7e-4e0c-9a0e-0d0f6a3d2b01", "step_number": 2, "instruction": "Fry", "timer_duration": 120},
            {"id": "8f2c1a34-4d7e-4e0c-9a0e-0d0f6a3d2b02", "step_number": 1, "instruction": "Whisk"}
        ]
    }"#;

    #[tokio::test]
    async fn reads_a_single_record() {
        let path = write_temp("single", PANCAKES);
        let recipe = JsonFileRecipeSupply::new(&path)
            .fetch_recipe(None)
            .await
            .expect("recipe");
        assert_eq!(recipe.title, "Pancakes");
        assert_eq!(recipe.steps[0].instruction, "Whisk");
        assert_eq!(recipe.steps[1].timer_duration_seconds, Some(120));
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn selects_by_id_from_an_array() {
        let path = write_temp("many", &format!(
            r#"[{{"id": "2f6b1c4e-9d8a-4b7c-8e5f-1a2b3c4d5e6f", "title": "Tea", "steps": []}}, {PANCAKES}]"#
        ));
        let supply = JsonFileRecipeSupply::new(&path);
        let wanted: RecipeId =
            serde_json::from_str("\"0c8e3b8e-52f5-4c3c-a8a4-3a3f6f0f8c11\"").expect("id");

        let recipe = supply.fetch_recipe(Some(wanted)).await.expect("recipe");
        assert_eq!(recipe.title, "Pancakes");

        let err = supply
            .fetch_recipe(Some(RecipeId::new_random()))
            .await
            .expect_err("unknown id");
        assert!(err.to_string().contains("not found"));
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn missing_speech_service_is_unavailable() {
        let err = MissingSpeechService
            .synthesize("Stir")
            .await
            .expect_err("unavailable");
        assert!(matches!(err, SpeechError::Unavailable));
    }
}
