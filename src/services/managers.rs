//! Read-only lookup tables over checkpoint data: speakers and languages.

use crate::core::io::Storage;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;

/// Query set shared by the speaker and language tables. Ids are table positions.
pub trait NameTable {
    fn names(&self) -> Vec<&str>;

    fn count(&self) -> usize {
        self.names().len()
    }

    fn name_to_id(&self) -> HashMap<&str, usize> {
        let mut map = HashMap::new();
        for (id, name) in self.names().into_iter().enumerate() {
            map.entry(name).or_insert(id);
        }
        map
    }
}

/// Conditioning latents stored per speaker in the checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SpeakerEmbedding {
    #[serde(default)]
    pub gpt_cond_latent: serde_json::Value,
    #[serde(default)]
    pub speaker_embedding: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct SpeakerManager {
    speakers: Vec<(String, SpeakerEmbedding)>,
}

impl SpeakerManager {
    pub fn new(speakers: Vec<(String, SpeakerEmbedding)>) -> Self {
        Self { speakers }
    }

    /// Loads a JSON export of the speaker checkpoint: `{ "<name>": { ...latents } }`.
    pub async fn load(storage: &dyn Storage, path: &str) -> Result<Self> {
        let bytes = storage.read(path).await?;
        Self::from_json(&bytes).with_context(|| format!("Failed to parse speakers file {}", path))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let table: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(bytes)?;
        let mut speakers = Vec::with_capacity(table.len());
        for (name, value) in table {
            let embedding: SpeakerEmbedding = serde_json::from_value(value)
                .with_context(|| format!("Invalid entry for speaker '{}'", name))?;
            speakers.push((name, embedding));
        }
        Ok(Self { speakers })
    }

    pub fn get(&self, name: &str) -> Option<&SpeakerEmbedding> {
        self.speakers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, embedding)| embedding)
    }
}

impl NameTable for SpeakerManager {
    fn names(&self) -> Vec<&str> {
        self.speakers.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn count(&self) -> usize {
        self.speakers.len()
    }
}

/// Anything that can hand over a list of language codes.
pub trait LanguageSource {
    fn languages(&self) -> &[String];
}

impl LanguageSource for Vec<String> {
    fn languages(&self) -> &[String] {
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct LanguageManager {
    languages: Vec<String>,
}

impl LanguageManager {
    pub fn new(source: &impl LanguageSource) -> Self {
        Self {
            languages: source.languages().to_vec(),
        }
    }
}

impl NameTable for LanguageManager {
    fn names(&self) -> Vec<&str> {
        self.languages.iter().map(String::as_str).collect()
    }
}
