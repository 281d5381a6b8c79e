//! Vocabulary construction for a new language.
//!
//! Tokens are admitted in three passes over the corpus: single characters of
//! the target script, then frequent character bigrams, then whole words as a
//! fallback. Reserved symbols always take the lowest ids.

use crate::core::config::{Config, ScriptRange, VocabConfig};
use crate::core::io::Storage;
use crate::services::corpus::read_corpus;
use crate::services::model_config::update_model_config;
use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use std::path::Path;

pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";
pub const START_TOKEN: &str = "[START]";
pub const STOP_TOKEN: &str = "[STOP]";

/// Share of the target size available to single characters, in tenths.
const CHARACTER_SHARE_TENTHS: usize = 7;

/// Reserved symbols in id order: padding, unknown, start, stop, language marker.
pub fn reserved_symbols(language: &str) -> Vec<String> {
    vec![
        PAD_TOKEN.to_string(),
        UNK_TOKEN.to_string(),
        START_TOKEN.to_string(),
        STOP_TOKEN.to_string(),
        format!("[{}]", language),
    ]
}

/// Occurrence counts that remember the order in which tokens were first seen.
#[derive(Debug, Default, Clone)]
pub struct FrequencyTable {
    counts: HashMap<String, usize>,
    order: Vec<String>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, token: &str) {
        match self.counts.get_mut(token) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(token.to_string(), 1);
                self.order.push(token.to_string());
            }
        }
    }

    pub fn count(&self, token: &str) -> usize {
        self.counts.get(token).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entries by descending count. Ties keep first-seen order.
    pub fn ranked(&self) -> Vec<(&str, usize)> {
        let mut entries: Vec<(&str, usize)> = self
            .order
            .iter()
            .map(|token| (token.as_str(), self.counts[token]))
            .collect();
        // `sort_by` is stable; do not switch to `sort_unstable_by`.
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
    }
}

/// Token to id mapping. Ids are contiguous from 0 in insertion order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    tokens: Vec<String>,
    ids: HashMap<String, u32>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next id to `token`. Returns `false` if it was already present.
    pub fn insert(&mut self, token: &str) -> bool {
        if self.ids.contains_key(token) {
            return false;
        }
        self.ids.insert(token.to_string(), self.tokens.len() as u32);
        self.tokens.push(token.to_string());
        true
    }

    pub fn get(&self, token: &str) -> Option<u32> {
        self.ids.get(token).copied()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.ids.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.tokens
            .iter()
            .enumerate()
            .map(|(id, token)| (token.as_str(), id as u32))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Serialize for Vocabulary {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.tokens.len()))?;
        for (token, id) in self.iter() {
            map.serialize_entry(token, &id)?;
        }
        map.end()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VocabStats {
    pub reserved: usize,
    pub distinct_characters: usize,
    pub characters_admitted: usize,
    pub distinct_bigrams: usize,
    pub qualifying_bigrams: usize,
    pub bigrams_admitted: usize,
    pub distinct_words: usize,
    pub words_admitted: usize,
}

#[derive(Debug, Clone)]
pub struct VocabBuild {
    pub vocabulary: Vocabulary,
    pub stats: VocabStats,
}

pub struct VocabularyBuilder {
    vocab_size: usize,
    min_pair_frequency: usize,
    script_range: ScriptRange,
    language: String,
}

impl VocabularyBuilder {
    pub fn new(config: &VocabConfig, language: &str) -> Result<Self> {
        let reserved = reserved_symbols(language).len();
        if config.vocab_size < reserved {
            bail!(
                "vocab_size {} is smaller than the {} reserved symbols",
                config.vocab_size,
                reserved
            );
        }
        if config.script_range.start > config.script_range.end {
            bail!("script_range is empty");
        }
        Ok(Self {
            vocab_size: config.vocab_size,
            min_pair_frequency: config.min_pair_frequency,
            script_range: config.script_range,
            language: language.to_string(),
        })
    }

    fn character_budget(&self) -> usize {
        // Split before multiplying so huge targets cannot overflow.
        let whole = (self.vocab_size / 10) * CHARACTER_SHARE_TENTHS;
        let rest = ((self.vocab_size % 10) * CHARACTER_SHARE_TENTHS).div_ceil(10);
        (whole + rest).min(self.vocab_size)
    }

    pub fn build<S: AsRef<str>>(&self, texts: &[S]) -> VocabBuild {
        let mut char_freq = FrequencyTable::new();
        let mut bigram_freq = FrequencyTable::new();
        let mut word_freq = FrequencyTable::new();

        for text in texts {
            let text = text.as_ref();
            let filtered: Vec<char> = self.script_range.filter(text).chars().collect();

            for c in &filtered {
                char_freq.add(c.encode_utf8(&mut [0u8; 4]));
            }
            // Bigrams stay inside a single record.
            for pair in filtered.windows(2) {
                let bigram: String = pair.iter().collect();
                bigram_freq.add(&bigram);
            }
            for word in text.split_whitespace() {
                word_freq.add(word);
            }
        }

        let mut vocabulary = Vocabulary::new();
        let mut stats = VocabStats {
            distinct_characters: char_freq.len(),
            distinct_bigrams: bigram_freq.len(),
            distinct_words: word_freq.len(),
            ..Default::default()
        };

        for symbol in reserved_symbols(&self.language) {
            if vocabulary.insert(&symbol) {
                stats.reserved += 1;
            }
        }

        let character_budget = self.character_budget();
        for (c, _) in char_freq.ranked() {
            if vocabulary.len() >= character_budget {
                break;
            }
            if vocabulary.insert(c) {
                stats.characters_admitted += 1;
            }
        }

        for (bigram, count) in bigram_freq.ranked() {
            if count < self.min_pair_frequency {
                continue;
            }
            stats.qualifying_bigrams += 1;
            if vocabulary.len() < self.vocab_size && vocabulary.insert(bigram) {
                stats.bigrams_admitted += 1;
            }
        }

        for (word, _) in word_freq.ranked() {
            if vocabulary.len() >= self.vocab_size {
                break;
            }
            if vocabulary.insert(word) {
                stats.words_admitted += 1;
            }
        }

        VocabBuild { vocabulary, stats }
    }
}

/// Writes `vocab.json` into `dir` and returns its path.
pub async fn write_vocab(storage: &dyn Storage, vocabulary: &Vocabulary, dir: &Path) -> Result<String> {
    let path = dir.join("vocab.json");
    let path_str = path.to_string_lossy().to_string();
    let content = vocabulary.to_json_pretty()?;
    storage
        .write(&path_str, content.as_bytes())
        .await
        .with_context(|| format!("Failed to save vocabulary to {}", path_str))?;
    Ok(path_str)
}

#[derive(Debug)]
pub struct VocabOutcome {
    pub vocab_path: String,
    pub build: VocabBuild,
    pub config_patched: bool,
}

/// Reads the corpus, builds the vocabulary, writes it and registers the language in the
/// companion `config.json`. Only the last step is allowed to fail without aborting.
pub async fn create_vocab(config: &Config, metadata_path: &Path, storage: &dyn Storage) -> Result<VocabOutcome> {
    let builder = VocabularyBuilder::new(&config.vocab, &config.language)?;

    let records = read_corpus(metadata_path)?;
    info!("Processing {} texts...", records.len());
    let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();

    let build = builder.build(&texts);
    let stats = &build.stats;
    info!(
        "Found {} unique characters, {} unique bigrams ({} with frequency >= {})",
        stats.distinct_characters,
        stats.distinct_bigrams,
        stats.qualifying_bigrams,
        config.vocab.min_pair_frequency
    );

    let vocab_dir = config.vocab_dir();
    let vocab_path = write_vocab(storage, &build.vocabulary, &vocab_dir).await?;
    println!("Vocabulary saved to: {}", vocab_path);

    let config_path = vocab_dir.join("config.json");
    let config_path_str = config_path.to_string_lossy().to_string();
    let config_patched = if storage.exists(&config_path_str).await? {
        match update_model_config(storage, &config_path_str, &config.language, &build.vocabulary).await {
            Ok(report) => {
                info!(
                    "Updated {}: language '{}' {}, gpt_number_text_tokens = {}",
                    config_path_str,
                    config.language,
                    if report.language_added { "added" } else { "already present" },
                    report.number_text_tokens
                );
                true
            }
            Err(e) => {
                warn!("Could not update {}: {:#}", config_path_str, e);
                false
            }
        }
    } else {
        warn!("{} not found, skipping config update", config_path_str);
        false
    };

    Ok(VocabOutcome {
        vocab_path,
        build,
        config_patched,
    })
}
