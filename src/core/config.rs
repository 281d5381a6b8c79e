use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "langprep.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default = "default_dataset")]
    pub dataset_folder: String,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub unattended: bool,

    #[serde(default)]
    pub vocab: VocabConfig,

    #[serde(default)]
    pub download: DownloadConfig,

    #[serde(default)]
    pub dataset: DatasetConfig,

    #[serde(default)]
    pub training: TrainingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_folder: default_output(),
            dataset_folder: default_dataset(),
            language: default_language(),
            unattended: false,
            vocab: VocabConfig::default(),
            download: DownloadConfig::default(),
            dataset: DatasetConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VocabConfig {
    /// Folder under `output_folder` receiving `vocab.json`; its `config.json` gets patched.
    #[serde(default = "default_model_dir")]
    pub model_dir: String,
    #[serde(default = "default_vocab_size")]
    pub vocab_size: usize,
    #[serde(default = "default_min_pair_frequency")]
    pub min_pair_frequency: usize,
    #[serde(default)]
    pub script_range: ScriptRange,
}

impl Default for VocabConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            vocab_size: default_vocab_size(),
            min_pair_frequency: default_min_pair_frequency(),
            script_range: ScriptRange::default(),
        }
    }
}

/// Inclusive code-point interval of the target script.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ScriptRange {
    pub start: u32,
    pub end: u32,
}

impl Default for ScriptRange {
    // Sinhala block
    fn default() -> Self {
        Self {
            start: 0x0D80,
            end: 0x0DFF,
        }
    }
}

impl ScriptRange {
    pub fn new(start: char, end: char) -> Self {
        Self {
            start: start as u32,
            end: end as u32,
        }
    }

    pub fn contains(&self, c: char) -> bool {
        (self.start..=self.end).contains(&(c as u32))
    }

    pub fn filter(&self, text: &str) -> String {
        text.chars().filter(|c| self.contains(*c)).collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DownloadConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Relative to `output_folder`.
    #[serde(default = "default_original_model_dir")]
    pub target_dir: String,
    #[serde(default = "default_model_files")]
    pub files: Vec<String>,
    /// Total attempts per file.
    #[serde(default = "default_retry_count")]
    pub retry_count: usize,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            target_dir: default_original_model_dir(),
            files: default_model_files(),
            retry_count: default_retry_count(),
            retry_delay_seconds: default_retry_delay(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatasetConfig {
    #[serde(default = "default_dataset_source")]
    pub source_folder: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            source_folder: default_dataset_source(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TrainingConfig {
    #[serde(default = "default_python")]
    pub python: String,
    #[serde(default = "default_requirements")]
    pub requirements_file: String,
    #[serde(default = "default_outputs")]
    pub outputs_folder: String,
    #[serde(default)]
    pub dvae: DvaeParams,
    #[serde(default)]
    pub gpt: GptParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            requirements_file: default_requirements(),
            outputs_folder: default_outputs(),
            dvae: DvaeParams::default(),
            gpt: GptParams::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DvaeParams {
    pub script: String,
    pub lr: f64,
    pub num_epochs: u32,
    pub batch_size: u32,
}

impl Default for DvaeParams {
    fn default() -> Self {
        Self {
            script: "train_dvae_xtts.py".to_string(),
            lr: 5e-6,
            num_epochs: 5,
            batch_size: 512,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GptParams {
    pub script: String,
    pub num_epochs: u32,
    pub batch_size: u32,
    pub grad_acumm: u32,
    pub max_audio_length: u64,
    pub max_text_length: u32,
    pub weight_decay: f64,
    pub lr: f64,
    pub save_step: u32,
}

impl Default for GptParams {
    fn default() -> Self {
        Self {
            script: "train_gpt_xtts.py".to_string(),
            num_epochs: 10,
            batch_size: 1,
            grad_acumm: 1,
            max_audio_length: 255995,
            max_text_length: 200,
            weight_decay: 1e-2,
            lr: 5e-6,
            save_step: 5000,
        }
    }
}

fn default_output() -> String {
    "checkpoints".to_string()
}
fn default_dataset() -> String {
    "datasets/sinhala".to_string()
}
fn default_language() -> String {
    "si".to_string()
}
fn default_model_dir() -> String {
    "XTTS-v2".to_string()
}
fn default_vocab_size() -> usize {
    2500
}
fn default_min_pair_frequency() -> usize {
    2
}
fn default_base_url() -> String {
    "https://coqui.gateway.scarf.sh/hf-coqui/XTTS-v2/main/".to_string()
}
fn default_original_model_dir() -> String {
    "XTTS_v2.0_original_model_files".to_string()
}
fn default_model_files() -> Vec<String> {
    ["vocab.json", "model.pth", "config.json", "dvae.pth", "mel_stats.pth"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_retry_count() -> usize {
    3
}
fn default_retry_delay() -> u64 {
    10
}
fn default_dataset_source() -> String {
    "/kaggle/input/sinhala-tts-dataset".to_string()
}
fn default_python() -> String {
    "python3".to_string()
}
fn default_requirements() -> String {
    "requirements_kaggle.txt".to_string()
}
fn default_outputs() -> String {
    "outputs".to_string()
}

impl Config {
    /// Loads the YAML config at `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("{} not found, using default settings", path.display());
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Writes the settings to `path` unless a file is already there.
    pub fn save_if_missing(&self, path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        self.save(path)?;
        Ok(true)
    }

    pub fn validate(&self) -> Result<()> {
        if self.language.trim().is_empty() {
            bail!("language code must not be empty");
        }
        let range = self.vocab.script_range;
        if range.start > range.end {
            bail!(
                "script_range is empty: start U+{:04X} is after end U+{:04X}",
                range.start,
                range.end
            );
        }
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        fs::create_dir_all(self.original_model_dir())?;
        fs::create_dir_all(Path::new(&self.dataset_folder).join("wavs"))?;
        fs::create_dir_all(&self.training.outputs_folder)?;
        Ok(())
    }

    /// Folder holding the pretrained checkpoint files.
    pub fn original_model_dir(&self) -> PathBuf {
        Path::new(&self.output_folder).join(&self.download.target_dir)
    }

    /// Folder receiving the generated `vocab.json`.
    pub fn vocab_dir(&self) -> PathBuf {
        Path::new(&self.output_folder).join(&self.vocab.model_dir)
    }
}
