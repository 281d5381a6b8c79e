use crate::core::config::Config;
use crate::core::io::Storage;
use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct SourceRow {
    audio_file_path: String,
    transcript: String,
    speaker_id: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct MetadataRow {
    audio_file: String,
    text: String,
    speaker_name: String,
}

impl From<SourceRow> for MetadataRow {
    fn from(row: SourceRow) -> Self {
        Self {
            audio_file: row.audio_file_path.replace("wav/", "wavs/"),
            text: row.transcript,
            speaker_name: row.speaker_id,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DatasetReport {
    pub copied_audio_files: usize,
    pub train_rows: usize,
    pub eval_rows: usize,
    pub dict_copied: bool,
}

/// Rewrites a pipe-delimited `audio_file_path|transcript|speaker_id` file as
/// `audio_file|text|speaker_name`. Returns the number of rows written.
pub fn convert_metadata(source: &Path, target: &Path) -> Result<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(true)
        .from_path(source)
        .with_context(|| format!("Failed to open {}", source.display()))?;

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'|')
        .from_path(target)
        .with_context(|| format!("Failed to create {}", target.display()))?;

    let mut rows = 0usize;
    for result in reader.deserialize::<SourceRow>() {
        let row = result.with_context(|| format!("Failed to parse a row of {}", source.display()))?;
        writer.serialize(MetadataRow::from(row))?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}

/// Converts a Kaggle dataset layout into `<dataset_folder>/{wavs,metadata_train.csv,metadata_eval.csv}`.
pub async fn setup_dataset(config: &Config, source: &Path, storage: &dyn Storage) -> Result<DatasetReport> {
    info!("Setting up dataset from {}", source.display());
    let target = Path::new(&config.dataset_folder);

    let source_wavs = source.join("wavs");
    if !source_wavs.is_dir() {
        bail!("Audio files not found in {}", source_wavs.display());
    }
    let train_csv = source.join("train.csv");
    if !train_csv.exists() {
        bail!("Training CSV not found: {}", train_csv.display());
    }
    let val_csv = source.join("val.csv");
    if !val_csv.exists() {
        bail!("Validation CSV not found: {}", val_csv.display());
    }

    let target_wavs = target.join("wavs");
    let copied_audio_files = storage
        .copy_dir(&source_wavs.to_string_lossy(), &target_wavs.to_string_lossy())
        .await?;
    info!("Copied {} audio files to {}", copied_audio_files, target_wavs.display());

    let train_rows = convert_metadata(&train_csv, &target.join("metadata_train.csv"))?;
    info!("Converted training data: {} samples", train_rows);
    let eval_rows = convert_metadata(&val_csv, &target.join("metadata_eval.csv"))?;
    info!("Converted validation data: {} samples", eval_rows);

    let dict = source.join("dict.txt");
    let dict_str = dict.to_string_lossy().to_string();
    let dict_copied = if storage.exists(&dict_str).await? {
        let content = storage.read(&dict_str).await?;
        storage
            .write(&target.join("dict.txt").to_string_lossy(), &content)
            .await?;
        true
    } else {
        warn!("No dict.txt in {}, skipping", source.display());
        false
    };

    Ok(DatasetReport {
        copied_audio_files,
        train_rows,
        eval_rows,
        dict_copied,
    })
}
