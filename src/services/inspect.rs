use crate::core::config::Config;
use crate::core::io::Storage;
use crate::services::managers::{LanguageManager, NameTable, SpeakerManager};
use crate::services::model_config::XttsModelConfig;
use anyhow::Result;
use log::warn;
use std::path::{Path, PathBuf};

pub const TRAINING_RUN_PREFIX: &str = "GPT_XTTS_FT-";
pub const SPEAKERS_FILE: &str = "speakers_xtts.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingRun {
    pub name: String,
    pub checkpoints: Vec<String>,
    pub has_config: bool,
}

#[derive(Debug, Default, Clone)]
pub struct CheckpointReport {
    pub checkpoints_found: bool,
    pub training_runs: Vec<TrainingRun>,
    pub vocab_files: Vec<PathBuf>,
    pub original_model_files: Option<Vec<String>>,
    pub languages: Option<Vec<String>>,
    pub speaker_count: Option<usize>,
    /// A model folder found elsewhere when the original one is missing.
    pub relocatable_model_dir: Option<PathBuf>,
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

async fn find_vocab_files(storage: &dyn Storage, root: &str) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_string()];
    while let Some(dir) = pending.pop() {
        for entry in storage.list(&dir).await? {
            let path = Path::new(&entry);
            if path.is_dir() {
                pending.push(entry);
            } else if file_name(&entry) == "vocab.json" {
                found.push(path.to_path_buf());
            }
        }
    }
    found.sort();
    Ok(found)
}

pub async fn inspect_checkpoints(config: &Config, storage: &dyn Storage) -> Result<CheckpointReport> {
    let root = config.output_folder.as_str();
    let mut report = CheckpointReport::default();
    if !Path::new(root).is_dir() {
        return Ok(report);
    }
    report.checkpoints_found = true;

    for entry in storage.list(root).await? {
        let name = file_name(&entry);
        if !name.starts_with(TRAINING_RUN_PREFIX) || !Path::new(&entry).is_dir() {
            continue;
        }
        let files = storage.list(&entry).await?;
        let checkpoints: Vec<String> = files
            .iter()
            .map(|f| file_name(f))
            .filter(|f| f.ends_with(".pth"))
            .collect();
        let has_config = files.iter().any(|f| file_name(f) == "config.json");
        report.training_runs.push(TrainingRun {
            name,
            checkpoints,
            has_config,
        });
    }

    report.vocab_files = find_vocab_files(storage, root).await?;

    let original = config.original_model_dir();
    if original.is_dir() {
        let original_str = original.to_string_lossy().to_string();
        let files: Vec<String> = storage
            .list(&original_str)
            .await?
            .iter()
            .map(|f| file_name(f))
            .collect();

        if files.iter().any(|f| f == "config.json") {
            let path = original.join("config.json").to_string_lossy().to_string();
            match XttsModelConfig::load(storage, &path).await {
                Ok(model_config) => {
                    let languages = LanguageManager::new(&model_config);
                    report.languages = Some(languages.names().iter().map(|s| s.to_string()).collect());
                }
                Err(e) => warn!("Could not read languages from {}: {:#}", path, e),
            }
        }
        if files.iter().any(|f| f == SPEAKERS_FILE) {
            let path = original.join(SPEAKERS_FILE).to_string_lossy().to_string();
            match SpeakerManager::load(storage, &path).await {
                Ok(speakers) => report.speaker_count = Some(speakers.count()),
                Err(e) => warn!("Could not read speakers from {}: {:#}", path, e),
            }
        }

        report.original_model_files = Some(files);
    } else {
        let candidate = config.vocab_dir();
        if candidate != original && candidate.is_dir() {
            report.relocatable_model_dir = Some(candidate);
        }
    }

    Ok(report)
}

pub fn print_report(config: &Config, report: &CheckpointReport) {
    if !report.checkpoints_found {
        println!("Checkpoints directory not found: {}", config.output_folder);
        println!("You may need to create it or run the setup steps first");
        return;
    }

    println!("=== GPT Training Folders ===");
    if report.training_runs.is_empty() {
        println!("No GPT training folders found yet");
    }
    for run in &report.training_runs {
        println!("\nFolder: {}", run.name);
        if !run.checkpoints.is_empty() {
            println!("  Model checkpoints:");
            for pth in &run.checkpoints {
                println!("    - {}", pth);
            }
        }
        if run.has_config {
            println!("  config.json found");
        }
    }

    println!("\n=== Vocabulary Files ===");
    for path in &report.vocab_files {
        println!("Found: {}", path.display());
    }

    println!("\n=== XTTS Original Model Files ===");
    match &report.original_model_files {
        Some(files) => {
            println!("Original model folder exists: {}", config.original_model_dir().display());
            let shown: Vec<&str> = files.iter().take(10).map(String::as_str).collect();
            println!("  Files: {}", shown.join(", "));
            if let Some(languages) = &report.languages {
                println!("  Languages ({}): {}", languages.len(), languages.join(", "));
            }
            if let Some(count) = report.speaker_count {
                println!("  Speakers: {}", count);
            }
        }
        None => {
            println!("Original model folder not found");
            if let Some(dir) = &report.relocatable_model_dir {
                println!("Found {} instead", dir.display());
                println!(
                    "Copy its files into {} before training",
                    config.original_model_dir().display()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::NativeStorage;
    use std::fs;

    #[tokio::test]
    async fn test_missing_checkpoints_folder() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let mut config = Config::default();
        config.output_folder = temp_dir.path().join("none").to_string_lossy().to_string();

        let report = inspect_checkpoints(&config, &NativeStorage::new()).await?;
        assert!(!report.checkpoints_found);
        Ok(())
    }

    #[tokio::test]
    async fn test_inspect_checkpoints() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let root = temp_dir.path().join("checkpoints");
        let run = root.join("GPT_XTTS_FT-October-17-2026");
        fs::create_dir_all(&run)?;
        fs::write(run.join("checkpoint_5000.pth"), b"")?;
        fs::write(run.join("best_model.pth"), b"")?;
        fs::write(run.join("config.json"), b"{}")?;
        fs::write(run.join("trainer_0_log.txt"), b"")?;
        fs::create_dir_all(root.join("unrelated"))?;

        let original = root.join("XTTS_v2.0_original_model_files");
        fs::create_dir_all(&original)?;
        fs::write(original.join("vocab.json"), b"{}")?;
        fs::write(
            original.join("config.json"),
            r#"{"languages": ["en", "es", "si"], "model_args": {}}"#,
        )?;
        fs::write(
            original.join(SPEAKERS_FILE),
            r#"{"Claribel Dervla": {"gpt_cond_latent": [], "speaker_embedding": []}}"#,
        )?;
        fs::create_dir_all(root.join("XTTS-v2"))?;
        fs::write(root.join("XTTS-v2").join("vocab.json"), b"{}")?;

        let mut config = Config::default();
        config.output_folder = root.to_string_lossy().to_string();

        let report = inspect_checkpoints(&config, &NativeStorage::new()).await?;

        assert!(report.checkpoints_found);
        assert_eq!(report.training_runs.len(), 1);
        let run = &report.training_runs[0];
        assert_eq!(run.checkpoints, vec!["best_model.pth", "checkpoint_5000.pth"]);
        assert!(run.has_config);
        assert_eq!(report.vocab_files.len(), 2);
        assert_eq!(
            report.languages,
            Some(vec!["en".to_string(), "es".to_string(), "si".to_string()])
        );
        assert_eq!(report.speaker_count, Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_points_at_model_folder_when_original_missing() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let root = temp_dir.path().join("checkpoints");
        fs::create_dir_all(root.join("XTTS-v2"))?;

        let mut config = Config::default();
        config.output_folder = root.to_string_lossy().to_string();

        let report = inspect_checkpoints(&config, &NativeStorage::new()).await?;
        assert!(report.original_model_files.is_none());
        assert_eq!(report.relocatable_model_dir, Some(root.join("XTTS-v2")));

        fs::create_dir_all(config.original_model_dir())?;
        let report = inspect_checkpoints(&config, &NativeStorage::new()).await?;
        assert!(report.original_model_files.is_some());
        assert!(report.relocatable_model_dir.is_none());
        Ok(())
    }
}
