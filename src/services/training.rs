use crate::core::config::Config;
use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use std::fmt;
use std::path::Path;
use std::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingStage {
    Dvae,
    Gpt,
}

impl fmt::Display for TrainingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingStage::Dvae => write!(f, "DVAE"),
            TrainingStage::Gpt => write!(f, "GPT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl fmt::Display for StageCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.program, self.args.join(" "))
    }
}

pub fn setup_directories(config: &Config) -> Result<()> {
    config.ensure_directories()?;
    for dir in [
        config.output_folder.clone(),
        config.original_model_dir().to_string_lossy().to_string(),
        Path::new(&config.dataset_folder).join("wavs").to_string_lossy().to_string(),
        config.training.outputs_folder.clone(),
    ] {
        info!("Created directory: {}", dir);
    }
    Ok(())
}

/// Installs the python requirements the external trainers need. Skipped when the file is absent.
pub fn install_requirements(config: &Config) -> Result<bool> {
    let requirements = Path::new(&config.training.requirements_file);
    if !requirements.exists() {
        warn!("{} not found, skipping requirements installation", requirements.display());
        return Ok(false);
    }

    info!("Installing requirements from {}...", requirements.display());
    let status = Command::new(&config.training.python)
        .arg("-m")
        .arg("pip")
        .arg("install")
        .arg("-r")
        .arg(requirements)
        .status()
        .context(format!("Failed to run pip with {}", config.training.python))?;

    if status.success() {
        Ok(true)
    } else {
        Err(anyhow!("Requirements installation failed: {}", status))
    }
}

pub fn build_command(stage: TrainingStage, config: &Config) -> StageCommand {
    let dataset = Path::new(&config.dataset_folder);
    let train_csv = dataset.join("metadata_train.csv").to_string_lossy().to_string();
    let eval_csv = dataset.join("metadata_eval.csv").to_string_lossy().to_string();

    let args: Vec<String> = match stage {
        TrainingStage::Dvae => {
            let p = &config.training.dvae;
            vec![
                p.script.clone(),
                "--output_path".into(),
                config.output_folder.clone(),
                "--train_csv_path".into(),
                train_csv,
                "--eval_csv_path".into(),
                eval_csv,
                "--language".into(),
                config.language.clone(),
                "--lr".into(),
                format!("{:e}", p.lr),
                "--num_epochs".into(),
                p.num_epochs.to_string(),
                "--batch_size".into(),
                p.batch_size.to_string(),
            ]
        }
        TrainingStage::Gpt => {
            let p = &config.training.gpt;
            vec![
                p.script.clone(),
                "--output_path".into(),
                config.output_folder.clone(),
                "--metadatas".into(),
                format!("{},{},{}", train_csv, eval_csv, config.language),
                "--num_epochs".into(),
                p.num_epochs.to_string(),
                "--batch_size".into(),
                p.batch_size.to_string(),
                "--grad_acumm".into(),
                p.grad_acumm.to_string(),
                "--max_audio_length".into(),
                p.max_audio_length.to_string(),
                "--max_text_length".into(),
                p.max_text_length.to_string(),
                "--weight_decay".into(),
                format!("{:e}", p.weight_decay),
                "--lr".into(),
                format!("{:e}", p.lr),
                "--save_step".into(),
                p.save_step.to_string(),
            ]
        }
    };

    StageCommand {
        program: config.training.python.clone(),
        args,
    }
}

pub fn run_stage(stage: TrainingStage, config: &Config) -> Result<()> {
    let command = build_command(stage, config);
    info!("Starting {} training: {}", stage, command);

    let status = Command::new(&command.program)
        .args(&command.args)
        .status()
        .context(format!("Failed to launch {} training", stage))?;

    if status.success() {
        info!("{} training completed", stage);
        Ok(())
    } else {
        Err(anyhow!("{} training failed: {}", stage, status))
    }
}

/// Runs the given stages in order, asking before each subsequent stage unless unattended.
pub async fn run_pipeline(config: &Config, stages: &[TrainingStage]) -> Result<()> {
    for (i, stage) in stages.iter().copied().enumerate() {
        if i > 0 && !config.unattended {
            let ans = inquire::Confirm::new(&format!("Continue with {} training?", stage))
                .with_default(true)
                .prompt();
            match ans {
                Ok(true) => {}
                Ok(false) => {
                    println!("Stopping as requested.");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }

        let stage_config = config.clone();
        tokio::task::spawn_blocking(move || run_stage(stage, &stage_config)).await??;
    }
    Ok(())
}
