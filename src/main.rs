use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use xtts_langprep::core::config::{Config, DEFAULT_CONFIG_PATH};
use xtts_langprep::core::io::NativeStorage;
use xtts_langprep::services::training::TrainingStage;
use xtts_langprep::services::{dataset, download, inspect, training, vocab};

#[derive(Debug, Parser)]
#[command(name = "xtts-langprep")]
#[command(about = "Prepare XTTS v2 finetuning for a new language")]
struct Cli {
    /// YAML settings file; defaults apply when it does not exist.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build vocab.json from a metadata CSV and register the language in config.json
    Vocab {
        #[arg(long)]
        metadata_path: PathBuf,
        #[arg(long)]
        output_path: Option<String>,
        #[arg(long)]
        vocab_size: Option<usize>,
        #[arg(long)]
        min_frequency: Option<usize>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        model_dir: Option<String>,
    },
    /// Download the pretrained XTTS v2 checkpoint files
    Download,
    /// Convert a Kaggle dataset into XTTS metadata files
    Dataset {
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// Create the working directory layout and install trainer requirements
    Setup,
    /// Run the external DVAE and/or GPT trainers
    Train {
        #[arg(long, value_enum, default_value_t = StageArg::All)]
        stage: StageArg,
        #[arg(long)]
        unattended: bool,
    },
    /// Report training runs, vocabularies and original model files
    Inspect,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StageArg {
    Dvae,
    Gpt,
    All,
}

impl StageArg {
    fn stages(self) -> Vec<TrainingStage> {
        match self {
            StageArg::Dvae => vec![TrainingStage::Dvae],
            StageArg::Gpt => vec![TrainingStage::Gpt],
            StageArg::All => vec![TrainingStage::Dvae, TrainingStage::Gpt],
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;
    let storage = NativeStorage::new();

    match cli.command {
        Commands::Vocab {
            metadata_path,
            output_path,
            vocab_size,
            min_frequency,
            language,
            model_dir,
        } => {
            if let Some(v) = output_path {
                config.output_folder = v;
            }
            if let Some(v) = vocab_size {
                config.vocab.vocab_size = v;
            }
            if let Some(v) = min_frequency {
                config.vocab.min_pair_frequency = v;
            }
            if let Some(v) = language {
                config.language = v;
            }
            if let Some(v) = model_dir {
                config.vocab.model_dir = v;
            }
            config.validate()?;

            let outcome = vocab::create_vocab(&config, &metadata_path, &storage).await?;
            let stats = &outcome.build.stats;
            println!("Vocabulary statistics:");
            println!("  - Special tokens: {}", stats.reserved);
            println!(
                "  - Characters: {} admitted of {} found",
                stats.characters_admitted, stats.distinct_characters
            );
            println!(
                "  - Bigrams: {} admitted of {} qualifying",
                stats.bigrams_admitted, stats.qualifying_bigrams
            );
            println!("  - Words: {}", stats.words_admitted);
            println!("  - Total: {} tokens", outcome.build.vocabulary.len());
            if !outcome.config_patched {
                println!("config.json was not updated; see warnings above.");
            }
        }
        Commands::Download => {
            println!("Downloading XTTS v2.0 model files...");
            let report = download::download_model_files(&config).await?;
            println!(
                "Downloaded {}, already present {}, failed {}",
                report.downloaded.len(),
                report.skipped.len(),
                report.failed.len()
            );
            if !report.failed.is_empty() {
                bail!("Failed to download: {}", report.failed.join(", "));
            }
        }
        Commands::Dataset { source } => {
            let source = source.unwrap_or_else(|| PathBuf::from(&config.dataset.source_folder));
            let report = dataset::setup_dataset(&config, &source, &storage).await?;
            println!(
                "Dataset ready in {}: {} training and {} evaluation samples, {} audio files",
                config.dataset_folder, report.train_rows, report.eval_rows, report.copied_audio_files
            );
        }
        Commands::Setup => {
            training::setup_directories(&config)?;
            training::install_requirements(&config)?;
            if config.save_if_missing(&cli.config)? {
                println!("Settings written to {}", cli.config.display());
            }
            println!("Setup complete.");
        }
        Commands::Train { stage, unattended } => {
            config.unattended |= unattended;
            training::run_pipeline(&config, &stage.stages()).await?;
        }
        Commands::Inspect => {
            let report = inspect::inspect_checkpoints(&config, &storage).await?;
            inspect::print_report(&config, &report);
        }
    }

    Ok(())
}
