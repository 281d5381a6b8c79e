use anyhow::Result;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use xtts_langprep::core::config::{Config, ScriptRange};
use xtts_langprep::core::io::NativeStorage;
use xtts_langprep::services::dataset::convert_metadata;
use xtts_langprep::services::vocab::create_vocab;

fn config_in(root: &Path) -> Config {
    let mut config = Config::default();
    config.output_folder = root.join("checkpoints").to_string_lossy().to_string();
    config
}

fn read_json(path: &Path) -> Result<Value> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

#[tokio::test]
async fn test_scenario_corpus_with_companion_config() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let corpus = temp_dir.path().join("metadata_train.csv");
    fs::write(
        &corpus,
        "wavs/a.wav|ab ab|spk1\nwavs/b.wav|abc|spk1\n\nwavs/c.wav|ab|spk1\n",
    )?;

    let mut config = config_in(temp_dir.path());
    config.vocab.vocab_size = 10;
    config.vocab.script_range = ScriptRange::new('a', 'c');

    let model_dir = config.vocab_dir();
    fs::create_dir_all(&model_dir)?;
    fs::write(
        model_dir.join("config.json"),
        r#"{"model_args": {"gpt_number_text_tokens": 6681, "gpt_start_text_token": 261, "gpt_stop_text_token": 0}}"#,
    )?;

    let outcome = create_vocab(&config, &corpus, &NativeStorage::new()).await?;
    assert!(outcome.config_patched);

    let vocab = read_json(&model_dir.join("vocab.json"))?;
    let keys: Vec<&str> = vocab.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["[PAD]", "[UNK]", "[START]", "[STOP]", "[si]", "a", "b", "ab", "abc"]
    );
    assert_eq!(vocab["abc"], json!(8));

    let model_config = read_json(&model_dir.join("config.json"))?;
    assert_eq!(model_config["languages"], json!(["si"]));
    assert_eq!(model_config["model_args"]["gpt_number_text_tokens"], json!(9));
    assert_eq!(model_config["model_args"]["gpt_start_text_token"], json!(2));
    assert_eq!(model_config["model_args"]["gpt_stop_text_token"], json!(3));
    Ok(())
}

#[tokio::test]
async fn test_malformed_companion_config_only_warns() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let corpus = temp_dir.path().join("metadata_train.csv");
    fs::write(&corpus, "wavs/a.wav|ආයුබෝවන්|spk1\n")?;

    let config = config_in(temp_dir.path());
    let model_dir = config.vocab_dir();
    fs::create_dir_all(&model_dir)?;
    fs::write(model_dir.join("config.json"), "{ broken")?;

    let outcome = create_vocab(&config, &corpus, &NativeStorage::new()).await?;
    assert!(!outcome.config_patched);
    assert!(model_dir.join("vocab.json").exists());
    assert_eq!(fs::read_to_string(model_dir.join("config.json"))?, "{ broken");
    Ok(())
}

#[tokio::test]
async fn test_missing_corpus_writes_nothing() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let config = config_in(temp_dir.path());

    let result = create_vocab(&config, &temp_dir.path().join("missing.csv"), &NativeStorage::new()).await;
    assert!(result.is_err());
    assert!(!config.vocab_dir().join("vocab.json").exists());
    Ok(())
}

#[tokio::test]
async fn test_empty_corpus_without_companion_config() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let corpus = temp_dir.path().join("metadata_train.csv");
    fs::write(&corpus, "\n\n")?;
    let config = config_in(temp_dir.path());

    let outcome = create_vocab(&config, &corpus, &NativeStorage::new()).await?;
    assert!(!outcome.config_patched);

    let vocab = read_json(&config.vocab_dir().join("vocab.json"))?;
    assert_eq!(
        vocab,
        json!({"[PAD]": 0, "[UNK]": 1, "[START]": 2, "[STOP]": 3, "[si]": 4})
    );
    Ok(())
}

#[tokio::test]
async fn test_converted_dataset_feeds_vocab_builder() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let source = temp_dir.path().join("train.csv");
    fs::write(
        &source,
        "audio_file_path|transcript|speaker_id\nwav/1.wav|ශ්‍රී ලංකා|1\nwav/2.wav|ලංකා|2\n",
    )?;
    let corpus = temp_dir.path().join("datasets").join("metadata_train.csv");
    convert_metadata(&source, &corpus)?;

    let config = config_in(temp_dir.path());
    let outcome = create_vocab(&config, &corpus, &NativeStorage::new()).await?;

    let vocabulary = &outcome.build.vocabulary;
    assert!(vocabulary.contains("ල"));
    assert!(vocabulary.contains("ලංකා"));
    assert!(!vocabulary.contains("text"));
    assert!(vocabulary.len() <= config.vocab.vocab_size);
    Ok(())
}

#[tokio::test]
async fn test_unwritable_output_folder_is_fatal() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let corpus = temp_dir.path().join("metadata_train.csv");
    fs::write(&corpus, "wavs/a.wav|ආයුබෝවන්|spk1\n")?;
    let blocker = temp_dir.path().join("blocker");
    fs::write(&blocker, b"not a directory")?;

    let mut config = Config::default();
    config.output_folder = blocker.to_string_lossy().to_string();

    let result = create_vocab(&config, &corpus, &NativeStorage::new()).await;
    let err = result.expect_err("writing under a regular file must fail");
    assert!(format!("{:#}", err).contains("vocab.json"));
    assert!(!config.vocab_dir().join("vocab.json").exists());
    assert_eq!(fs::read(&blocker)?, b"not a directory");
    Ok(())
}
