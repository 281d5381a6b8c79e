use crate::core::io::Storage;
use crate::services::managers::LanguageSource;
use crate::services::vocab::{Vocabulary, START_TOKEN, STOP_TOKEN};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    pub language_added: bool,
    pub number_text_tokens: usize,
    pub start_token: Option<u32>,
    pub stop_token: Option<u32>,
}

/// Registers `language` and the vocabulary size in an XTTS `config.json` document.
///
/// `languages` is created when absent. `gpt_start_text_token` / `gpt_stop_text_token`
/// are only rewritten when the document already carries them.
pub fn patch_model_config(doc: &mut Value, language: &str, vocabulary: &Vocabulary) -> Result<PatchReport> {
    let root = doc
        .as_object_mut()
        .ok_or_else(|| anyhow!("config root is not a JSON object"))?;

    let languages = root
        .entry("languages")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| anyhow!("'languages' is not a list"))?;
    let language_added = !languages.iter().any(|l| l.as_str() == Some(language));
    if language_added {
        languages.push(Value::String(language.to_string()));
    }

    let model_args = root
        .get_mut("model_args")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| anyhow!("'model_args' object is missing"))?;

    let number_text_tokens = vocabulary.len();
    model_args.insert(
        "gpt_number_text_tokens".to_string(),
        Value::from(number_text_tokens),
    );

    let mut set_if_present = |key: &str, token: &str| -> Option<u32> {
        let id = vocabulary.get(token)?;
        let slot = model_args.get_mut(key)?;
        *slot = Value::from(id);
        Some(id)
    };
    let start_token = set_if_present("gpt_start_text_token", START_TOKEN);
    let stop_token = set_if_present("gpt_stop_text_token", STOP_TOKEN);

    Ok(PatchReport {
        language_added,
        number_text_tokens,
        start_token,
        stop_token,
    })
}

pub async fn update_model_config(
    storage: &dyn Storage,
    path: &str,
    language: &str,
    vocabulary: &Vocabulary,
) -> Result<PatchReport> {
    let bytes = storage.read(path).await?;
    let mut doc: Value =
        serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse {}", path))?;

    let report = patch_model_config(&mut doc, language, vocabulary)?;

    let content = serde_json::to_string_pretty(&doc)?;
    storage.write(path, content.as_bytes()).await?;
    Ok(report)
}

/// The parts of an XTTS `config.json` this crate reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct XttsModelConfig {
    #[serde(default)]
    pub languages: Vec<String>,
}

impl XttsModelConfig {
    pub async fn load(storage: &dyn Storage, path: &str) -> Result<Self> {
        let bytes = storage.read(path).await?;
        serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse {}", path))
    }
}

impl LanguageSource for XttsModelConfig {
    fn languages(&self) -> &[String] {
        &self.languages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::NativeStorage;
    use crate::services::vocab::reserved_symbols;
    use serde_json::json;

    fn sample_vocab(extra: &[&str]) -> Vocabulary {
        let mut vocab = Vocabulary::new();
        for token in reserved_symbols("si") {
            vocab.insert(&token);
        }
        for token in extra {
            vocab.insert(token);
        }
        vocab
    }

    #[test]
    fn test_creates_language_list() -> Result<()> {
        let mut doc = json!({ "model_args": { "gpt_number_text_tokens": 6681 } });
        let vocab = sample_vocab(&["ක", "ඛ"]);

        let report = patch_model_config(&mut doc, "si", &vocab)?;

        assert!(report.language_added);
        assert_eq!(doc["languages"], json!(["si"]));
        assert_eq!(doc["model_args"]["gpt_number_text_tokens"], json!(7));
        assert!(report.start_token.is_none());
        Ok(())
    }

    #[test]
    fn test_existing_language_not_duplicated() -> Result<()> {
        let mut doc = json!({
            "languages": ["en", "si"],
            "model_args": {
                "gpt_number_text_tokens": 6681,
                "gpt_start_text_token": 261,
                "gpt_stop_text_token": 0
            }
        });
        let vocab = sample_vocab(&[]);

        let report = patch_model_config(&mut doc, "si", &vocab)?;

        assert!(!report.language_added);
        assert_eq!(doc["languages"], json!(["en", "si"]));
        assert_eq!(doc["model_args"]["gpt_start_text_token"], json!(2));
        assert_eq!(doc["model_args"]["gpt_stop_text_token"], json!(3));
        assert_eq!(report.stop_token, Some(3));
        Ok(())
    }

    #[test]
    fn test_missing_model_args_is_an_error() {
        let mut doc = json!({ "languages": [] });
        assert!(patch_model_config(&mut doc, "si", &sample_vocab(&[])).is_err());
    }

    #[test]
    fn test_languages_not_a_list_is_an_error() {
        let mut doc = json!({ "languages": "en", "model_args": {} });
        assert!(patch_model_config(&mut doc, "si", &sample_vocab(&[])).is_err());
    }

    #[tokio::test]
    async fn test_update_rewrites_file_preserving_keys() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"output_path": "out", "model_args": {"gpt_number_text_tokens": 6681, "kv_cache": true}, "languages": ["en"]}"#,
        )?;
        let path_str = path.to_str().unwrap();

        let storage = NativeStorage::new();
        let vocab = sample_vocab(&["ක"]);
        let report = update_model_config(&storage, path_str, "si", &vocab).await?;
        assert_eq!(report.number_text_tokens, 6);

        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(doc["languages"], json!(["en", "si"]));
        assert_eq!(doc["model_args"]["kv_cache"], json!(true));
        assert_eq!(doc["output_path"], json!("out"));

        let typed = XttsModelConfig::load(&storage, path_str).await?;
        assert_eq!(typed.languages(), ["en".to_string(), "si".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_malformed_file_fails() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{ not json")?;

        let storage = NativeStorage::new();
        let result = update_model_config(&storage, path.to_str().unwrap(), "si", &sample_vocab(&[])).await;
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path)?, "{ not json");
        Ok(())
    }
}
