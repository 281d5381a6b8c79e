use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One row of a pipe-delimited metadata file: `audio|text|speaker`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusRecord {
    pub audio_file: String,
    pub text: String,
    pub speaker: Option<String>,
}

/// Parses a metadata line. Blank lines and lines without a text column yield `None`.
pub fn parse_line(line: &str) -> Option<CorpusRecord> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }

    let mut parts = line.split('|');
    let audio_file = parts.next()?.trim().to_string();
    let text = parts.next()?.to_string();
    let speaker = parts
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Some(CorpusRecord {
        audio_file,
        text,
        speaker,
    })
}

// Header written by the dataset converter.
fn is_header(record: &CorpusRecord) -> bool {
    record.audio_file == "audio_file" && record.text == "text"
}

pub fn read_corpus(path: &Path) -> Result<Vec<CorpusRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open corpus {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    let mut skipped = 0usize;
    let mut seen_content = false;
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read corpus {}", path.display()))?;
        let line = if index == 0 {
            line.trim_start_matches('\u{feff}')
        } else {
            line.as_str()
        };
        let first = !seen_content;
        seen_content |= !line.trim().is_empty();
        match parse_line(line) {
            Some(record) if first && is_header(&record) => skipped += 1,
            Some(record) => records.push(record),
            None => skipped += 1,
        }
    }

    log::debug!(
        "Read {} records from {} ({} lines skipped)",
        records.len(),
        path.display(),
        skipped
    );
    Ok(records)
}
