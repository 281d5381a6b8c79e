use crate::core::config::{Config, DownloadConfig};
use anyhow::{anyhow, Context, Result};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use url::Url;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub downloaded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

pub fn file_url(base_url: &str, filename: &str) -> Result<Url> {
    let mut base = Url::parse(base_url).with_context(|| format!("Invalid base URL {}", base_url))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(filename)
        .with_context(|| format!("Invalid file name {}", filename))
}

/// Fetches the pretrained checkpoint files that are not already on disk.
pub async fn download_model_files(config: &Config) -> Result<DownloadReport> {
    let target_dir = config.original_model_dir();
    tokio::fs::create_dir_all(&target_dir)
        .await
        .with_context(|| format!("Failed to create {}", target_dir.display()))?;

    let client = reqwest::Client::new();
    download_all(&client, &config.download, &target_dir).await
}

async fn download_all(client: &reqwest::Client, cfg: &DownloadConfig, target_dir: &Path) -> Result<DownloadReport> {
    let mut report = DownloadReport::default();

    for filename in &cfg.files {
        let target_path = target_dir.join(filename);
        if target_path.exists() {
            info!("File already exists: {}", filename);
            report.skipped.push(filename.clone());
            continue;
        }

        let url = file_url(&cfg.base_url, filename)?;
        // `retry_count` is the total number of attempts per file.
        let mut attempts_left = cfg.retry_count.max(1);
        loop {
            match download_file(client, &url, &target_path).await {
                Ok(()) => {
                    report.downloaded.push(filename.clone());
                    break;
                }
                Err(e) if attempts_left > 1 => {
                    attempts_left -= 1;
                    warn!("Downloading {} failed: {:#}, retrying...", filename, e);
                    tokio::time::sleep(tokio::time::Duration::from_secs(cfg.retry_delay_seconds)).await;
                }
                Err(e) => {
                    error!("Failed to download {}: {:#}", filename, e);
                    report.failed.push(filename.clone());
                    break;
                }
            }
        }
    }

    Ok(report)
}

async fn download_file(client: &reqwest::Client, url: &Url, target_path: &Path) -> Result<()> {
    info!("Downloading {}...", url);
    let response = client.get(url.clone()).send().await?;
    if !response.status().is_success() {
        return Err(anyhow!("Failed to download {}: {}", url, response.status()));
    }

    let total_size = response.content_length().unwrap_or(0);
    let pb = ProgressBar::new(total_size);
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
        .progress_chars("#>-"));

    // Partial downloads never land under the final name.
    let part_path = target_path.with_extension(match target_path.extension() {
        Some(ext) => format!("{}.part", ext.to_string_lossy()),
        None => "part".to_string(),
    });
    if let Err(e) = write_body(response, &part_path, &pb).await {
        pb.abandon();
        tokio::fs::remove_file(&part_path).await.ok();
        return Err(e);
    }
    pb.finish_and_clear();

    tokio::fs::rename(&part_path, target_path)
        .await
        .with_context(|| format!("Failed to move download into {}", target_path.display()))?;
    info!("Downloaded: {}", target_path.display());
    Ok(())
}

async fn write_body(response: reqwest::Response, part_path: &Path, pb: &ProgressBar) -> Result<()> {
    let mut file = tokio::fs::File::create(part_path)
        .await
        .with_context(|| format!("Failed to create {}", part_path.display()))?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        pb.inc(chunk.len() as u64);
    }
    file.flush().await?;
    Ok(())
}
