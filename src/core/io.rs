use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait Storage: Send + Sync {
    async fn read(&self, path: &str) -> Result<Vec<u8>>;
    async fn write(&self, path: &str, content: &[u8]) -> Result<()>;
    async fn exists(&self, path: &str) -> Result<bool>;
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
    /// Recursively copies `from` into `to`, merging with existing content. Returns the number of files copied.
    async fn copy_dir(&self, from: &str, to: &str) -> Result<usize>;
}

pub struct NativeStorage;

impl NativeStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NativeStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for NativeStorage {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path))
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create directory {}", parent.display()))?;
            }
        }
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write {}", path))?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let path = Path::new(prefix);
        let mut entries = Vec::new();

        if path.exists() {
            if path.is_dir() {
                let mut dir = tokio::fs::read_dir(path).await?;
                while let Some(entry) = dir.next_entry().await? {
                    entries.push(entry.path().to_string_lossy().to_string());
                }
            } else {
                entries.push(prefix.to_string());
            }
        }

        entries.sort();
        Ok(entries)
    }

    async fn copy_dir(&self, from: &str, to: &str) -> Result<usize> {
        let mut copied = 0;
        let mut pending: Vec<(PathBuf, PathBuf)> = vec![(PathBuf::from(from), PathBuf::from(to))];

        while let Some((src, dst)) = pending.pop() {
            tokio::fs::create_dir_all(&dst)
                .await
                .with_context(|| format!("Failed to create directory {}", dst.display()))?;
            let mut dir = tokio::fs::read_dir(&src)
                .await
                .with_context(|| format!("Failed to read directory {}", src.display()))?;
            while let Some(entry) = dir.next_entry().await? {
                let target = dst.join(entry.file_name());
                if entry.file_type().await?.is_dir() {
                    pending.push((entry.path(), target));
                } else {
                    tokio::fs::copy(entry.path(), &target)
                        .await
                        .with_context(|| format!("Failed to copy {:?}", entry.path()))?;
                    copied += 1;
                }
            }
        }

        Ok(copied)
    }
}
