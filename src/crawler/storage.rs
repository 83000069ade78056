use serde_json::{from_str, to_string_pretty};
use std::{io, path::Path, path::PathBuf};
use tokio::fs;
use url::Url;
use uuid::Uuid;

use super::CrawledDocument;

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding one JSON artifact per crawled page
    pub base_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("documents"),
        }
    }
}

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid artifact {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),
}

type Result<T> = std::result::Result<T, StorageError>;

/// Storage manager for crawl artifacts
#[derive(Debug, Clone)]
pub struct Storage {
    config: StorageConfig,
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage {
    /// Create a new storage with default configuration
    pub fn new() -> Self {
        Self {
            config: StorageConfig::default(),
        }
    }

    /// Create a new storage with custom configuration
    pub fn with_config(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Directory the artifacts live in
    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    /// Writes one artifact under a freshly generated file name
    pub async fn store(&self, document: &CrawledDocument) -> Result<PathBuf> {
        fs::create_dir_all(&self.config.base_path).await?;

        let path = self
            .config
            .base_path
            .join(format!("{}.json", Uuid::new_v4()));
        fs::write(&path, to_string_pretty(document)?).await?;
        Ok(path)
    }

    /// Lists every `*.json` artifact, sorted by file name
    pub async fn list(&self) -> Result<Vec<PathBuf>> {
        if !fs::try_exists(&self.config.base_path).await? {
            return Err(StorageError::NotFound(format!(
                "Documents directory {} does not exist",
                self.config.base_path.display()
            )));
        }

        let mut paths = Vec::new();
        let mut dir_entries = fs::read_dir(&self.config.base_path).await?;
        while let Some(entry) = dir_entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }

        paths.sort();
        Ok(paths)
    }

    /// Loads and validates one artifact
    pub async fn load(&self, path: &Path) -> Result<CrawledDocument> {
        let json = fs::read_to_string(path).await?;
        let document: CrawledDocument = from_str(&json).map_err(|e| StorageError::Invalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        validate(path, &document)?;
        Ok(document)
    }

    /// Deletes an artifact once it has been indexed
    pub async fn remove(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).await?;
        Ok(())
    }
}

fn validate(path: &Path, document: &CrawledDocument) -> Result<()> {
    let invalid = |reason: String| StorageError::Invalid {
        path: path.to_path_buf(),
        reason,
    };

    let url = Url::parse(&document.url).map_err(|e| invalid(format!("bad url: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    if document.title.trim().is_empty() {
        return Err(invalid("empty title".to_string()));
    }
    Ok(())
}
