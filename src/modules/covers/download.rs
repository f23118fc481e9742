//! Saving a generated cover locally.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::models::ImageRef;
use crate::utils;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("image request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("image request returned status {0}")]
    Status(u16),
    #[error("could not write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What the caller should do after a download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Saved(PathBuf),
    /// Fetching failed; open the reference directly instead.
    OpenExternally(ImageRef),
}

#[derive(Debug, Clone)]
pub struct DownloadHelper {
    client: reqwest::Client,
    fallback_name: String,
}

impl DownloadHelper {
    pub fn new(fallback_name: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            fallback_name: fallback_name.into(),
        }
    }

    /// `<sanitized title>.png`, or `<fallback>.png` when the title has
    /// nothing usable.
    pub fn file_name(&self, title: &str) -> String {
        let stem = utils::sanitize_file_stem(title).unwrap_or_else(|| self.fallback_name.clone());
        format!("{}.png", stem)
    }

    pub async fn fetch(&self, image: &ImageRef) -> Result<Vec<u8>, DownloadError> {
        let response = self.client.get(image.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.as_u16()));
        }
        let bytes = response.bytes().await?;
        tracing::debug!(bytes = bytes.len(), "image fetched");
        Ok(bytes.to_vec())
    }

    /// Fetch `image` and write it into `directory`. Any failure degrades to
    /// [`DownloadOutcome::OpenExternally`].
    pub async fn download(&self, image: &ImageRef, title: &str, directory: &Path) -> DownloadOutcome {
        match self.save(image, title, directory).await {
            Ok(path) => {
                tracing::info!(path = %path.display(), "cover saved");
                DownloadOutcome::Saved(path)
            }
            Err(err) => {
                tracing::warn!(error = %err, image = %image, "download failed, falling back to the image link");
                DownloadOutcome::OpenExternally(image.clone())
            }
        }
    }

    async fn save(&self, image: &ImageRef, title: &str, directory: &Path) -> Result<PathBuf, DownloadError> {
        let bytes = self.fetch(image).await?;
        let path = directory.join(self.file_name(title));

        tokio::fs::create_dir_all(directory)
            .await
            .map_err(|source| DownloadError::Write {
                path: directory.to_path_buf(),
                source,
            })?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| DownloadError::Write {
                path: path.clone(),
                source,
            })?;

        Ok(path)
    }
}
