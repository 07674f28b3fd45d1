//! Local filesystem download facility.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::download::{DownloadFacility, Headers};
use drivepicker_common::{DownloadError, Error, Result};

/// Downloads content into a local directory.
///
/// Bytes are streamed into a hidden part file which is renamed into place
/// once the transfer completes, so a failed download never leaves a
/// truncated file behind under the requested name.
pub struct LocalDownloader {
    root: PathBuf,
    http: Client,
}

impl LocalDownloader {
    /// Create a new local downloader writing into `root`.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Invalid path
    /// - Permission denied
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        // Create root if it doesn't exist (sync for constructor)
        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }
        let root = std::fs::canonicalize(&root)?;

        Ok(Self {
            root,
            http: http_client()?,
        })
    }

    /// Like `new`, but the root directory is only created by the first
    /// download.
    pub fn deferred(root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            root: std::path::absolute(root)?,
            http: http_client()?,
        })
    }

    /// Directory downloads are written into.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Target path for a remote file name.
    fn target_path(&self, filename: &str) -> PathBuf {
        self.root.join(sanitize_filename(filename))
    }

    async fn fetch_into(&self, url: &str, part: &Path, headers: &Headers) -> std::result::Result<(), DownloadError> {
        let mut request = self.http.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::transfer_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DownloadError::transfer_failed(format!(
                "{} - {}",
                status, body
            )));
        }

        let mut file = fs::File::create(part)
            .await
            .map_err(|e| DownloadError::transfer_failed(e.to_string()))?;

        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::transfer_failed(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::transfer_failed(e.to_string()))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| DownloadError::transfer_failed(e.to_string()))?;
        debug!("Wrote {} bytes to {}", written, part.display());

        Ok(())
    }
}

#[async_trait]
impl DownloadFacility for LocalDownloader {
    fn name(&self) -> &str {
        "local"
    }

    async fn download_to_local_storage(
        &self,
        url: &str,
        filename: &str,
        headers: &Headers,
    ) -> std::result::Result<String, DownloadError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| DownloadError::transfer_failed(e.to_string()))?;

        let target = self.target_path(filename);
        let part = self.root.join(format!(".{}.part", Uuid::new_v4()));

        if let Err(e) = self.fetch_into(url, &part, headers).await {
            let _ = fs::remove_file(&part).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&part, &target).await {
            let _ = fs::remove_file(&part).await;
            return Err(DownloadError::transfer_failed(e.to_string()));
        }

        let location = Url::from_file_path(&target)
            .map_err(|_| {
                DownloadError::transfer_failed(format!(
                    "Cannot express {} as a file URI",
                    target.display()
                ))
            })?
            .to_string();

        info!("Downloaded {} to {}", filename, location);
        Ok(location)
    }
}

fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("drivepicker/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a remote display name into a single safe path component.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        "download".to_string()
    } else {
        trimmed.to_string()
    }
}
