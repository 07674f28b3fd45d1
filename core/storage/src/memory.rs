//! In-memory download facility for testing.

use async_trait::async_trait;
use std::sync::RwLock;

use crate::download::{DownloadFacility, Headers};
use drivepicker_common::DownloadError;

/// One request seen by the memory downloader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDownload {
    pub url: String,
    pub filename: String,
    pub headers: Headers,
}

/// In-memory download facility.
///
/// Records every request and answers with `memory://<filename>`. A
/// scripted failure makes the next call fail.
pub struct MemoryDownloader {
    requests: RwLock<Vec<RecordedDownload>>,
    failure: RwLock<Option<String>>,
}

impl MemoryDownloader {
    /// Create a new memory downloader that always succeeds.
    pub fn new() -> Self {
        Self {
            requests: RwLock::new(Vec::new()),
            failure: RwLock::new(None),
        }
    }

    /// Make the next download fail with `message` (may be empty).
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.failure.write().unwrap() = Some(message.into());
    }

    /// Requests seen so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedDownload> {
        self.requests.read().unwrap().clone()
    }
}

impl Default for MemoryDownloader {
    fn default() -> Self {
        Self::new()
    }
}

fn location_for(filename: &str) -> String {
    format!("memory://{}", filename)
}

#[async_trait]
impl DownloadFacility for MemoryDownloader {
    fn name(&self) -> &str {
        "memory"
    }

    async fn download_to_local_storage(
        &self,
        url: &str,
        filename: &str,
        headers: &Headers,
    ) -> Result<String, DownloadError> {
        self.requests.write().unwrap().push(RecordedDownload {
            url: url.to_string(),
            filename: filename.to_string(),
            headers: headers.clone(),
        });

        if let Some(message) = self.failure.write().unwrap().take() {
            return Err(DownloadError::transfer_failed(message));
        }

        Ok(location_for(filename))
    }
}
