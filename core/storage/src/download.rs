//! Download facility trait definition.

use async_trait::async_trait;
use std::collections::BTreeMap;

use drivepicker_common::DownloadError;

/// Request headers forwarded to the facility (e.g. `Authorization`).
pub type Headers = BTreeMap<String, String>;

/// Platform capability that fetches a URL into local storage.
///
/// Implementations own where the bytes land; callers only get back an
/// opaque location identifier (usually a `file://` URI).
#[async_trait]
pub trait DownloadFacility: Send + Sync {
    /// Get the facility name (e.g., "local", "memory").
    fn name(&self) -> &str;

    /// Fetch `url` with `headers` and store it under `filename`.
    ///
    /// # Postconditions
    /// - Content is fully written before the location is returned
    ///
    /// # Errors
    /// - `DownloadError::TransferFailed` for any transport, status or I/O failure
    async fn download_to_local_storage(
        &self,
        url: &str,
        filename: &str,
        headers: &Headers,
    ) -> Result<String, DownloadError>;
}
