//! Listing source used by the picker.

use async_trait::async_trait;

use drivepicker_common::Result;
use drivepicker_storage::{DriveClient, FileRecord, Listing};

/// The three listings and the download the picker needs.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn list_root_owned(&self) -> Result<Listing>;

    async fn list_shared_with_me(&self) -> Result<Listing>;

    async fn list_children(&self, folder_id: &str) -> Result<Listing>;

    /// Download `file` and return its local location.
    async fn download_file(&self, file: &FileRecord) -> Result<String>;
}

#[async_trait]
impl FileSource for DriveClient {
    async fn list_root_owned(&self) -> Result<Listing> {
        DriveClient::list_root_owned(self).await
    }

    async fn list_shared_with_me(&self) -> Result<Listing> {
        DriveClient::list_shared_with_me(self).await
    }

    async fn list_children(&self, folder_id: &str) -> Result<Listing> {
        DriveClient::list_children(self, folder_id).await
    }

    async fn download_file(&self, file: &FileRecord) -> Result<String> {
        DriveClient::download_file(self, file).await
    }
}
