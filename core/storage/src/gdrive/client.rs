//! Google Drive API client.

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use drivepicker_common::{Error, ListError, PathEntry, Result};

use super::query::{ListQuery, FOLDER_MIME_TYPE};
use super::session::AuthSession;
use crate::download::{DownloadFacility, Headers};

/// Google Drive API base URL.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Characters left unescaped in a file id path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Google Drive file metadata from API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// File ID.
    pub id: String,
    /// File name.
    #[serde(default)]
    pub name: String,
    /// MIME type.
    #[serde(default)]
    pub mime_type: String,
    /// File size in bytes (absent for folders).
    #[serde(default, deserialize_with = "deserialize_size")]
    pub size: Option<u64>,
    /// Modified time.
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
    /// Browser download link, when the API provides one.
    #[serde(default)]
    pub web_content_link: Option<String>,
    /// Trashed status.
    #[serde(default)]
    pub trashed: bool,
}

impl FileRecord {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// The API sends `size` as a decimal string; accept numbers too.
fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSize {
        Number(u64),
        Text(String),
    }

    match Option::<RawSize>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawSize::Number(n)) => Ok(Some(n)),
        Some(RawSize::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Response from listing files.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    /// Absent or `null` when nothing matched.
    #[serde(default)]
    files: Option<Vec<FileRecord>>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// One page of listing results.
///
/// Consumed once: the listing is an iterator that is neither `Clone` nor
/// restartable. Run the query again for a fresh set.
#[derive(Debug)]
pub struct Listing {
    files: std::vec::IntoIter<FileRecord>,
}

impl Listing {
    pub fn new(files: Vec<FileRecord>) -> Self {
        Self {
            files: files.into_iter(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl Iterator for Listing {
    type Item = FileRecord;

    fn next(&mut self) -> Option<FileRecord> {
        self.files.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.files.size_hint()
    }
}

impl ExactSizeIterator for Listing {}

impl FromIterator<FileRecord> for Listing {
    fn from_iter<I: IntoIterator<Item = FileRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Google Drive API client.
///
/// Results are always restricted server-side to folders and PDFs; other
/// file types never appear in a listing.
pub struct DriveClient {
    http: Client,
    session: Arc<AuthSession>,
    downloader: Arc<dyn DownloadFacility>,
    base_url: String,
}

impl DriveClient {
    /// Create a new Drive client.
    ///
    /// # Errors
    /// - The HTTP client could not be built
    pub fn new(session: Arc<AuthSession>, downloader: Arc<dyn DownloadFacility>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("drivepicker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            session,
            downloader,
            base_url: DRIVE_API_BASE.to_string(),
        })
    }

    /// Point the client at another API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    /// Items owned by the caller directly under the drive root.
    pub async fn list_root_owned(&self) -> Result<Listing> {
        self.list(&ListQuery::root_owned()).await
    }

    /// Items shared with the caller, any location.
    pub async fn list_shared_with_me(&self) -> Result<Listing> {
        self.list(&ListQuery::shared_with_me()).await
    }

    /// Items whose parent is `folder_id`.
    ///
    /// The caller prepends its own "go up" entry before display.
    pub async fn list_children(&self, folder_id: &str) -> Result<Listing> {
        self.list(&ListQuery::children(folder_id)).await
    }

    /// Listing selected by a breadcrumb tail.
    pub async fn list_view(&self, tail: &PathEntry) -> Result<Listing> {
        self.list(&ListQuery::for_entry(tail)).await
    }

    /// Run a listing query.
    ///
    /// # Errors
    /// - `AuthError::NotSignedIn` when no token is available
    /// - `ListError::Http` carrying the parsed error body on non-success status
    /// - `ListError::Transport` / `ListError::Decode`
    pub async fn list(&self, query: &ListQuery) -> Result<Listing> {
        let token = self.session.get_access_token().await?;
        let url = format!("{}/files", self.base_url);
        debug!("Listing files: q={}", query.filter());

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&query.params(self.session.api_key()))
            .send()
            .await
            .map_err(|e| ListError::Transport(e.to_string()))?;

        let body = handle_response(response).await?;
        if body.next_page_token.is_some() {
            debug!("More results available, returning the first page only");
        }
        let files = body.files.unwrap_or_default();
        debug!("Listed {} files", files.len());

        Ok(Listing::new(files))
    }

    /// Download a file's content through the download facility.
    ///
    /// Returns the location identifier reported by the facility.
    ///
    /// # Errors
    /// - `InvalidInput` for folders
    /// - `AuthError::NotSignedIn` when no token is available
    /// - `DownloadError::TransferFailed` from the facility
    pub async fn download_file(&self, file: &FileRecord) -> Result<String> {
        if file.is_folder() {
            return Err(Error::InvalidInput(format!(
                "Cannot download folder {}",
                file.name
            )));
        }

        let token = self.session.get_access_token().await?;
        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), format!("Bearer {}", token));

        info!(
            "Downloading {} ({}) via {}",
            file.name,
            file.id,
            self.downloader.name()
        );
        let location = self
            .downloader
            .download_to_local_storage(&self.content_url(&file.id), &file.name, &headers)
            .await?;

        Ok(location)
    }

    /// Content endpoint for a file id.
    pub fn content_url(&self, file_id: &str) -> String {
        format!(
            "{}/files/{}?alt=media",
            self.base_url,
            utf8_percent_encode(file_id, PATH_SEGMENT)
        )
    }
}

/// Decode a listing response, surfacing the parsed error body on failure.
async fn handle_response(response: reqwest::Response) -> std::result::Result<FileListResponse, ListError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ListError::Transport(e.to_string()))?;

    if !status.is_success() {
        let payload = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
        return Err(ListError::Http {
            status: status.as_u16(),
            payload,
        });
    }

    if text.trim().is_empty() {
        return Ok(FileListResponse {
            files: None,
            next_page_token: None,
        });
    }

    serde_json::from_str(&text).map_err(|e| ListError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gdrive::session::{AuthOptions, ClientIds, Platform};
    use crate::gdrive::testing::FakeSso;
    use crate::memory::MemoryDownloader;
    use drivepicker_common::{AuthError, DownloadError};
    use mockito::Matcher;

    fn folder(id: &str) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            name: format!("folder {}", id),
            mime_type: FOLDER_MIME_TYPE.to_string(),
            size: None,
            modified_time: None,
            web_content_link: None,
            trashed: false,
        }
    }

    fn setup(signed_in: bool, base_url: &str) -> (DriveClient, Arc<MemoryDownloader>) {
        let fake = Arc::new(FakeSso::new());
        fake.set_signed_in(signed_in);
        let mut options = AuthOptions::new("test-key", ClientIds::all("client"));
        options.platform = Some(Platform::Desktop);
        let session = Arc::new(AuthSession::configure(options, fake).unwrap());
        let downloader = Arc::new(MemoryDownloader::new());
        let client = DriveClient::new(session, downloader.clone())
            .unwrap()
            .with_base_url(base_url);
        (client, downloader)
    }

    #[test]
    fn test_file_record_is_folder() {
        assert!(folder("1").is_folder());

        let mut file = folder("2");
        file.mime_type = "application/pdf".to_string();
        assert!(!file.is_folder());
    }

    #[test]
    fn test_file_record_size_as_string_or_number() {
        let from_text: FileRecord =
            serde_json::from_str(r#"{"id":"a","name":"a.pdf","mimeType":"application/pdf","size":"12345"}"#)
                .unwrap();
        assert_eq!(from_text.size, Some(12345));

        let from_number: FileRecord =
            serde_json::from_str(r#"{"id":"a","name":"a.pdf","mimeType":"application/pdf","size":42}"#)
                .unwrap();
        assert_eq!(from_number.size, Some(42));

        let folder: FileRecord = serde_json::from_str(
            r#"{"id":"f","name":"f","mimeType":"application/vnd.google-apps.folder","modifiedTime":"2024-03-05T10:00:00.000Z"}"#,
        )
        .unwrap();
        assert_eq!(folder.size, None);
        assert!(folder.modified_time.is_some());
    }

    #[test]
    fn test_listing_is_one_shot() {
        let mut listing = Listing::new(vec![folder("1"), folder("2")]);
        assert_eq!(listing.len(), 2);
        assert_eq!(listing.next().unwrap().id, "1");
        assert_eq!(listing.len(), 1);
        assert_eq!(listing.next().unwrap().id, "2");
        assert!(listing.next().is_none());
    }

    #[test]
    fn test_content_url_encodes_id() {
        let (client, _) = setup(true, "https://example.com/drive/v3/");
        assert_eq!(
            client.content_url("abc-1_2"),
            "https://example.com/drive/v3/files/abc-1_2?alt=media"
        );
        assert_eq!(
            client.content_url("a/b"),
            "https://example.com/drive/v3/files/a%2Fb?alt=media"
        );
    }

    #[tokio::test]
    async fn test_list_root_owned_sends_fixed_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/files")
            .match_header("authorization", "Bearer access-1")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("key".into(), "test-key".into()),
                Matcher::UrlEncoded("pageSize".into(), "100".into()),
                Matcher::UrlEncoded("spaces".into(), "drive".into()),
                Matcher::UrlEncoded("orderBy".into(), "folder".into()),
                Matcher::UrlEncoded(
                    "fields".into(),
                    "nextPageToken,files(mimeType,id,name,webContentLink,trashed,modifiedTime,size)".into(),
                ),
                Matcher::UrlEncoded(
                    "q".into(),
                    "'me' in owners and 'root' in parents and (mimeType='application/pdf' or mimeType='application/vnd.google-apps.folder')".into(),
                ),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"files":[
                    {"id":"F1","name":"Folder","mimeType":"application/vnd.google-apps.folder","modifiedTime":"2024-01-02T03:04:05Z"},
                    {"id":"P1","name":"a.pdf","mimeType":"application/pdf","size":"2048","modifiedTime":"2024-01-02T03:04:05Z"}
                ],"nextPageToken":"next"}"#,
            )
            .create_async()
            .await;

        let (client, _) = setup(true, &server.url());
        let files: Vec<FileRecord> = client.list_root_owned().await.unwrap().collect();

        mock.assert_async().await;
        assert_eq!(files.len(), 2);
        assert!(files[0].is_folder());
        assert_eq!(files[1].size, Some(2048));
    }

    #[tokio::test]
    async fn test_list_children_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/files")
            .match_query(Matcher::UrlEncoded(
                "q".into(),
                "'F1' in parents and (mimeType='application/pdf' or mimeType='application/vnd.google-apps.folder')".into(),
            ))
            .with_status(200)
            .with_body(r#"{"files":[]}"#)
            .create_async()
            .await;

        let (client, _) = setup(true, &server.url());
        let listing = client.list_children("F1").await.unwrap();

        mock.assert_async().await;
        assert_eq!(listing.len(), 0);
    }

    #[tokio::test]
    async fn test_list_shared_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/files")
            .match_query(Matcher::UrlEncoded(
                "q".into(),
                "sharedWithMe and (mimeType='application/pdf' or mimeType='application/vnd.google-apps.folder')".into(),
            ))
            .with_status(200)
            .with_body(r#"{"files":[{"id":"S1","name":"s.pdf","mimeType":"application/pdf"}]}"#)
            .create_async()
            .await;

        let (client, _) = setup(true, &server.url());
        let listing = client
            .list_view(&PathEntry::View(drivepicker_common::View::Shared))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(listing.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_files_field_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let (client, _) = setup(true, &server.url());
        assert_eq!(client.list_shared_with_me().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_null_files_field_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"files":null}"#)
            .create_async()
            .await;

        let (client, _) = setup(true, &server.url());
        assert_eq!(client.list_children("F1").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_error_status_surfaces_parsed_payload() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body(r#"{"error":{"code":403,"message":"Daily Limit Exceeded"}}"#)
            .create_async()
            .await;

        let (client, _) = setup(true, &server.url());
        let err = client.list_root_owned().await.unwrap_err();

        match err {
            Error::List(ListError::Http { status, payload }) => {
                assert_eq!(status, 403);
                assert_eq!(payload["error"]["message"], "Daily Limit Exceeded");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_status_with_plain_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let (client, _) = setup(true, &server.url());
        let err = client.list_root_owned().await.unwrap_err();

        assert!(matches!(
            err,
            Error::List(ListError::Http { status: 502, payload: serde_json::Value::String(ref body) }) if body == "Bad Gateway"
        ));
    }

    #[tokio::test]
    async fn test_invalid_body_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let (client, _) = setup(true, &server.url());
        let err = client.list_root_owned().await.unwrap_err();
        assert!(matches!(err, Error::List(ListError::Decode(_))));
    }

    #[tokio::test]
    async fn test_list_requires_sign_in() {
        let server = mockito::Server::new_async().await;
        let (client, _) = setup(false, &server.url());

        let err = client.list_root_owned().await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::NotSignedIn)));
    }

    #[tokio::test]
    async fn test_download_file_uses_facility() {
        let (client, downloader) = setup(true, "https://example.com/drive/v3");
        let mut file = folder("P1");
        file.name = "doc.pdf".to_string();
        file.mime_type = "application/pdf".to_string();

        let location = client.download_file(&file).await.unwrap();

        assert_eq!(location, "memory://doc.pdf");
        let requests = downloader.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://example.com/drive/v3/files/P1?alt=media");
        assert_eq!(requests[0].headers.get("Authorization").unwrap(), "Bearer access-1");
    }

    #[tokio::test]
    async fn test_download_failure_passes_message() {
        let (client, downloader) = setup(true, "https://example.com/drive/v3");
        let mut file = folder("P1");
        file.mime_type = "application/pdf".to_string();
        downloader.fail_next("connection reset");

        let err = client.download_file(&file).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Download(DownloadError::TransferFailed(ref msg)) if msg == "connection reset"
        ));
    }

    #[tokio::test]
    async fn test_download_folder_rejected() {
        let (client, downloader) = setup(true, "https://example.com/drive/v3");

        let err = client.download_file(&folder("F1")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(downloader.requests().is_empty());
    }
}
