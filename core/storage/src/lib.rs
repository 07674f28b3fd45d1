//! Google Drive access for drivepicker.
//!
//! This crate provides the authenticated session, the listing client and
//! the download facilities that write remote content to local storage.
//!
//! # Design Principles
//! - Explicit wiring: sessions and clients are constructed and passed, never global
//! - Async operations: every network call is async and issued once, without retries
//! - Seams as traits: the SSO provider and the download facility can be faked
//! - Typed failures: every error is a `drivepicker_common::Error` variant

pub mod download;
pub mod gdrive;
pub mod local;
pub mod memory;

pub use download::{DownloadFacility, Headers};
pub use gdrive::{
    AuthOptions, AuthSession, ClientIds, Credential, DriveClient, FileRecord, Listing,
    ListQuery, OAuthConfig, OAuthProvider, Platform, SsoConfig, SsoError, SsoErrorCode,
    SsoProvider, SsoTokens,
};
pub use local::LocalDownloader;
pub use memory::MemoryDownloader;
