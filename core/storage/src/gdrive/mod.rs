//! Google Drive access.
//!
//! This module provides:
//! - An explicitly constructed sign-in session with a cached bearer token
//! - The SSO provider seam and a desktop OAuth2 implementation of it
//! - One parameterised listing query for the three views
//! - The listing and download client

pub mod auth;
pub mod client;
pub mod query;
pub mod session;
pub mod sso;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{OAuthConfig, OAuthProvider, StoredTokens};
pub use client::{DriveClient, FileRecord, Listing, DRIVE_API_BASE};
pub use query::{Condition, ListQuery, FOLDER_MIME_TYPE, PDF_MIME_TYPE};
pub use session::{AuthOptions, AuthSession, ClientIds, Credential, Platform, DEFAULT_SCOPES};
pub use sso::{SsoConfig, SsoError, SsoErrorCode, SsoProvider, SsoTokens};
