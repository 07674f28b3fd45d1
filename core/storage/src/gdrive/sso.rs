//! Single-sign-on provider seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use drivepicker_common::AuthError;

/// Configuration handed to the SSO provider by `AuthSession::configure`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoConfig {
    /// OAuth client id for the current platform.
    pub web_client_id: String,
    /// Client secret, required by installed-app clients only.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Requested scopes, in order.
    pub scopes: Vec<String>,
    /// Ask for the basic profile alongside the drive scopes.
    pub fetch_basic_profile: bool,
}

/// Tokens reported by the provider.
#[derive(Clone, PartialEq, Eq)]
pub struct SsoTokens {
    pub access_token: String,
    pub id_token: Option<String>,
}

impl fmt::Debug for SsoTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SsoTokens")
            .field("access_token", &"[REDACTED]")
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Provider status codes we know how to interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SsoErrorCode {
    SignInCancelled,
    InProgress,
    PlayServicesNotAvailable,
    SignInRequired,
    Other,
}

/// Failure reported by an SSO provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code:?}: {message}")]
pub struct SsoError {
    pub code: SsoErrorCode,
    pub message: String,
}

impl SsoError {
    pub fn new(code: SsoErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(SsoErrorCode::Other, message)
    }
}

impl From<SsoError> for AuthError {
    fn from(err: SsoError) -> Self {
        match err.code {
            SsoErrorCode::SignInCancelled => AuthError::Cancelled,
            SsoErrorCode::InProgress => AuthError::InProgress,
            SsoErrorCode::PlayServicesNotAvailable => AuthError::ServiceUnavailable,
            SsoErrorCode::SignInRequired => AuthError::NotSignedIn,
            SsoErrorCode::Other => AuthError::Unknown(err.message),
        }
    }
}

/// External sign-in capability.
///
/// The provider is an opaque, trusted collaborator: its own retry and
/// error semantics are passed through, never reimplemented.
#[async_trait]
pub trait SsoProvider: Send + Sync {
    /// Get the provider name (e.g., "oauth", "fake").
    fn name(&self) -> &str;

    /// Apply the resolved configuration. Called once, before anything else.
    fn configure(&self, config: &SsoConfig) -> Result<(), SsoError>;

    /// Check that the platform sign-in backend is usable.
    async fn has_platform_services(&self) -> Result<(), SsoError>;

    /// Run the interactive sign-in flow.
    async fn sign_in(&self) -> Result<(), SsoError>;

    /// End the session upstream.
    async fn sign_out(&self) -> Result<(), SsoError>;

    /// Whether the provider holds a session.
    async fn is_signed_in(&self) -> bool;

    /// Current tokens, refreshed by the provider if needed.
    async fn get_tokens(&self) -> Result<SsoTokens, SsoError>;
}
