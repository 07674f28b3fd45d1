//! Sign-in session and bearer token cache.
//!
//! The session is constructed explicitly from its options and an SSO
//! provider and then passed to whatever needs a token. Construction is
//! configuration, so nothing can run against an unconfigured provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use drivepicker_common::{AuthError, Error, Result};

use super::sso::{SsoConfig, SsoProvider};

/// Scopes requested when the options don't name any.
pub const DEFAULT_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/drive.metadata.readonly",
    "https://www.googleapis.com/auth/drive.readonly",
];

/// Platform whose OAuth client id is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    Desktop,
}

impl Platform {
    /// Platform of the current build target.
    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            Platform::Android
        } else if cfg!(target_os = "ios") {
            Platform::Ios
        } else {
            Platform::Desktop
        }
    }
}

/// OAuth client ids, one per platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIds {
    #[serde(default)]
    pub android: Option<String>,
    #[serde(default)]
    pub ios: Option<String>,
    #[serde(default)]
    pub desktop: Option<String>,
}

impl ClientIds {
    /// Same client id on every platform.
    pub fn all(client_id: impl Into<String>) -> Self {
        let client_id = client_id.into();
        Self {
            android: Some(client_id.clone()),
            ios: Some(client_id.clone()),
            desktop: Some(client_id),
        }
    }

    /// Client id for `platform`, if one is configured.
    pub fn for_platform(&self, platform: Platform) -> Option<&str> {
        let id = match platform {
            Platform::Android => self.android.as_deref(),
            Platform::Ios => self.ios.as_deref(),
            Platform::Desktop => self.desktop.as_deref(),
        };
        id.filter(|id| !id.is_empty())
    }
}

/// Options recognised by `AuthSession::configure`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthOptions {
    /// API key sent as `key` on every listing request.
    pub api_key: String,
    /// Platform-specific OAuth client ids.
    pub client_id: ClientIds,
    /// Client secret for installed-app clients.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Requested scopes; `DEFAULT_SCOPES` when absent.
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
    /// Overrides the detected platform.
    #[serde(default)]
    pub platform: Option<Platform>,
}

impl AuthOptions {
    pub fn new(api_key: impl Into<String>, client_id: ClientIds) -> Self {
        Self {
            api_key: api_key.into(),
            client_id,
            client_secret: None,
            scopes: None,
            platform: None,
        }
    }

    /// Scopes to request, in order.
    pub fn resolved_scopes(&self) -> Vec<String> {
        match &self.scopes {
            Some(scopes) => scopes.clone(),
            None => DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthOptions")
            .field("api_key", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("scopes", &self.scopes)
            .field("platform", &self.platform)
            .finish()
    }
}

/// Cached bearer credential. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    access_token: String,
    id_token: Option<String>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, id_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            id_token,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_deref()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential([REDACTED])")
    }
}

/// Signed-in session holding the current bearer token.
pub struct AuthSession {
    provider: Arc<dyn SsoProvider>,
    options: AuthOptions,
    platform: Platform,
    credential: RwLock<Option<Credential>>,
}

impl AuthSession {
    /// Configure the provider and create the session.
    ///
    /// # Errors
    /// - No client id for the resolved platform
    /// - The provider rejected the configuration
    pub fn configure(options: AuthOptions, provider: Arc<dyn SsoProvider>) -> Result<Self> {
        let platform = options.platform.unwrap_or_else(Platform::current);
        let web_client_id = options
            .client_id
            .for_platform(platform)
            .ok_or_else(|| {
                Error::Config(format!("No OAuth client id configured for {:?}", platform))
            })?
            .to_string();

        let config = SsoConfig {
            web_client_id,
            client_secret: options.client_secret.clone(),
            scopes: options.resolved_scopes(),
            fetch_basic_profile: true,
        };

        provider.configure(&config).map_err(AuthError::from)?;
        info!("Configured {} sign-in for {:?}", provider.name(), platform);

        Ok(Self {
            provider,
            options,
            platform,
            credential: RwLock::new(None),
        })
    }

    /// API key for listing requests.
    pub fn api_key(&self) -> &str {
        &self.options.api_key
    }

    pub fn options(&self) -> &AuthOptions {
        &self.options
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Run the interactive sign-in flow and return the id token.
    ///
    /// # Postconditions
    /// - On success the access token is cached
    ///
    /// # Errors
    /// - `Cancelled`, `InProgress`, `ServiceUnavailable` from the provider
    /// - `Unknown` for anything else, including a missing id token
    pub async fn sign_in(&self) -> std::result::Result<String, AuthError> {
        let outcome = self.run_sign_in().await;
        if let Err(e) = &outcome {
            warn!("Sign-in failed: {}", e);
        }
        outcome
    }

    async fn run_sign_in(&self) -> std::result::Result<String, AuthError> {
        self.provider.has_platform_services().await?;
        self.provider.sign_in().await?;
        let tokens = self.provider.get_tokens().await?;

        if !tokens.access_token.is_empty() {
            *self.credential.write().await =
                Some(Credential::new(tokens.access_token.clone(), tokens.id_token.clone()));
        }
        info!("Signed in with {}", self.provider.name());

        match tokens.id_token {
            Some(id_token) if !id_token.is_empty() => Ok(id_token),
            _ => Err(AuthError::Unknown("idToken empty".to_string())),
        }
    }

    /// End the session.
    ///
    /// The cached credential is cleared whether or not the provider managed
    /// to sign out upstream; an upstream failure is still returned.
    pub async fn sign_out(&self) -> std::result::Result<(), AuthError> {
        let upstream = self.provider.sign_out().await;
        *self.credential.write().await = None;

        match upstream {
            Ok(()) => {
                info!("Signed out");
                Ok(())
            }
            Err(e) => {
                warn!("Provider sign-out failed, local session cleared: {}", e);
                Err(e.into())
            }
        }
    }

    /// Get the bearer token, fetching one from the provider if none is cached.
    ///
    /// # Errors
    /// - `NotSignedIn` when the provider has no session or returns an empty token
    pub async fn get_access_token(&self) -> std::result::Result<String, AuthError> {
        if let Some(credential) = self.credential.read().await.as_ref() {
            return Ok(credential.access_token().to_string());
        }

        debug!("No cached access token, asking provider");
        let tokens = self.provider.get_tokens().await?;
        if tokens.access_token.is_empty() {
            return Err(AuthError::NotSignedIn);
        }

        let access_token = tokens.access_token.clone();
        *self.credential.write().await = Some(Credential::new(tokens.access_token, tokens.id_token));
        Ok(access_token)
    }

    /// Whether a session exists and a token can currently be retrieved.
    pub async fn is_signed_in(&self) -> bool {
        if !self.provider.is_signed_in().await {
            return false;
        }
        match self.provider.get_tokens().await {
            Ok(tokens) => !tokens.access_token.is_empty(),
            Err(e) => {
                debug!("Stored session has no usable token: {}", e);
                false
            }
        }
    }

    /// Whether a token is cached locally.
    pub async fn has_cached_token(&self) -> bool {
        self.credential.read().await.is_some()
    }
}
