//! OAuth2 sign-in provider for desktop targets.
//!
//! Implements `SsoProvider` with the authorization-code flow (PKCE) against
//! Google's endpoints. The browser is sent back to a loopback listener and
//! tokens are kept in a JSON file so a later process stays signed in.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, ExtraTokenFields, PkceCodeChallenge, RedirectUrl, RefreshToken, RequestTokenError,
    RevocationUrl, Scope, StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock as StdRwLock;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use drivepicker_common::{Error, Result};

use super::sso::{SsoConfig, SsoError, SsoErrorCode, SsoProvider, SsoTokens};

/// OAuth2 authorization endpoint.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// OAuth2 token endpoint.
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// OAuth2 revocation endpoint.
const GOOGLE_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

/// Scopes added when the basic profile is requested; `openid` yields the id token.
const PROFILE_SCOPES: [&str; 3] = ["openid", "email", "profile"];

/// Extra fields Google returns next to the access token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoogleTokenFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl ExtraTokenFields for GoogleTokenFields {}

type GoogleTokenResponse = StandardTokenResponse<GoogleTokenFields, BasicTokenType>;

type GoogleClient = Client<
    BasicErrorResponse,
    GoogleTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
    EndpointSet,
>;

/// OAuth2 tokens with expiration tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTokens {
    /// Access token for API requests.
    pub access_token: String,
    /// Refresh token for obtaining new access tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// OpenID Connect identity token.
    #[serde(default)]
    pub id_token: Option<String>,
    /// When the access token expires.
    pub expires_at: DateTime<Utc>,
}

impl StoredTokens {
    /// Check if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        // Consider expired if less than 5 minutes remaining
        self.expires_at < Utc::now() + Duration::minutes(5)
    }

    fn from_response(response: &GoogleTokenResponse, previous: Option<&StoredTokens>) -> Self {
        let expires_in = response
            .expires_in()
            .unwrap_or_else(|| std::time::Duration::from_secs(3600));
        let expires_at =
            Utc::now() + Duration::from_std(expires_in).unwrap_or_else(|_| Duration::hours(1));

        // Refresh responses usually omit the refresh and id tokens.
        Self {
            access_token: response.access_token().secret().clone(),
            refresh_token: response
                .refresh_token()
                .map(|t| t.secret().clone())
                .or_else(|| previous.and_then(|p| p.refresh_token.clone())),
            id_token: response
                .extra_fields()
                .id_token
                .clone()
                .or_else(|| previous.and_then(|p| p.id_token.clone())),
            expires_at,
        }
    }
}

/// Settings for the desktop OAuth2 provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Where tokens are persisted; `None` keeps them in memory only.
    #[serde(default)]
    pub token_path: Option<PathBuf>,
    /// How long to wait for the browser to come back, in seconds.
    #[serde(default = "default_callback_timeout")]
    pub callback_timeout_secs: u64,
    /// Open the authorization URL automatically.
    #[serde(default = "default_open_browser")]
    pub open_browser: bool,
}

fn default_callback_timeout() -> u64 {
    300
}

fn default_open_browser() -> bool {
    true
}

impl OAuthConfig {
    /// Default token file under the user's config directory.
    pub fn default_token_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("drivepicker").join("tokens.json"))
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            token_path: Self::default_token_path(),
            callback_timeout_secs: default_callback_timeout(),
            open_browser: default_open_browser(),
        }
    }
}

/// Client and scopes resolved by `configure`.
#[derive(Clone)]
struct Configured {
    client: GoogleClient,
    scopes: Vec<String>,
}

/// Parameters delivered to the loopback redirect.
#[derive(Debug, PartialEq, Eq)]
struct CallbackParams {
    code: String,
    state: String,
}

/// Clears the in-progress flag when a sign-in attempt ends.
struct InProgressGuard<'a>(&'a AtomicBool);

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Desktop OAuth2 implementation of `SsoProvider`.
pub struct OAuthProvider {
    config: OAuthConfig,
    http: oauth2::reqwest::Client,
    configured: StdRwLock<Option<Configured>>,
    tokens: RwLock<Option<StoredTokens>>,
    sign_in_running: AtomicBool,
}

impl OAuthProvider {
    /// Create a provider. Persisted tokens are loaded by `configure`.
    ///
    /// # Errors
    /// - The HTTP client could not be built
    pub fn new(config: OAuthConfig) -> Result<Self> {
        let http = oauth2::reqwest::ClientBuilder::new()
            // Token requests must not follow redirects.
            .redirect(oauth2::reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http,
            configured: StdRwLock::new(None),
            tokens: RwLock::new(None),
            sign_in_running: AtomicBool::new(false),
        })
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(OAuthConfig::default())
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    fn configured(&self) -> std::result::Result<Configured, SsoError> {
        self.configured
            .read()
            .map_err(|_| SsoError::other("Provider state poisoned"))?
            .clone()
            .ok_or_else(|| SsoError::other("Provider used before configure"))
    }

    /// Replace the stored tokens and persist them.
    async fn store_tokens(&self, tokens: StoredTokens) {
        if let Some(path) = &self.config.token_path {
            if let Err(e) = save_tokens(path, &tokens).await {
                warn!("Failed to persist tokens to {}: {}", path.display(), e);
            }
        }
        *self.tokens.write().await = Some(tokens);
    }

    async fn refresh(&self, current: &StoredTokens) -> std::result::Result<StoredTokens, SsoError> {
        let refresh_token = current.refresh_token.as_ref().ok_or_else(|| {
            SsoError::new(SsoErrorCode::SignInRequired, "Access token expired and no refresh token")
        })?;
        let configured = self.configured()?;

        info!("Refreshing expired access token");
        let response = configured
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .request_async(&self.http)
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(response) => SsoError::new(
                    SsoErrorCode::SignInRequired,
                    format!("Token refresh rejected: {}", response),
                ),
                other => SsoError::other(format!("Token refresh failed: {}", other)),
            })?;

        let tokens = StoredTokens::from_response(&response, Some(current));
        self.store_tokens(tokens.clone()).await;
        Ok(tokens)
    }

    /// Run one authorization-code round trip through the browser.
    async fn authorize(&self, configured: &Configured) -> std::result::Result<StoredTokens, SsoError> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| SsoError::other(format!("Failed to bind loopback listener: {}", e)))?;
        let port = listener
            .local_addr()
            .map_err(|e| SsoError::other(e.to_string()))?
            .port();
        let redirect = RedirectUrl::new(format!("http://127.0.0.1:{}/callback", port))
            .map_err(|e| SsoError::other(format!("Invalid redirect URL: {}", e)))?;

        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf_token) = configured
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(configured.scopes.iter().cloned().map(Scope::new))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(challenge)
            .set_redirect_uri(Cow::Borrowed(&redirect))
            .url();

        info!("Starting browser sign-in");
        debug!("Loopback redirect on port {}", port);
        if !self.config.open_browser || open::that(auth_url.as_str()).is_err() {
            eprintln!("\nOpen this URL in your browser to sign in:\n\n{}\n", auth_url);
        }

        let timeout = std::time::Duration::from_secs(self.config.callback_timeout_secs);
        let params = tokio::time::timeout(timeout, wait_for_callback(&listener))
            .await
            .map_err(|_| SsoError::other("Timed out waiting for the sign-in redirect"))??;

        if params.state != *csrf_token.secret() {
            return Err(SsoError::other("OAuth state mismatch"));
        }

        let response = configured
            .client
            .exchange_code(AuthorizationCode::new(params.code))
            .set_pkce_verifier(verifier)
            .set_redirect_uri(Cow::Borrowed(&redirect))
            .request_async(&self.http)
            .await
            .map_err(|e| SsoError::other(format!("Token exchange failed: {}", e)))?;

        Ok(StoredTokens::from_response(&response, None))
    }
}

#[async_trait]
impl SsoProvider for OAuthProvider {
    fn name(&self) -> &str {
        "oauth"
    }

    fn configure(&self, config: &SsoConfig) -> std::result::Result<(), SsoError> {
        let auth_url = AuthUrl::new(GOOGLE_AUTH_URL.to_string())
            .map_err(|e| SsoError::other(format!("Invalid auth URL: {}", e)))?;
        let token_url = TokenUrl::new(GOOGLE_TOKEN_URL.to_string())
            .map_err(|e| SsoError::other(format!("Invalid token URL: {}", e)))?;
        let revocation_url = RevocationUrl::new(GOOGLE_REVOKE_URL.to_string())
            .map_err(|e| SsoError::other(format!("Invalid revocation URL: {}", e)))?;

        let mut client: GoogleClient = Client::new(ClientId::new(config.web_client_id.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_revocation_url(revocation_url);
        if let Some(secret) = &config.client_secret {
            client = client.set_client_secret(ClientSecret::new(secret.clone()));
        }

        let mut scopes = config.scopes.clone();
        if config.fetch_basic_profile {
            for scope in PROFILE_SCOPES {
                if !scopes.iter().any(|s| s == scope) {
                    scopes.push(scope.to_string());
                }
            }
        }

        *self
            .configured
            .write()
            .map_err(|_| SsoError::other("Provider state poisoned"))? =
            Some(Configured { client, scopes });

        if let Some(path) = &self.config.token_path {
            match load_tokens(path) {
                Ok(Some(tokens)) => {
                    debug!("Restored session from {}", path.display());
                    // Nothing can hold the lock before configure returns.
                    if let Ok(mut slot) = self.tokens.try_write() {
                        *slot = Some(tokens);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Ignoring unreadable token file {}: {}", path.display(), e),
            }
        }

        Ok(())
    }

    async fn has_platform_services(&self) -> std::result::Result<(), SsoError> {
        // Desktop sign-in only needs a browser and a loopback port.
        self.configured().map(|_| ())
    }

    async fn sign_in(&self) -> std::result::Result<(), SsoError> {
        if self
            .sign_in_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SsoError::new(
                SsoErrorCode::InProgress,
                "Sign-in already in progress",
            ));
        }
        let _guard = InProgressGuard(&self.sign_in_running);

        let configured = self.configured()?;
        let tokens = self.authorize(&configured).await?;
        self.store_tokens(tokens).await;
        info!("Browser sign-in completed");
        Ok(())
    }

    async fn sign_out(&self) -> std::result::Result<(), SsoError> {
        let tokens = self.tokens.write().await.take();

        if let Some(path) = &self.config.token_path {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove token file {}: {}", path.display(), e),
            }
        }

        let Some(tokens) = tokens else {
            return Ok(());
        };

        // Revoking the refresh token ends the whole grant.
        let revocable = match tokens.refresh_token.clone() {
            Some(refresh) => StandardRevocableToken::RefreshToken(RefreshToken::new(refresh)),
            None => StandardRevocableToken::AccessToken(oauth2::AccessToken::new(
                tokens.access_token.clone(),
            )),
        };

        let configured = self.configured()?;
        configured
            .client
            .revoke_token(revocable)
            .map_err(|e| SsoError::other(format!("Revocation not configured: {}", e)))?
            .request_async(&self.http)
            .await
            .map_err(|e| SsoError::other(format!("Token revocation failed: {}", e)))?;

        Ok(())
    }

    async fn is_signed_in(&self) -> bool {
        self.tokens.read().await.is_some()
    }

    async fn get_tokens(&self) -> std::result::Result<SsoTokens, SsoError> {
        let current = self
            .tokens
            .read()
            .await
            .clone()
            .ok_or_else(|| SsoError::new(SsoErrorCode::SignInRequired, "No stored session"))?;

        let tokens = if current.is_expired() {
            self.refresh(&current).await?
        } else {
            current
        };

        Ok(SsoTokens {
            access_token: tokens.access_token,
            id_token: tokens.id_token,
        })
    }
}

/// Accept loopback connections until one carries the redirect.
async fn wait_for_callback(listener: &TcpListener) -> std::result::Result<CallbackParams, SsoError> {
    loop {
        let (mut stream, _) = listener
            .accept()
            .await
            .map_err(|e| SsoError::other(format!("Loopback accept failed: {}", e)))?;

        let mut request_line = String::new();
        {
            let mut reader = BufReader::new(&mut stream);
            if reader.read_line(&mut request_line).await.is_err() {
                continue;
            }
        }

        // Browsers also ask for /favicon.ico; ignore anything else.
        let Some(outcome) = parse_callback(&request_line) else {
            let _ = stream
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n")
                .await;
            continue;
        };

        let page: &[u8] = if outcome.is_ok() {
            b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n\
              <html><body><h1>Signed in</h1><p>You can close this window.</p></body></html>"
        } else {
            b"HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\n\r\n\
              <html><body><h1>Sign-in failed</h1><p>You can close this window.</p></body></html>"
        };
        let _ = stream.write_all(page).await;
        let _ = stream.flush().await;

        return outcome;
    }
}

/// Parse `GET /callback?code=..&state=.. HTTP/1.1`.
///
/// Returns `None` for requests that aren't the redirect.
fn parse_callback(request_line: &str) -> Option<std::result::Result<CallbackParams, SsoError>> {
    let mut parts = request_line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let target = parts.next()?;
    if !target.starts_with("/callback") {
        return None;
    }

    let url = Url::parse(&format!("http://127.0.0.1{}", target)).ok()?;
    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        let code = if error == "access_denied" {
            SsoErrorCode::SignInCancelled
        } else {
            SsoErrorCode::Other
        };
        return Some(Err(SsoError::new(code, format!("Authorization denied: {}", error))));
    }

    Some(match code {
        Some(code) => Ok(CallbackParams {
            code,
            state: state.unwrap_or_default(),
        }),
        None => Err(SsoError::other("Missing authorization code in redirect")),
    })
}

fn load_tokens(path: &Path) -> std::io::Result<Option<StoredTokens>> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

async fn save_tokens(path: &Path, tokens: &StoredTokens) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(tokens)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    tokio::fs::write(path, json).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }

    Ok(())
}
