//! Scriptable SSO provider used by the unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::sso::{SsoConfig, SsoError, SsoErrorCode, SsoProvider, SsoTokens};

struct FakeState {
    configured: Option<SsoConfig>,
    signed_in: bool,
    platform_services: bool,
    access_token: String,
    id_token: Option<String>,
    sign_in_error: Option<SsoError>,
    sign_out_error: Option<SsoError>,
    tokens_error: Option<SsoError>,
}

pub(crate) struct FakeSso {
    state: Mutex<FakeState>,
    token_calls: AtomicUsize,
}

impl FakeSso {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                configured: None,
                signed_in: false,
                platform_services: true,
                access_token: "access-1".to_string(),
                id_token: Some("id-token".to_string()),
                sign_in_error: None,
                sign_out_error: None,
                tokens_error: None,
            }),
            token_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn configured(&self) -> Option<SsoConfig> {
        self.state.lock().unwrap().configured.clone()
    }

    pub(crate) fn signed_in(&self) -> bool {
        self.state.lock().unwrap().signed_in
    }

    pub(crate) fn set_signed_in(&self, signed_in: bool) {
        self.state.lock().unwrap().signed_in = signed_in;
    }

    pub(crate) fn set_access_token(&self, token: &str) {
        self.state.lock().unwrap().access_token = token.to_string();
    }

    pub(crate) fn set_id_token(&self, token: Option<&str>) {
        self.state.lock().unwrap().id_token = token.map(str::to_string);
    }

    pub(crate) fn disable_platform_services(&self) {
        self.state.lock().unwrap().platform_services = false;
    }

    pub(crate) fn fail_sign_in(&self, err: SsoError) {
        self.state.lock().unwrap().sign_in_error = Some(err);
    }

    pub(crate) fn fail_sign_out(&self, err: SsoError) {
        self.state.lock().unwrap().sign_out_error = Some(err);
    }

    pub(crate) fn fail_tokens(&self, err: SsoError) {
        self.state.lock().unwrap().tokens_error = Some(err);
    }

    pub(crate) fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SsoProvider for FakeSso {
    fn name(&self) -> &str {
        "fake"
    }

    fn configure(&self, config: &SsoConfig) -> Result<(), SsoError> {
        self.state.lock().unwrap().configured = Some(config.clone());
        Ok(())
    }

    async fn has_platform_services(&self) -> Result<(), SsoError> {
        if self.state.lock().unwrap().platform_services {
            Ok(())
        } else {
            Err(SsoError::new(
                SsoErrorCode::PlayServicesNotAvailable,
                "play services missing",
            ))
        }
    }

    async fn sign_in(&self) -> Result<(), SsoError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.sign_in_error.take() {
            return Err(err);
        }
        state.signed_in = true;
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), SsoError> {
        let mut state = self.state.lock().unwrap();
        state.signed_in = false;
        match state.sign_out_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn is_signed_in(&self) -> bool {
        self.state.lock().unwrap().signed_in
    }

    async fn get_tokens(&self) -> Result<SsoTokens, SsoError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if let Some(err) = &state.tokens_error {
            return Err(err.clone());
        }
        if !state.signed_in {
            return Err(SsoError::new(SsoErrorCode::SignInRequired, "no session"));
        }
        Ok(SsoTokens {
            access_token: state.access_token.clone(),
            id_token: state.id_token.clone(),
        })
    }
}
