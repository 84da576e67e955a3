//! Credential lifecycle management
//!
//! Produces a currently-valid bearer credential for every outbound call,
//! refreshing or re-authenticating transparently. A refresh failure of any
//! kind falls back to a full login, because a failed refresh does not imply
//! the credentials themselves are invalid. Every successful exchange
//! persists the token set so a warm restart can skip the network round trip.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use roadwatch_core::AuthSession;
use roadwatch_domain::constants::TOKEN_REUSE_MARGIN_SECS;
use roadwatch_domain::{BackendConfig, DeviceError, Result, TokenSet};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::types::{LoginRequest, RefreshRequest, TokenResponse};
use crate::storage::token_store::TokenFileStore;

/// Trait for attaching authentication headers to outbound requests
///
/// Seam for testing the backend client without a live credential exchange.
#[async_trait]
pub trait AuthHeaderProvider: Send + Sync {
    /// Headers carrying the bearer token, content type, and device user-agent
    async fn auth_headers(&self) -> Result<HeaderMap>;
}

/// Manages the device's access/refresh token lifecycle
pub struct CredentialManager {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    user_agent: String,
    token_store: TokenFileStore,
    current: RwLock<Option<TokenSet>>,
}

impl CredentialManager {
    /// Create a new credential manager
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Config` if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig, token_store: TokenFileStore) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.auth_timeout_secs))
            .build()
            .map_err(|e| DeviceError::Config(format!("failed to build auth client: {e}")))?;

        let user_agent =
            format!("roadwatch-device/{} ({})", env!("CARGO_PKG_VERSION"), config.device_id);

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            user_agent,
            token_store,
            current: RwLock::new(None),
        })
    }

    /// Load the persisted token set, if any
    ///
    /// An access token with less than the reuse margin of validity left is
    /// not trusted for direct use; only its refresh token is kept so the
    /// first call goes through refresh instead of a full login.
    pub async fn initialize(&self) {
        match self.token_store.load().await {
            Ok(Some(mut token)) => {
                if token.is_valid(TOKEN_REUSE_MARGIN_SECS) {
                    info!(
                        seconds_left = ?token.seconds_until_expiry(),
                        "Reusing persisted access token"
                    );
                } else {
                    debug!("Persisted access token expired or expiring soon; keeping refresh token");
                    token.access_token.clear();
                    token.expires_at = None;
                }
                *self.current.write().await = Some(token);
            }
            Ok(None) => debug!("No persisted token found"),
            Err(e) => warn!(error = %e, "Failed to load persisted token; starting unauthenticated"),
        }
    }

    /// Perform the credential exchange and install the fresh token set
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Auth` if the exchange fails or the auth service
    /// is unreachable.
    #[instrument(skip(self))]
    pub async fn login(&self) -> Result<TokenSet> {
        debug!("Performing credential exchange");

        let request =
            LoginRequest { username: self.username.clone(), password: self.password.clone() };
        let response = self
            .http
            .post(format!("{}/api/auth/login", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| DeviceError::Auth(format!("login request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeviceError::Auth(format!("login rejected with status {status}")));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| DeviceError::Auth(format!("invalid login response: {e}")))?;

        let token = self.install(body).await;
        info!("Login succeeded");
        Ok(token)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet> {
        debug!("Refreshing access token");

        let request = RefreshRequest { refresh_token: refresh_token.to_string() };
        let response = self
            .http
            .post(format!("{}/api/auth/refresh", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| DeviceError::Auth(format!("refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeviceError::Auth(format!("refresh rejected with status {status}")));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| DeviceError::Auth(format!("invalid refresh response: {e}")))?;

        Ok(self.install(body).await)
    }

    async fn ensure_token(&self) -> Result<TokenSet> {
        if let Some(token) = self.current.read().await.as_ref() {
            if token.is_valid(0) {
                return Ok(token.clone());
            }
        }
        self.refresh_or_login().await
    }

    async fn refresh_or_login(&self) -> Result<TokenSet> {
        let refresh_token =
            self.current.read().await.as_ref().and_then(|t| t.refresh_token.clone());

        if let Some(refresh_token) = refresh_token {
            match self.refresh(&refresh_token).await {
                Ok(token) => return Ok(token),
                Err(e) => warn!(error = %e, "Token refresh failed; falling back to login"),
            }
        }

        self.login().await
    }

    /// Cache and persist a fresh token set
    async fn install(&self, response: TokenResponse) -> TokenSet {
        // A refresh response may omit the refresh token; keep the current one
        let previous_refresh =
            self.current.read().await.as_ref().and_then(|t| t.refresh_token.clone());

        let token = TokenSet::from_ttl(
            response.access_token,
            response.refresh_token.or(previous_refresh),
            response.expires_in,
        );

        if let Err(e) = self.token_store.save(&token).await {
            warn!(error = %e, "Failed to persist token set");
        }

        *self.current.write().await = Some(token.clone());
        token
    }
}

#[async_trait]
impl AuthHeaderProvider for CredentialManager {
    async fn auth_headers(&self) -> Result<HeaderMap> {
        let token = self.ensure_token().await?;

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token.access_token))
            .map_err(|e| DeviceError::Internal(format!("invalid bearer header: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let agent = HeaderValue::from_str(&self.user_agent)
            .map_err(|e| DeviceError::Internal(format!("invalid user agent: {e}")))?;
        headers.insert(USER_AGENT, agent);

        Ok(headers)
    }
}

#[async_trait]
impl AuthSession for CredentialManager {
    async fn force_login(&self) -> Result<()> {
        self.login().await.map(|_| ())
    }
}
