//! Credential types
//!
//! A [`TokenSet`] is mutated only by the credential manager after a
//! successful login or refresh, and persisted so the process can resume
//! without re-authenticating on every cold start.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::TOKEN_TTL_SKEW_SECS;

/// Access/refresh credential pair with expiry bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Always set together with `access_token`; a present access token with
    /// `expires_at` in the past is treated as absent.
    pub expires_at: Option<DateTime<Utc>>,
    pub saved_at: DateTime<Utc>,
}

impl TokenSet {
    /// Build a token set from a server-reported TTL
    ///
    /// Applies a 60-second safety margin against clock skew and in-flight
    /// latency: `expires_at = now + ttl - 60s`.
    pub fn from_ttl(access_token: String, refresh_token: Option<String>, ttl_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            access_token,
            refresh_token,
            expires_at: Some(now + Duration::seconds(ttl_secs - TOKEN_TTL_SKEW_SECS)),
            saved_at: now,
        }
    }

    /// Whether the access token can be used with at least `margin_secs` of
    /// remaining validity
    pub fn is_valid(&self, margin_secs: i64) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        self.expires_at
            .is_some_and(|expires_at| expires_at - Utc::now() > Duration::seconds(margin_secs))
    }

    /// Seconds until expiry, if an expiry is set
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.expires_at.map(|expires_at| (expires_at - Utc::now()).num_seconds())
    }
}
