use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;
use serde::Deserialize;

/// Refresh the token this many seconds before the platform says it expires.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Project credentials issued by the cloud platform.
///
/// The secret never leaves this struct except as HMAC key material.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Access ID (a.k.a. client id), sent in the clear on every request.
    pub access_id: String,
    /// Access secret, used only to sign requests.
    pub access_secret: SecretString,
}

impl Credentials {
    pub fn new(access_id: impl Into<String>, access_secret: SecretString) -> Self {
        Self {
            access_id: access_id.into(),
            access_secret,
        }
    }
}

/// `result` object of a successful token grant or refresh.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenGrant {
    pub access_token: String,
    /// Lifetime in seconds.
    pub expire_time: i64,
    pub refresh_token: String,
    #[serde(default)]
    pub uid: Option<String>,
}

/// The authenticated part of a session: the current access token.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub uid: Option<String>,
    /// Absolute expiry, computed from the platform's clock (`t`) when known.
    pub expires_at: DateTime<Utc>,
}

impl TokenInfo {
    /// Build from a grant issued at `issued_at` (the envelope's `t`).
    pub(crate) fn from_grant(grant: TokenGrant, issued_at: DateTime<Utc>) -> Self {
        Self {
            access_token: grant.access_token.into(),
            refresh_token: grant.refresh_token.into(),
            uid: grant.uid,
            expires_at: issued_at + TimeDelta::seconds(grant.expire_time),
        }
    }

    /// Whether the token should be refreshed before use at `now`.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - TimeDelta::seconds(REFRESH_MARGIN_SECS) <= now
    }
}
