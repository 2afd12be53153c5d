use thiserror::Error;

/// Platform result code for an expired or revoked access token.
pub const TOKEN_INVALID_CODE: i64 = 1010;

/// Top-level error type for the `cloudgate-api` crate.
///
/// Covers every failure mode of the adapter: authentication, transport,
/// upstream rejections, and response decoding. `cloudgate-core` maps these
/// into the facade's error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Token request rejected (wrong access id/secret, disabled project, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Credential material cannot be placed in a request header.
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("Connectivity error: {0}")]
    Connectivity(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Upstream ────────────────────────────────────────────────────
    /// Non-success answer from the platform: either a non-2xx HTTP status
    /// or a `{"success": false, "code": .., "msg": ..}` envelope.
    #[error("Remote error (HTTP {status}): {message}")]
    Remote {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if re-authenticating might resolve this error.
    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self,
            Self::Remote {
                code: Some(TOKEN_INVALID_CODE),
                ..
            }
        )
    }

    /// Returns `true` for transport-level failures (nothing reached the platform
    /// or no answer came back).
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_) | Self::Timeout { .. })
    }

    /// The upstream HTTP status, if the platform answered.
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            Self::Connectivity(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
