// ── Facade error types ──
//
// What callers of the gateway see. Adapter errors never escape raw: the
// `From<cloudgate_api::Error>` impl folds them into `Internal`, keeping
// the adapter error as the source for logging.

use thiserror::Error;

pub const REDACTED_DETAIL: &str = "internal error";

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Required input missing or unusable.
    #[error("{0}")]
    BadRequest(String),

    /// The platform answered a critical call with nothing.
    #[error("{0}")]
    UpstreamUnavailable(String),

    /// Anything else, message passed through from the underlying failure.
    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        source: Option<cloudgate_api::Error>,
    },
}

impl GatewayError {
    /// HTTP status this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::UpstreamUnavailable(_) => 502,
            Self::Internal { .. } => 500,
        }
    }

    /// Message suitable for a response body.
    pub fn detail(&self, redact_internal: bool) -> String {
        match self {
            Self::Internal { .. } if redact_internal => REDACTED_DETAIL.to_owned(),
            other => other.to_string(),
        }
    }

    pub fn no_response() -> Self {
        Self::UpstreamUnavailable("No response from cloud API".into())
    }
}

impl From<cloudgate_api::Error> for GatewayError {
    fn from(err: cloudgate_api::Error) -> Self {
        Self::Internal {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(GatewayError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(GatewayError::no_response().status_code(), 502);
        let internal: GatewayError = cloudgate_api::Error::Tls("boom".into()).into();
        assert_eq!(internal.status_code(), 500);
    }

    #[test]
    fn internal_detail_passes_through_unless_redacted() {
        let err: GatewayError = cloudgate_api::Error::Remote {
            status: 502,
            code: None,
            message: "bad gateway".into(),
        }
        .into();
        assert_eq!(err.detail(false), "Remote error (HTTP 502): bad gateway");
        assert_eq!(err.detail(true), REDACTED_DETAIL);
    }

    #[test]
    fn client_errors_are_never_redacted() {
        let err = GatewayError::BadRequest("Query parameter `ids` is required".into());
        assert_eq!(err.detail(true), "Query parameter `ids` is required");
    }
}
