//! CLI error types with miette diagnostics.
//!
//! Maps config and adapter errors into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use cloudgate_api::Error as ApiError;
use cloudgate_config::ConfigError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const REMOTE: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum AppError {
    // ── Configuration ────────────────────────────────────────────────

    #[error("No {field} configured")]
    #[diagnostic(
        code(cloudgate::no_credentials),
        help(
            "Set {hint}, or add `{field}` to the config file.\n\
             Run: cloudgate config path"
        )
    )]
    NoCredentials { field: String, hint: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(cloudgate::validation))]
    Validation { field: String, reason: String },

    #[error("Could not load configuration: {message}")]
    #[diagnostic(
        code(cloudgate::config),
        help("Check the TOML syntax and CLOUDGATE_* variables.")
    )]
    Config { message: String },

    // ── Platform ─────────────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(cloudgate::auth_failed),
        help("Verify the access id and secret of your cloud project, and the endpoint's data center.")
    )]
    AuthFailed { message: String },

    #[error("Could not reach the platform at {url}")]
    #[diagnostic(
        code(cloudgate::connection_failed),
        help("Check the endpoint URL and your network connection.")
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: ApiError,
    },

    #[error("TLS setup failed: {message}")]
    #[diagnostic(code(cloudgate::tls_error), help("Check `ca_cert` in the config file."))]
    TlsError { message: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(cloudgate::timeout),
        help("Increase `timeout` in the config file or check platform responsiveness.")
    )]
    Timeout { seconds: u64 },

    #[error("Platform rejected the request (HTTP {status}): {message}")]
    #[diagnostic(code(cloudgate::remote))]
    Remote { status: u16, message: String },

    #[error("Unexpected response from the platform: {message}")]
    #[diagnostic(code(cloudgate::invalid_response))]
    InvalidResponse { message: String },

    // ── Server ───────────────────────────────────────────────────────

    #[error("Could not listen on {addr}")]
    #[diagnostic(
        code(cloudgate::bind),
        help("Is another process using the port? Pick one with --listen.")
    )]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(cloudgate::json), help("Check the JSON body and try again."))]
    Json(#[from] serde_json::Error),

    #[error("Could not render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AppError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoCredentials { .. } | Self::AuthFailed { .. } => exit_code::AUTH,
            Self::Validation { .. } | Self::Json(_) => exit_code::USAGE,
            Self::ConnectionFailed { .. } | Self::TlsError { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Remote { .. } | Self::InvalidResponse { .. } => exit_code::REMOTE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → AppError ───────────────────────────────────────────

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Missing { field, hint } => Self::NoCredentials { field, hint },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config {
                message: other.to_string(),
            },
        }
    }
}

// ── ApiError → AppError ──────────────────────────────────────────────

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        let origin = match &err {
            ApiError::Connectivity(e) => e.url().map(|u| u.origin().ascii_serialization()),
            _ => None,
        };

        match err {
            ApiError::Authentication { message } | ApiError::InvalidCredential(message) => {
                Self::AuthFailed { message }
            }
            ApiError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            ApiError::Tls(message) => Self::TlsError { message },
            ApiError::Remote {
                status,
                code,
                message,
            } => Self::Remote {
                status,
                message: match code {
                    Some(code) => format!("{message} (code {code})"),
                    None => message,
                },
            },
            ApiError::Deserialization { message, .. } => Self::InvalidResponse { message },
            ApiError::InvalidUrl(e) => Self::Validation {
                field: "url".into(),
                reason: e.to_string(),
            },
            err @ ApiError::Connectivity(_) => Self::ConnectionFailed {
                url: origin.unwrap_or_else(|| "(unknown)".to_owned()),
                source: err,
            },
        }
    }
}
