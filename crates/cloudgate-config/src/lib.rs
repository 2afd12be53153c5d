//! Configuration for the cloudgate binary.
//!
//! Layered loading (defaults, TOML file, environment), credential
//! resolution, and translation to the runtime types of `cloudgate-api`
//! and `cloudgate-core`. The endpoint has a default; the credential pair
//! never does, and loading fails fast without it.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use cloudgate_api::{Credentials, TlsMode, TransportConfig};
use cloudgate_core::{AggregationMode, GatewayConfig};

/// Prefix of the native environment variables (`CLOUDGATE_ACCESS_ID`, ...).
pub const ENV_PREFIX: &str = "CLOUDGATE_";

/// Variables understood for compatibility with existing deployments.
pub const LEGACY_ENDPOINT_VAR: &str = "TUYA_API_ENDPOINT";
pub const LEGACY_ACCESS_ID_VAR: &str = "TUYA_ACCESS_ID";
pub const LEGACY_ACCESS_KEY_VAR: &str = "TUYA_ACCESS_KEY";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("missing {field}: set {hint}")]
    Missing { field: String, hint: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config struct ──────────────────────────────────────────────

/// Everything the binary can be configured with.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Cloud OpenAPI endpoint (data-center specific).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Project access id.
    pub access_id: Option<String>,

    /// Project access secret (plaintext, prefer `access_key_env` or the
    /// environment).
    pub access_key: Option<String>,

    /// Name of an environment variable holding the access secret.
    pub access_key_env: Option<String>,

    /// HTTP listen address of the facade.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Upstream request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// `strict` (all-or-nothing) or `per-device`.
    #[serde(default)]
    pub aggregation: AggregationMode,

    /// Concurrent upstream calls per request.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Hide internal error details from HTTP responses.
    #[serde(default)]
    pub redact_internal_errors: bool,

    /// Language of platform messages.
    #[serde(default = "default_lang")]
    pub lang: String,

    /// Extra CA certificate to trust for the endpoint.
    pub ca_cert: Option<PathBuf>,

    /// Bearer token callers must present on `/devices` routes. Unset
    /// means the facade is open to anyone who can reach it.
    pub api_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            access_id: None,
            access_key: None,
            access_key_env: None,
            listen: default_listen(),
            timeout: default_timeout(),
            aggregation: AggregationMode::default(),
            max_concurrency: default_max_concurrency(),
            redact_internal_errors: false,
            lang: default_lang(),
            ca_cert: None,
            api_token: None,
        }
    }
}

fn default_endpoint() -> String {
    "https://openapi.tuyaus.com".into()
}
fn default_listen() -> String {
    "127.0.0.1:8000".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_max_concurrency() -> usize {
    8
}
fn default_lang() -> String {
    "en".into()
}

impl Config {
    /// Copy safe to print: secret material replaced.
    pub fn redacted(&self) -> Self {
        Self {
            access_key: self.access_key.as_ref().map(|_| "********".into()),
            api_token: self.api_token.as_ref().map(|_| "********".into()),
            ..self.clone()
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the default config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("rs", "cloudgate", "cloudgate").map_or_else(
        || PathBuf::from("cloudgate.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Keys holding opaque strings. figment parses environment values, so a
/// digit-only id or token would arrive as a number (without its leading
/// zeros); these are taken from the environment verbatim instead.
const STRING_KEYS: &[&str] = &["access_id", "access_key", "access_key_env", "api_token"];

/// Layering, lowest priority first: defaults, TOML file, `TUYA_*`
/// variables, `CLOUDGATE_*` variables.
pub fn layered(path: &Path) -> Figment {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(
            Env::prefixed("TUYA_")
                .only(&["api_endpoint"])
                .map(|key| {
                    if key.as_str() == "api_endpoint" {
                        "endpoint".into()
                    } else {
                        key.into()
                    }
                }),
        );
    let figment = verbatim(figment, &Env::prefixed("TUYA_").only(&["access_id", "access_key"]));
    let figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(STRING_KEYS));
    verbatim(figment, &Env::prefixed(ENV_PREFIX).only(STRING_KEYS))
}

fn verbatim(figment: Figment, env: &Env) -> Figment {
    env.iter().fold(figment, |figment, (key, value)| {
        figment.merge(Serialized::default(key.as_str(), value))
    })
}

/// Load the full Config from `path` (or the default path) + environment.
/// A missing file is not an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    let config: Config = layered(&path).extract()?;
    Ok(config)
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the access secret: `access_key_env` indirection first, then
/// the value from file/environment. There is no built-in fallback.
pub fn resolve_secret(config: &Config) -> Result<SecretString, ConfigError> {
    if let Some(ref env_name) = config.access_key_env {
        if let Ok(val) = std::env::var(env_name) {
            if !val.is_empty() {
                return Ok(SecretString::from(val));
            }
        }
    }

    match config.access_key {
        Some(ref key) if !key.is_empty() => Ok(SecretString::from(key.clone())),
        _ => Err(ConfigError::Missing {
            field: "access_key".into(),
            hint: format!("{ENV_PREFIX}ACCESS_KEY or {LEGACY_ACCESS_KEY_VAR}"),
        }),
    }
}

pub fn resolve_credentials(config: &Config) -> Result<Credentials, ConfigError> {
    let access_id = config
        .access_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ConfigError::Missing {
            field: "access_id".into(),
            hint: format!("{ENV_PREFIX}ACCESS_ID or {LEGACY_ACCESS_ID_VAR}"),
        })?;

    Ok(Credentials::new(access_id, resolve_secret(config)?))
}

// ── Runtime translation ─────────────────────────────────────────────

/// Validated settings for talking to the platform.
#[derive(Debug, Clone)]
pub struct CloudSettings {
    pub endpoint: Url,
    pub credentials: Credentials,
    pub transport: TransportConfig,
    pub lang: String,
}

/// Validated settings for serving the facade.
#[derive(Debug, Clone)]
pub struct ServeSettings {
    pub listen: SocketAddr,
    pub gateway: GatewayConfig,
    pub api_token: Option<SecretString>,
}

pub fn cloud_settings(config: &Config) -> Result<CloudSettings, ConfigError> {
    let endpoint: Url = config
        .endpoint
        .parse()
        .map_err(|e| ConfigError::Validation {
            field: "endpoint".into(),
            reason: format!("invalid URL '{}': {e}", config.endpoint),
        })?;

    if config.timeout == 0 {
        return Err(ConfigError::Validation {
            field: "timeout".into(),
            reason: "must be at least 1 second".into(),
        });
    }

    let tls = config
        .ca_cert
        .clone()
        .map_or(TlsMode::System, TlsMode::CustomCa);

    Ok(CloudSettings {
        endpoint,
        credentials: resolve_credentials(config)?,
        transport: TransportConfig {
            tls,
            timeout: Duration::from_secs(config.timeout),
        },
        lang: config.lang.clone(),
    })
}

pub fn serve_settings(config: &Config) -> Result<ServeSettings, ConfigError> {
    let listen: SocketAddr = config.listen.parse().map_err(|e| ConfigError::Validation {
        field: "listen".into(),
        reason: format!("invalid socket address '{}': {e}", config.listen),
    })?;

    if config.max_concurrency == 0 {
        return Err(ConfigError::Validation {
            field: "max_concurrency".into(),
            reason: "must be at least 1".into(),
        });
    }

    let api_token = match config.api_token.as_deref() {
        Some("") => {
            return Err(ConfigError::Validation {
                field: "api_token".into(),
                reason: "must not be empty when set".into(),
            });
        }
        other => other.map(|token| SecretString::from(token.to_owned())),
    };

    Ok(ServeSettings {
        listen,
        api_token,
        gateway: GatewayConfig {
            aggregation: config.aggregation,
            max_concurrency: config.max_concurrency,
            redact_internal_errors: config.redact_internal_errors,
        },
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn load(jail: &Jail) -> Result<Config, figment::Error> {
        let path = jail.directory().join("cloudgate.toml");
        load_config(Some(&path)).map_err(|e| e.to_string().into())
    }

    #[test]
    fn defaults_without_file() {
        Jail::expect_with(|jail| {
            let config = load(jail)?;
            assert_eq!(config.endpoint, "https://openapi.tuyaus.com");
            assert_eq!(config.listen, "127.0.0.1:8000");
            assert_eq!(config.timeout, 30);
            assert_eq!(config.aggregation, AggregationMode::Strict);
            assert!(config.access_id.is_none());
            assert!(config.access_key.is_none());
            Ok(())
        });
    }

    #[test]
    fn file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "cloudgate.toml",
                r#"
                    endpoint = "https://openapi.tuyaeu.com"
                    access_id = "file-id"
                    aggregation = "per-device"
                    max_concurrency = 2
                "#,
            )?;
            jail.set_env("CLOUDGATE_ACCESS_ID", "env-id");

            let config = load(jail)?;
            assert_eq!(config.endpoint, "https://openapi.tuyaeu.com");
            assert_eq!(config.access_id.as_deref(), Some("env-id"));
            assert_eq!(config.aggregation, AggregationMode::PerDevice);
            assert_eq!(config.max_concurrency, 2);
            Ok(())
        });
    }

    #[test]
    fn legacy_variables_are_honoured() {
        Jail::expect_with(|jail| {
            jail.set_env("TUYA_API_ENDPOINT", "https://openapi.tuyain.com");
            jail.set_env("TUYA_ACCESS_ID", "legacy-id");
            jail.set_env("TUYA_ACCESS_KEY", "legacy-secret");

            let config = load(jail)?;
            assert_eq!(config.endpoint, "https://openapi.tuyain.com");

            let creds = resolve_credentials(&config).map_err(|e| e.to_string())?;
            assert_eq!(creds.access_id, "legacy-id");
            assert_eq!(creds.access_secret.expose_secret(), "legacy-secret");
            Ok(())
        });
    }

    #[test]
    fn native_prefix_wins_over_legacy() {
        Jail::expect_with(|jail| {
            jail.set_env("TUYA_ACCESS_ID", "legacy-id");
            jail.set_env("CLOUDGATE_ACCESS_ID", "native-id");

            let config = load(jail)?;
            assert_eq!(config.access_id.as_deref(), Some("native-id"));
            Ok(())
        });
    }

    #[test]
    fn numeric_credentials_stay_strings() {
        Jail::expect_with(|jail| {
            jail.set_env("CLOUDGATE_ACCESS_ID", "1234567890");
            jail.set_env("TUYA_ACCESS_KEY", "0987654321");
            jail.set_env("CLOUDGATE_API_TOKEN", "42");
            jail.set_env("CLOUDGATE_MAX_CONCURRENCY", "3");

            let config = load(jail)?;
            assert_eq!(config.access_id.as_deref(), Some("1234567890"));
            assert_eq!(config.access_key.as_deref(), Some("0987654321"));
            assert_eq!(config.api_token.as_deref(), Some("42"));
            assert_eq!(config.max_concurrency, 3);

            let creds = resolve_credentials(&config).map_err(|e| e.to_string())?;
            assert_eq!(creds.access_id, "1234567890");
            assert_eq!(creds.access_secret.expose_secret(), "0987654321");
            Ok(())
        });
    }

    #[test]
    fn missing_secret_fails_fast() {
        let config = Config {
            access_id: Some("id".into()),
            ..Config::default()
        };
        let err = resolve_credentials(&config).unwrap_err();
        assert!(
            matches!(err, ConfigError::Missing { ref field, .. } if field == "access_key"),
            "got: {err:?}"
        );
    }

    #[test]
    fn missing_access_id_fails_fast() {
        let config = Config {
            access_key: Some("secret".into()),
            ..Config::default()
        };
        let err = resolve_credentials(&config).unwrap_err();
        assert!(
            matches!(err, ConfigError::Missing { ref field, .. } if field == "access_id"),
            "got: {err:?}"
        );
    }

    #[test]
    fn secret_env_indirection() {
        Jail::expect_with(|jail| {
            jail.set_env("MY_TUYA_SECRET", "indirect");
            let config = Config {
                access_key_env: Some("MY_TUYA_SECRET".into()),
                access_key: Some("plaintext".into()),
                ..Config::default()
            };
            let secret = resolve_secret(&config).map_err(|e| e.to_string())?;
            assert_eq!(secret.expose_secret(), "indirect");
            Ok(())
        });
    }

    #[test]
    fn invalid_values_are_rejected() {
        let base = Config {
            access_id: Some("id".into()),
            access_key: Some("secret".into()),
            ..Config::default()
        };

        let bad_url = Config {
            endpoint: "not a url".into(),
            ..base.clone()
        };
        assert!(matches!(
            cloud_settings(&bad_url),
            Err(ConfigError::Validation { .. })
        ));

        let bad_listen = Config {
            listen: "localhost".into(),
            ..base.clone()
        };
        assert!(matches!(
            serve_settings(&bad_listen),
            Err(ConfigError::Validation { .. })
        ));

        let zero = Config {
            max_concurrency: 0,
            ..base.clone()
        };
        assert!(matches!(
            serve_settings(&zero),
            Err(ConfigError::Validation { .. })
        ));

        let empty_token = Config {
            api_token: Some(String::new()),
            ..base
        };
        assert!(matches!(
            serve_settings(&empty_token),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn redacted_hides_secret() {
        let config = Config {
            access_key: Some("super-secret".into()),
            api_token: Some("caller-token".into()),
            ..Config::default()
        };
        let shown = config.redacted().to_toml().unwrap_or_default();
        assert!(!shown.contains("super-secret"));
        assert!(!shown.contains("caller-token"));
        assert!(shown.contains("********"));
    }
}
