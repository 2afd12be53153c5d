// OpenAPI HTTP client
//
// Wraps `reqwest::Client` with request signing, token injection, and
// envelope inspection. Session management (token grant, refresh,
// invalidation) lives in `session.rs` as further inherent methods.

use chrono::Utc;
use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};
use url::Url;

use crate::auth::{Credentials, TokenInfo};
use crate::cloud::CloudApi;
use crate::error::{Error, TOKEN_INVALID_CODE};
use crate::sign;
use crate::transport::TransportConfig;

const DEFAULT_LANG: &str = "en";

/// Async client for a Tuya-style cloud OpenAPI.
///
/// Holds the single long-lived session of the process. Cheap to share
/// behind an `Arc`; all methods take `&self` and are safe to call
/// concurrently. Token acquisition is serialized, requests are not.
pub struct OpenApiClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    lang: String,
    timeout_secs: u64,
    pub(crate) token: Mutex<Option<TokenInfo>>,
}

impl OpenApiClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build a client for `base_url` (e.g. `https://openapi.tuyaus.com`).
    ///
    /// Does NOT connect; call [`connect()`](Self::connect) or let the first
    /// request connect on demand.
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let mut client = Self::with_client(http, Self::normalize_base_url(base_url)?, credentials);
        client.timeout_secs = transport.timeout_secs();
        Ok(client)
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, credentials: Credentials) -> Self {
        Self {
            http,
            base_url,
            credentials,
            lang: DEFAULT_LANG.to_owned(),
            timeout_secs: 0,
            token: Mutex::new(None),
        }
    }

    /// Override the `lang` header (platform message language).
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&path);
        Ok(url)
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// The platform endpoint.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The access id this client signs with.
    pub fn access_id(&self) -> &str {
        &self.credentials.access_id
    }

    /// Whether a token is currently held. `false` until the first
    /// successful connect, and again after the platform revokes it.
    pub async fn is_connected(&self) -> bool {
        self.token.lock().await.is_some()
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// `{base}{path}` with `query` appended. `path` must start with `/`.
    fn url(&self, path: &str, query: &[(String, String)]) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}{path}"))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send one signed request and inspect the response.
    ///
    /// `token` is `None` only for token grant/refresh calls.
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Value, Error> {
        let url = self.url(path, query)?;
        let body = match body {
            Some(value) => serde_json::to_vec(value).map_err(|e| Error::Deserialization {
                message: format!("failed to encode request body: {e}"),
                body: String::new(),
            })?,
            None => Vec::new(),
        };

        let t = Utc::now().timestamp_millis();
        let to_sign = sign::string_to_sign(method.as_str(), &body, url.path(), query);
        let signature = sign::sign(&self.credentials, token, t, &to_sign)?;

        debug!("{method} {}", url.path());
        trace!(string_to_sign = %to_sign, "signed request");

        let mut req = self
            .http
            .request(method, url)
            .header("client_id", &self.credentials.access_id)
            .header("sign", signature)
            .header("sign_method", sign::SIGN_METHOD)
            .header("t", t.to_string())
            .header("lang", &self.lang);

        if let Some(token) = token {
            req = req.header("access_token", token);
        }
        if !body.is_empty() {
            req = req.header(CONTENT_TYPE, "application/json").body(body);
        }

        let resp = req.send().await.map_err(|e| self.transport_error(e))?;
        self.handle_response(resp).await
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            Error::Connectivity(err)
        }
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response(&self, resp: reqwest::Response) -> Result<Value, Error> {
        let status = resp.status();
        let raw = resp.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let message = if raw.is_empty() {
                status.to_string()
            } else {
                raw
            };
            return Err(Error::Remote {
                status: status.as_u16(),
                code: None,
                message,
            });
        }

        if raw.trim().is_empty() {
            return Ok(Value::Null);
        }

        let value: Value = serde_json::from_str(&raw).map_err(|e| {
            let preview: String = raw.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: raw.clone(),
            }
        })?;

        if value.get("success").and_then(Value::as_bool) == Some(false) {
            let code = value.get("code").and_then(Value::as_i64);
            let message = value
                .get("msg")
                .and_then(Value::as_str)
                .map_or_else(|| "request rejected by platform".to_owned(), str::to_owned);
            return Err(Error::Remote {
                status: status.as_u16(),
                code,
                message,
            });
        }

        Ok(value)
    }

    /// One authenticated call: ensure a token, send, drop the token if the
    /// platform says it is no longer valid. Never retried.
    async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value, Error> {
        let token = self.access_token().await?;
        let result = self.send(method, path, query, body, Some(&token)).await;

        if let Err(ref err) = result {
            if matches!(err, Error::Remote { code: Some(TOKEN_INVALID_CODE), .. }) {
                warn!("access token rejected by platform; session invalidated");
                self.invalidate().await;
            }
        }
        result
    }
}

impl CloudApi for OpenApiClient {
    async fn connect(&self) -> Result<(), Error> {
        OpenApiClient::connect(self).await
    }

    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value, Error> {
        self.call(Method::GET, path, query, None).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, Error> {
        self.call(Method::POST, path, &[], Some(body)).await
    }
}
