// Session lifecycle
//
// Token grant, proactive refresh, and invalidation. The token mutex is
// held across grant/refresh so concurrent callers wait for one request
// instead of racing several.

use chrono::{DateTime, Utc};
use reqwest::Method;
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::{TokenGrant, TokenInfo};
use crate::client::OpenApiClient;
use crate::error::Error;

pub const TOKEN_PATH: &str = "/v1.0/token";

impl OpenApiClient {
    /// Obtain a fresh access token, replacing any current one.
    ///
    /// Fails with [`Error::Authentication`] if the platform rejects the
    /// credentials, or a connectivity error if it cannot be reached.
    pub async fn connect(&self) -> Result<(), Error> {
        let mut guard = self.token.lock().await;
        let token = self.grant().await?;
        *guard = Some(token);
        Ok(())
    }

    /// Forget the current token; the next call reconnects.
    pub async fn invalidate(&self) {
        *self.token.lock().await = None;
    }

    /// A token valid for at least the refresh margin, connecting or
    /// refreshing as needed.
    pub(crate) async fn access_token(&self) -> Result<String, Error> {
        let mut guard = self.token.lock().await;

        let current = guard.take();
        let token = match current {
            Some(token) if !token.needs_refresh(Utc::now()) => token,
            Some(stale) => match self.refresh(&stale).await {
                Ok(token) => token,
                Err(e) => {
                    warn!(error = %e, "token refresh failed; requesting a new grant");
                    self.grant().await?
                }
            },
            None => {
                debug!("no session yet; connecting on demand");
                self.grant().await?
            }
        };

        let access = token.access_token.expose_secret().to_owned();
        *guard = Some(token);
        Ok(access)
    }

    async fn grant(&self) -> Result<TokenInfo, Error> {
        let query = [("grant_type".to_owned(), "1".to_owned())];
        let value = self
            .send(Method::GET, TOKEN_PATH, &query, None, None)
            .await
            .map_err(into_auth_error)?;

        let token = parse_grant(&value)?;
        info!(uid = token.uid.as_deref().unwrap_or("-"), "session established");
        Ok(token)
    }

    async fn refresh(&self, stale: &TokenInfo) -> Result<TokenInfo, Error> {
        let path = format!("{TOKEN_PATH}/{}", stale.refresh_token.expose_secret());
        let value = self
            .send(Method::GET, &path, &[], None, None)
            .await
            .map_err(into_auth_error)?;

        let token = parse_grant(&value)?;
        debug!("access token refreshed");
        Ok(token)
    }
}

/// Platform rejections of a token request are authentication failures;
/// transport failures stay what they are.
fn into_auth_error(err: Error) -> Error {
    match err {
        Error::Remote { message, code, .. } => Error::Authentication {
            message: match code {
                Some(code) => format!("{message} (code {code})"),
                None => message,
            },
        },
        other => other,
    }
}

fn parse_grant(value: &Value) -> Result<TokenInfo, Error> {
    let result = value.get("result").cloned().ok_or_else(|| Error::Authentication {
        message: "token response carries no result".into(),
    })?;

    let grant: TokenGrant = serde_json::from_value(result).map_err(|e| Error::Deserialization {
        message: format!("malformed token result: {e}"),
        body: value.to_string(),
    })?;

    let issued_at = value
        .get("t")
        .and_then(Value::as_i64)
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now);

    Ok(TokenInfo::from_grant(grant, issued_at))
}
