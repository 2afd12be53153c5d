// OpenAPI request signing (HMAC-SHA256, "new" signature algorithm).
//
//   string_to_sign = METHOD \n hex(sha256(body)) \n <signed headers: none> \n url
//   sign           = HEX_UPPER(HMAC-SHA256(secret, access_id + access_token + t + string_to_sign))
//
// `url` is the request path plus the query string with keys sorted
// ascending. Token requests leave `access_token` empty.

use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::{Digest as _, Sha256};

use crate::auth::Credentials;
use crate::error::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGN_METHOD: &str = "HMAC-SHA256";

/// Lower-case hex SHA-256 of `data`.
pub fn sha256_hex_digest<D: AsRef<[u8]>>(data: D) -> String {
    let mut hasher = Sha256::default();
    hasher.update(data.as_ref());
    hex::encode(hasher.finalize())
}

/// The path-and-query component as it enters the signature.
pub fn canonical_url(path: &str, query: &[(String, String)]) -> String {
    if query.is_empty() {
        return path.to_owned();
    }

    let mut sorted: Vec<&(String, String)> = query.iter().collect();
    sorted.sort();
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{path}?{joined}")
}

pub fn string_to_sign(method: &str, body: &[u8], path: &str, query: &[(String, String)]) -> String {
    format!(
        "{method}\n{}\n\n{}",
        sha256_hex_digest(body),
        canonical_url(path, query)
    )
}

/// Compute the `sign` header for a request made at `t_millis`.
pub fn sign(
    credentials: &Credentials,
    access_token: Option<&str>,
    t_millis: i64,
    string_to_sign: &str,
) -> Result<String, Error> {
    let mut mac = HmacSha256::new_from_slice(credentials.access_secret.expose_secret().as_bytes())
        .map_err(|e| Error::InvalidCredential(format!("unusable access secret: {e}")))?;

    mac.update(credentials.access_id.as_bytes());
    mac.update(access_token.unwrap_or_default().as_bytes());
    mac.update(t_millis.to_string().as_bytes());
    mac.update(string_to_sign.as_bytes());

    Ok(hex::encode_upper(mac.finalize().into_bytes()))
}
