use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Error;

/// The capability the gateway needs from a cloud platform.
///
/// Implementations must be reentrant: one instance is shared by every
/// in-flight request, so `get`/`post` may run concurrently. Paths are
/// absolute platform paths (`/v1.0/devices/{id}`), already percent-encoded.
/// Responses are the decoded JSON body, unmodified; an empty body is
/// [`Value::Null`].
pub trait CloudApi: Send + Sync {
    /// Establish (or re-establish) the authenticated session.
    fn connect(&self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Authenticated read.
    fn get(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> impl Future<Output = Result<Value, Error>> + Send;

    /// Authenticated write with a JSON body.
    fn post(&self, path: &str, body: &Value) -> impl Future<Output = Result<Value, Error>> + Send;
}

impl<T: CloudApi> CloudApi for Arc<T> {
    fn connect(&self) -> impl Future<Output = Result<(), Error>> + Send {
        (**self).connect()
    }

    fn get(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> impl Future<Output = Result<Value, Error>> + Send {
        (**self).get(path, query)
    }

    fn post(&self, path: &str, body: &Value) -> impl Future<Output = Result<Value, Error>> + Send {
        (**self).post(path, body)
    }
}
