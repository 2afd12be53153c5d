//! axum routes of the device gateway facade.
//!
//! Every handler is a thin adapter: pull the inputs out of the request,
//! call the matching [`DeviceGateway`] operation, and turn the result into
//! JSON. Failures become `{"detail": "..."}` with the status the gateway
//! error maps to.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{
        Path, Query, Request, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{
        HeaderValue, StatusCode,
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{
    Span, debug_span, error,
    field::{Empty, display},
    info, instrument, warn,
};

use cloudgate_core::{
    CloudApi, CommandsRequest, DeviceGateway, DevicesResponse, Envelope, GatewayConfig, GatewayError,
    Health,
};

type SharedGateway<A> = Arc<DeviceGateway<A>>;

/// Query parameter consumed by the facade itself; everything else is
/// forwarded to the platform.
const IDS_PARAM: &str = "ids";

/// Build the facade router around a shared gateway.
///
/// With `api_token` set, every `/devices` route requires
/// `Authorization: Bearer <token>`; `/health` stays open.
pub fn router<A>(gateway: SharedGateway<A>, api_token: Option<SecretString>) -> Router
where
    A: CloudApi + 'static,
{
    let api_span = Span::current();

    let devices = Router::new()
        .route("/devices", get(list_devices::<A>))
        .route("/devices/commands", post(send_commands::<A>))
        .route("/devices/logs", get(get_logs::<A>))
        .route("/devices/{id}", get(get_device::<A>));

    let devices = match api_token {
        Some(token) => {
            devices.route_layer(middleware::from_fn_with_state(Arc::new(token), require_token))
        }
        None => devices,
    };

    Router::new()
        .route("/health", get(health))
        .merge(devices)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &Request| {
                    debug_span!(parent: &api_span, "request",
                        method = %request.method(),
                        uri = %request.uri().path(),
                        status = Empty,
                    )
                })
                .on_response(|response: &Response, latency: Duration, span: &Span| {
                    span.record("status", display(response.status()));
                    tracing::debug!(parent: span, latency_ms = latency.as_millis(), "done");
                }),
        )
        .with_state(gateway)
}

/// Serve the facade on `listener` until `shutdown` resolves.
#[instrument(name = "api", skip_all)]
pub async fn serve<A, S>(
    listener: TcpListener,
    gateway: SharedGateway<A>,
    api_token: Option<SecretString>,
    shutdown: S,
) -> std::io::Result<()>
where
    A: CloudApi + 'static,
    S: Future<Output = ()> + Send + 'static,
{
    let app = router(gateway, api_token);
    info!(addr = %listener.local_addr()?, "ready");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

// ── Error responses ──────────────────────────────────────────────────

/// A gateway failure on its way out as an HTTP response.
struct ApiError {
    error: GatewayError,
    redact: bool,
}

impl ApiError {
    fn new(error: GatewayError, config: &GatewayConfig) -> Self {
        Self {
            error,
            redact: config.redact_internal_errors,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(status = status.as_u16(), error = ?self.error, "request failed");
        }

        detail_response(status, self.error.detail(self.redact))
    }
}

fn detail_response(status: StatusCode, detail: String) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

async fn require_token(
    State(expected): State<Arc<SecretString>>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if presented == Some(expected.expose_secret()) {
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "rejected request without valid bearer token");
    let mut response = detail_response(StatusCode::UNAUTHORIZED, "Not authenticated".into());
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

/// Split the `ids` parameter from the ones to forward. A repeated `ids`
/// keeps its last value.
fn split_ids(params: Vec<(String, String)>) -> (Option<String>, Vec<(String, String)>) {
    let mut ids = None;
    let mut rest = Vec::with_capacity(params.len());
    for (key, value) in params {
        if key == IDS_PARAM {
            ids = Some(value);
        } else {
            rest.push((key, value));
        }
    }
    (ids, rest)
}

// ── Handlers ─────────────────────────────────────────────────────────

/// `GET /health`
async fn health() -> Json<Health> {
    Json(Health::ok())
}

/// `GET /devices[?ids=a,b]`
async fn list_devices<A: CloudApi>(
    State(gateway): State<SharedGateway<A>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<DevicesResponse>, ApiError> {
    let (ids, query) = split_ids(params);
    gateway
        .list_devices(ids.as_deref(), &query)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(e, gateway.config()))
}

/// `GET /devices/{id}`
async fn get_device<A: CloudApi>(
    State(gateway): State<SharedGateway<A>>,
    device_id: Result<Path<String>, PathRejection>,
) -> Result<Json<Value>, Response> {
    let Path(device_id) =
        device_id.map_err(|rejection| detail_response(rejection.status(), rejection.body_text()))?;

    gateway
        .get_device(&device_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(e, gateway.config()).into_response())
}

/// `POST /devices/commands`
async fn send_commands<A: CloudApi>(
    State(gateway): State<SharedGateway<A>>,
    body: Result<Json<CommandsRequest>, JsonRejection>,
) -> Result<Json<Envelope>, Response> {
    let Json(request) = body.map_err(|rejection| {
        detail_response(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text())
    })?;

    gateway
        .send_commands(&request)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(e, gateway.config()).into_response())
}

/// `GET /devices/logs?ids=a,b[&start_time=..]`
async fn get_logs<A: CloudApi>(
    State(gateway): State<SharedGateway<A>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Envelope>, ApiError> {
    let (ids, query) = split_ids(params);
    gateway
        .get_logs(ids.as_deref(), &query)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(e, gateway.config()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_owned(), v.to_owned())
    }

    #[test]
    fn split_ids_separates_forwarded_params() {
        let (ids, rest) = split_ids(vec![
            pair("start_time", "1"),
            pair("ids", "a,b"),
            pair("size", "20"),
        ]);
        assert_eq!(ids.as_deref(), Some("a,b"));
        assert_eq!(rest, vec![pair("start_time", "1"), pair("size", "20")]);
    }

    #[test]
    fn split_ids_last_value_wins() {
        let (ids, rest) = split_ids(vec![pair("ids", "a"), pair("ids", "b")]);
        assert_eq!(ids.as_deref(), Some("b"));
        assert!(rest.is_empty());
    }

    #[test]
    fn split_ids_absent() {
        let (ids, rest) = split_ids(vec![pair("page_no", "2")]);
        assert!(ids.is_none());
        assert_eq!(rest.len(), 1);
    }
}
