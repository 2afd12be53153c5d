// ── Device gateway ──
//
// Stateless orchestration over one shared `CloudApi` session. Each
// operation turns into one or more adapter calls; multi-device calls fan
// out with bounded concurrency and are folded per `AggregationMode`.

use std::future::Future;
use std::pin::pin;

use futures_util::{StreamExt, stream};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use cloudgate_api::{CloudApi, Error as ApiError};

use crate::config::{AggregationMode, GatewayConfig};
use crate::error::{GatewayError, REDACTED_DETAIL};
use crate::model::{
    CommandsRequest, DeviceFailure, DeviceId, DeviceOutcome, DevicesResponse, Envelope, parse_ids,
};

/// Platform-wide device listing.
pub const DEVICE_LISTING_PATH: &str = "/v1.0/iot-03/devices";

/// The device-control facade.
///
/// Holds no mutable state of its own; safe to share across requests as
/// long as `A` is (which [`CloudApi`] requires).
pub struct DeviceGateway<A> {
    api: A,
    config: GatewayConfig,
}

impl<A: CloudApi> DeviceGateway<A> {
    pub fn new(api: A, config: GatewayConfig) -> Self {
        Self { api, config }
    }

    /// Build the gateway and try to authenticate up front.
    ///
    /// A failed connect does not prevent startup: the session stays
    /// unauthenticated and the adapter connects on the first real call,
    /// which is where the error then surfaces.
    pub async fn bootstrap(api: A, config: GatewayConfig) -> Self {
        match api.connect().await {
            Ok(()) => info!("cloud session established at startup"),
            Err(e) => warn!(error = %e, "startup connect failed; will connect on first use"),
        }
        Self::new(api, config)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    // ── Operations ───────────────────────────────────────────────────

    /// `ids` given: details per id. Otherwise the platform listing,
    /// forwarded `query` included, returned as-is.
    pub async fn list_devices(
        &self,
        ids: Option<&str>,
        query: &[(String, String)],
    ) -> Result<DevicesResponse, GatewayError> {
        let ids = ids.map(parse_ids).unwrap_or_default();

        if !ids.is_empty() {
            let api = &self.api;
            let envelope = self
                .fan_out(ids, |id| async move {
                    let result = api.get(&id.platform_path(&[]), &[]).await;
                    (id, result)
                })
                .await?;
            return Ok(DevicesResponse::Selected(envelope));
        }

        let listing = self.api.get(DEVICE_LISTING_PATH, query).await?;
        if listing.is_null() {
            return Err(GatewayError::no_response());
        }
        Ok(DevicesResponse::Listing(listing))
    }

    /// Details of one device.
    pub async fn get_device(&self, device_id: &str) -> Result<Value, GatewayError> {
        let id = DeviceId::parse(device_id)
            .ok_or_else(|| GatewayError::BadRequest(format!("Invalid device id `{device_id}`")))?;

        let detail = self.api.get(&id.platform_path(&[]), &[]).await?;
        if detail.is_null() {
            return Err(GatewayError::no_response());
        }
        Ok(detail)
    }

    /// Send the same ordered command list to every listed device.
    pub async fn send_commands(&self, request: &CommandsRequest) -> Result<Envelope, GatewayError> {
        let payload = request.payload();
        let targets = request.targets();
        debug!(
            devices = targets.len(),
            commands = request.commands.len(),
            "sending commands"
        );

        let (api, payload) = (&self.api, &payload);
        self.fan_out(targets, |id| async move {
            let result = api.post(&id.platform_path(&["commands"]), payload).await;
            (id, result)
        })
        .await
    }

    /// Logs per device. `ids` is required; `query` (time window, event
    /// types, page size) is forwarded to every call.
    pub async fn get_logs(
        &self,
        ids: Option<&str>,
        query: &[(String, String)],
    ) -> Result<Envelope, GatewayError> {
        let ids = ids.map(parse_ids).unwrap_or_default();
        if ids.is_empty() {
            return Err(GatewayError::BadRequest(
                "Query parameter `ids` is required".into(),
            ));
        }

        let api = &self.api;
        self.fan_out(ids, |id| async move {
            let result = api.get(&id.platform_path(&["logs"]), query).await;
            (id, result)
        })
        .await
    }

    // ── Fan-out ──────────────────────────────────────────────────────

    /// Run `call` for every id, at most `max_concurrency` at a time, and
    /// fold the results in request order.
    ///
    /// Strict mode returns on the first failure; outstanding calls are
    /// dropped and nothing gathered so far is exposed.
    async fn fan_out<F, Fut>(&self, ids: Vec<DeviceId>, call: F) -> Result<Envelope, GatewayError>
    where
        F: Fn(DeviceId) -> Fut,
        Fut: Future<Output = (DeviceId, Result<Value, ApiError>)>,
    {
        let limit = self.config.max_concurrency.max(1);
        // Futures are lazy; nothing runs until `buffered` polls them.
        let calls: Vec<Fut> = ids.into_iter().map(call).collect();
        let mut results = pin!(stream::iter(calls).buffered(limit));

        match self.config.aggregation {
            AggregationMode::Strict => {
                let mut envelope = IndexMap::new();
                while let Some((id, result)) = results.next().await {
                    match result {
                        Ok(value) => {
                            envelope.insert(id.to_string(), value);
                        }
                        Err(e) => {
                            warn!(device = %id, error = %e, "device call failed; aborting request");
                            return Err(e.into());
                        }
                    }
                }
                Ok(Envelope::Strict(envelope))
            }
            AggregationMode::PerDevice => {
                let mut envelope = IndexMap::new();
                while let Some((id, result)) = results.next().await {
                    let outcome = match result {
                        Ok(value) => DeviceOutcome::Ok(value),
                        Err(e) => {
                            warn!(device = %id, error = %e, "device call failed");
                            DeviceOutcome::Error(self.failure(&e))
                        }
                    };
                    envelope.insert(id.to_string(), outcome);
                }
                Ok(Envelope::PerDevice(envelope))
            }
        }
    }

    fn failure(&self, err: &ApiError) -> DeviceFailure {
        let code = match err {
            ApiError::Remote { code, .. } => *code,
            _ => None,
        };
        DeviceFailure {
            status: 500,
            upstream_status: err.remote_status(),
            code,
            message: if self.config.redact_internal_errors {
                REDACTED_DETAIL.to_owned()
            } else {
                err.to_string()
            },
        }
    }
}
