#![allow(clippy::unwrap_used)]
// Behavioural tests for `DeviceGateway` against a scripted in-memory cloud.

use std::collections::HashMap;
use std::sync::Mutex;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use cloudgate_api::{CloudApi, Error as ApiError};
use cloudgate_core::{
    AggregationMode, CommandsRequest, DeviceGateway, DeviceOutcome, DevicesResponse, Envelope,
    GatewayConfig, GatewayError,
};

// ── Fake cloud ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Connect,
    Get(String, Vec<(String, String)>),
    Post(String, Value),
}

/// Answers by path. Unknown paths fail with HTTP 404.
#[derive(Default)]
struct FakeCloud {
    answers: HashMap<String, Result<Value, u16>>,
    connect_fails: bool,
    calls: Mutex<Vec<Call>>,
}

impl FakeCloud {
    fn answer(mut self, path: &str, value: Value) -> Self {
        self.answers.insert(path.to_owned(), Ok(value));
        self
    }

    fn fail(mut self, path: &str, status: u16) -> Self {
        self.answers.insert(path.to_owned(), Err(status));
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn respond(&self, path: &str) -> Result<Value, ApiError> {
        match self.answers.get(path) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(status)) => Err(ApiError::Remote {
                status: *status,
                code: None,
                message: format!("upstream failure for {path}"),
            }),
            None => Err(ApiError::Remote {
                status: 404,
                code: None,
                message: "not found".into(),
            }),
        }
    }
}

impl CloudApi for FakeCloud {
    async fn connect(&self) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(Call::Connect);
        if self.connect_fails {
            return Err(ApiError::Authentication {
                message: "bad credentials".into(),
            });
        }
        Ok(())
    }

    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value, ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Get(path.to_owned(), query.to_vec()));
        self.respond(path)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Post(path.to_owned(), body.clone()));
        self.respond(path)
    }
}

fn strict(cloud: FakeCloud) -> DeviceGateway<FakeCloud> {
    DeviceGateway::new(cloud, GatewayConfig::default())
}

fn per_device(cloud: FakeCloud) -> DeviceGateway<FakeCloud> {
    DeviceGateway::new(
        cloud,
        GatewayConfig {
            aggregation: AggregationMode::PerDevice,
            ..GatewayConfig::default()
        },
    )
}

fn commands_request(ids: &[&str]) -> CommandsRequest {
    serde_json::from_value(json!({
        "device_ids": ids,
        "commands": [{ "code": "switch", "value": true }]
    }))
    .unwrap()
}

// ── List / get devices ──────────────────────────────────────────────

#[tokio::test]
async fn list_with_ids_maps_each_trimmed_id() {
    let gateway = strict(
        FakeCloud::default()
            .answer("/v1.0/devices/a", json!({"id": "a"}))
            .answer("/v1.0/devices/b", json!({"id": "b"})),
    );

    let resp = gateway.list_devices(Some(" a, b ,"), &[]).await.unwrap();
    let DevicesResponse::Selected(envelope) = resp else {
        panic!("expected per-id mapping");
    };

    assert_eq!(envelope.keys(), vec!["a", "b"]);
    assert_eq!(
        serde_json::to_value(&envelope).unwrap(),
        json!({ "a": {"id": "a"}, "b": {"id": "b"} })
    );
}

#[tokio::test]
async fn list_with_duplicate_ids_collapses_keys() {
    let gateway = strict(FakeCloud::default().answer("/v1.0/devices/a", json!({"id": "a"})));

    let resp = gateway.list_devices(Some("a,a"), &[]).await.unwrap();
    let DevicesResponse::Selected(envelope) = resp else {
        panic!("expected per-id mapping");
    };

    assert_eq!(envelope.len(), 1);
    assert_eq!(gateway.api().calls().len(), 2);
}

#[tokio::test]
async fn list_without_ids_returns_listing_unmodified() {
    let listing = json!({
        "success": true,
        "result": { "list": [{"id": "x"}], "has_more": false },
        "t": 1
    });
    let gateway = strict(FakeCloud::default().answer("/v1.0/iot-03/devices", listing.clone()));

    let query = vec![("page_size".to_string(), "20".to_string())];
    let resp = gateway.list_devices(None, &query).await.unwrap();

    assert_eq!(resp, DevicesResponse::Listing(listing));
    assert_eq!(
        gateway.api().calls(),
        vec![Call::Get("/v1.0/iot-03/devices".into(), query)]
    );
}

#[tokio::test]
async fn blank_ids_fall_back_to_listing() {
    let gateway = strict(FakeCloud::default().answer("/v1.0/iot-03/devices", json!({"ok": 1})));

    let resp = gateway.list_devices(Some(" , "), &[]).await.unwrap();
    assert!(matches!(resp, DevicesResponse::Listing(_)));
}

#[tokio::test]
async fn empty_listing_is_upstream_unavailable() {
    let gateway = strict(FakeCloud::default().answer("/v1.0/iot-03/devices", Value::Null));

    let err = gateway.list_devices(None, &[]).await.unwrap_err();
    assert!(matches!(err, GatewayError::UpstreamUnavailable(_)), "got: {err:?}");
    assert_eq!(err.status_code(), 502);
}

#[tokio::test]
async fn listing_failure_is_internal_with_message() {
    let gateway = strict(FakeCloud::default().fail("/v1.0/iot-03/devices", 503));

    let err = gateway.list_devices(None, &[]).await.unwrap_err();
    assert_eq!(err.status_code(), 500);
    assert!(err.to_string().contains("upstream failure"), "got: {err}");
}

#[tokio::test]
async fn get_device_returns_detail() {
    let gateway = strict(FakeCloud::default().answer("/v1.0/devices/d1", json!({"id": "d1"})));

    let detail = gateway.get_device("d1").await.unwrap();
    assert_eq!(detail, json!({"id": "d1"}));
}

#[tokio::test]
async fn get_device_empty_is_upstream_unavailable() {
    let gateway = strict(FakeCloud::default().answer("/v1.0/devices/d1", Value::Null));

    let err = gateway.get_device("d1").await.unwrap_err();
    assert_eq!(err.status_code(), 502);
}

#[tokio::test]
async fn get_device_failure_is_internal() {
    let gateway = strict(FakeCloud::default());

    let err = gateway.get_device("nope").await.unwrap_err();
    assert_eq!(err.status_code(), 500);
}

#[tokio::test]
async fn get_device_dot_segment_is_bad_request() {
    let gateway = strict(FakeCloud::default().answer("/v1.0/devices/d1", json!({"id": "d1"})));

    for id in ["..", "."] {
        let err = gateway.get_device(id).await.unwrap_err();
        assert!(matches!(err, GatewayError::BadRequest(_)), "{id}: {err:?}");
    }
    assert!(gateway.api().calls().is_empty());
}

#[tokio::test]
async fn get_device_encodes_id_as_one_segment() {
    let gateway = strict(
        FakeCloud::default().answer("/v1.0/devices/a%2Fb%20c", json!({"id": "a/b c"})),
    );

    let detail = gateway.get_device("a/b c").await.unwrap();
    assert_eq!(detail, json!({"id": "a/b c"}));
}

// ── Logs ────────────────────────────────────────────────────────────

#[tokio::test]
async fn logs_without_ids_is_bad_request() {
    for ids in [None, Some(""), Some("  "), Some(" , ")] {
        let gateway = strict(FakeCloud::default());
        let err = gateway.get_logs(ids, &[]).await.unwrap_err();
        assert_eq!(err.status_code(), 400, "ids = {ids:?}");
        assert!(gateway.api().calls().is_empty());
    }
}

#[tokio::test]
async fn logs_forward_query_to_every_device() {
    let gateway = strict(
        FakeCloud::default()
            .answer("/v1.0/devices/a/logs", json!({"logs": []}))
            .answer("/v1.0/devices/b/logs", json!({"logs": [1]})),
    );
    let query = vec![("type".to_string(), "7".to_string())];

    let envelope = gateway.get_logs(Some("a,b"), &query).await.unwrap();

    assert_eq!(envelope.keys(), vec!["a", "b"]);
    let calls = gateway.api().calls();
    assert_eq!(calls.len(), 2);
    for call in calls {
        let Call::Get(_, q) = call else {
            panic!("expected GET");
        };
        assert_eq!(q, query);
    }
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn commands_issue_one_identical_write_per_device() {
    let gateway = strict(
        FakeCloud::default()
            .answer("/v1.0/devices/A/commands", json!({"result": true}))
            .answer("/v1.0/devices/B/commands", json!({"result": true})),
    );

    let envelope = gateway
        .send_commands(&commands_request(&["A", "B"]))
        .await
        .unwrap();
    assert_eq!(envelope.keys(), vec!["A", "B"]);

    let expected = json!({ "commands": [{ "code": "switch", "value": true }] });
    let mut paths = Vec::new();
    for call in gateway.api().calls() {
        let Call::Post(path, body) = call else {
            panic!("expected POST");
        };
        assert_eq!(body, expected);
        paths.push(path);
    }
    paths.sort();
    assert_eq!(
        paths,
        vec!["/v1.0/devices/A/commands", "/v1.0/devices/B/commands"]
    );
}

#[tokio::test]
async fn command_failure_discards_partial_results() {
    let gateway = strict(
        FakeCloud::default()
            .answer("/v1.0/devices/A/commands", json!({"result": true}))
            .fail("/v1.0/devices/B/commands", 500),
    );

    let err = gateway
        .send_commands(&commands_request(&["A", "B"]))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 500);
}

#[tokio::test]
async fn sequential_mode_preserves_request_order() {
    let gateway = DeviceGateway::new(
        FakeCloud::default()
            .answer("/v1.0/devices/C/commands", json!({}))
            .answer("/v1.0/devices/A/commands", json!({}))
            .answer("/v1.0/devices/B/commands", json!({})),
        GatewayConfig {
            max_concurrency: 1,
            ..GatewayConfig::default()
        },
    );

    gateway
        .send_commands(&commands_request(&["C", "A", "B"]))
        .await
        .unwrap();

    let paths: Vec<String> = gateway
        .api()
        .calls()
        .into_iter()
        .map(|call| match call {
            Call::Post(path, _) => path,
            other => panic!("unexpected call: {other:?}"),
        })
        .collect();
    assert_eq!(
        paths,
        vec![
            "/v1.0/devices/C/commands",
            "/v1.0/devices/A/commands",
            "/v1.0/devices/B/commands"
        ]
    );
}

// ── Per-device aggregation ──────────────────────────────────────────

#[tokio::test]
async fn per_device_mode_reports_each_outcome() {
    let gateway = per_device(
        FakeCloud::default()
            .answer("/v1.0/devices/A/commands", json!({"result": true}))
            .fail("/v1.0/devices/B/commands", 503),
    );

    let envelope = gateway
        .send_commands(&commands_request(&["A", "B"]))
        .await
        .unwrap();

    let Envelope::PerDevice(map) = envelope else {
        panic!("expected per-device envelope");
    };
    assert_eq!(map["A"], DeviceOutcome::Ok(json!({"result": true})));
    let DeviceOutcome::Error(failure) = &map["B"] else {
        panic!("expected failure for B");
    };
    assert_eq!(failure.status, 500);
    assert_eq!(failure.upstream_status, Some(503));
}

#[tokio::test]
async fn per_device_mode_can_redact_messages() {
    let gateway = DeviceGateway::new(
        FakeCloud::default(),
        GatewayConfig {
            aggregation: AggregationMode::PerDevice,
            redact_internal_errors: true,
            ..GatewayConfig::default()
        },
    );

    let envelope = gateway.get_logs(Some("x"), &[]).await.unwrap();
    let Envelope::PerDevice(map) = envelope else {
        panic!("expected per-device envelope");
    };
    let DeviceOutcome::Error(failure) = &map["x"] else {
        panic!("expected failure");
    };
    assert_eq!(failure.message, "internal error");
}

// ── Startup ─────────────────────────────────────────────────────────

#[tokio::test]
async fn bootstrap_swallows_connect_failure() {
    let cloud = FakeCloud {
        connect_fails: true,
        ..FakeCloud::default()
    }
    .answer("/v1.0/devices/d1", json!({"id": "d1"}));

    let gateway = DeviceGateway::bootstrap(cloud, GatewayConfig::default()).await;

    assert_eq!(gateway.api().calls(), vec![Call::Connect]);
    assert_eq!(gateway.get_device("d1").await.unwrap(), json!({"id": "d1"}));
}
