// ── Domain types ──
//
// Device identifiers, commands, and the envelopes returned by
// multi-device operations.

use std::fmt;

use indexmap::IndexMap;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── DeviceId ─────────────────────────────────────────────────────────

/// Bytes escaped inside one path segment (the WHATWG path-segment set).
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Opaque identifier of a cloud-registered device. Never blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Trim and accept any non-empty identifier. `.` and `..` are refused:
    /// URL normalisation would resolve them (encoded or not) out of the
    /// device path.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!matches!(trimmed, "" | "." | "..")).then(|| Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `/v1.0/devices/{id}[/tail...]`, with the id encoded as one segment.
    pub fn platform_path(&self, tail: &[&str]) -> String {
        let mut path = format!("/v1.0/devices/{}", utf8_percent_encode(&self.0, SEGMENT));
        for segment in tail {
            path.push('/');
            path.extend(utf8_percent_encode(segment, SEGMENT));
        }
        path
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split a comma-separated id list, trimming entries and dropping blanks.
/// Duplicates are kept in the order given.
pub fn parse_ids(raw: &str) -> Vec<DeviceId> {
    raw.split(',').filter_map(DeviceId::parse).collect()
}

// ── Commands ─────────────────────────────────────────────────────────

/// A single instruction for a device. `value` is forwarded untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub code: String,
    pub value: Value,
}

/// Body of `POST /devices/commands`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandsRequest {
    pub device_ids: Vec<String>,
    pub commands: Vec<Command>,
}

impl CommandsRequest {
    /// Payload sent to every target device.
    pub fn payload(&self) -> Value {
        serde_json::json!({ "commands": self.commands })
    }

    /// Target identifiers, trimmed, blanks dropped.
    pub fn targets(&self) -> Vec<DeviceId> {
        self.device_ids
            .iter()
            .filter_map(|raw| DeviceId::parse(raw))
            .collect()
    }
}

// ── Envelopes ────────────────────────────────────────────────────────

/// Failure of one device in per-device aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceFailure {
    /// Status the facade would have answered with for this failure alone.
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    pub message: String,
}

/// Result of one device in per-device aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOutcome {
    Ok(Value),
    Error(DeviceFailure),
}

/// Mapping from device id to that device's response, in request order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    /// Every device succeeded; raw platform responses.
    Strict(IndexMap<String, Value>),
    /// Each device tagged with its own outcome.
    PerDevice(IndexMap<String, DeviceOutcome>),
}

impl Envelope {
    pub fn len(&self) -> usize {
        match self {
            Self::Strict(map) => map.len(),
            Self::PerDevice(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<&str> {
        match self {
            Self::Strict(map) => map.keys().map(String::as_str).collect(),
            Self::PerDevice(map) => map.keys().map(String::as_str).collect(),
        }
    }
}

/// Answer of `GET /devices`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DevicesResponse {
    /// Unfiltered platform listing, unmodified.
    Listing(Value),
    /// Per-id details.
    Selected(Envelope),
}

/// Answer of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: &'static str,
}

impl Health {
    pub fn ok() -> Self {
        Self { status: "ok" }
    }
}
