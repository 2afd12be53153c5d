// ── Runtime gateway configuration ──
//
// How the facade aggregates multi-device calls. Built by the binary from
// `cloudgate-config`; core never reads config files.

use serde::{Deserialize, Serialize};

/// How multi-device operations report failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationMode {
    /// All-or-nothing: the first failing device aborts the whole call and
    /// no partial mapping is returned.
    #[default]
    Strict,
    /// Every device gets an entry tagged `ok` or `error`; the call itself
    /// succeeds.
    PerDevice,
}

/// Facade tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub aggregation: AggregationMode,
    /// Upper bound on concurrent upstream calls within one request.
    /// `1` issues them one after another.
    pub max_concurrency: usize,
    /// Replace internal error details with a generic message in responses.
    pub redact_internal_errors: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            aggregation: AggregationMode::Strict,
            max_concurrency: 8,
            redact_internal_errors: false,
        }
    }
}
