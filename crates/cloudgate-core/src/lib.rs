// cloudgate-core: device gateway facade over a `CloudApi` adapter

pub mod config;
pub mod error;
pub mod gateway;
pub mod model;

pub use config::{AggregationMode, GatewayConfig};
pub use error::GatewayError;
pub use gateway::DeviceGateway;
pub use model::{
    Command, CommandsRequest, DeviceFailure, DeviceId, DeviceOutcome, DevicesResponse, Envelope,
    Health, parse_ids,
};

pub use cloudgate_api::CloudApi;
