// cloudgate-api: Async client for Tuya-style cloud IoT OpenAPI platforms

pub mod auth;
pub mod client;
pub mod cloud;
pub mod error;
pub mod session;
pub mod sign;
pub mod transport;

pub use auth::{Credentials, TokenInfo};
pub use client::OpenApiClient;
pub use cloud::CloudApi;
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
