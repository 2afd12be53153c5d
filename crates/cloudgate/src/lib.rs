// cloudgate: HTTP surface of the device gateway
//
// The binary (`main.rs`) handles CLI parsing and startup; this library
// half holds the axum router so it can be driven from tests.

pub mod server;

pub use server::{router, serve};
