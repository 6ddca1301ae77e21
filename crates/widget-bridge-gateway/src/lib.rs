//! HTTP surface of the widget sandbox bridge.
//!
//! Serves the store, render and telemetry endpoints over axum. The artifact
//! cache is injected through [`GatewayState`]; this crate never constructs one.

pub mod handlers;
pub mod headers;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod server;
pub mod state;

pub use server::{router, start_gateway};
pub use state::{GatewayState, StoreValidator};
