//! Core types, config, errors, and wire protocol for the widget sandbox bridge.

pub mod cache;
pub mod config;
pub mod error;
pub mod protocol;
pub mod record;
pub mod telemetry;
pub mod window;
