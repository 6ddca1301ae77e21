//! Frame side of the widget sandbox bridge.
//!
//! [`compose::compose_document`] turns a cached record into the HTML document
//! served to the sandboxed frame, with `assets/bridge.js` inlined in its head.
//! [`bridge::FrameBridge`] is the same frame-side protocol expressed natively,
//! used to drive the host controller from Rust.

pub mod bridge;
pub mod compose;
pub mod globals;

pub use bridge::{FrameBridge, PendingDisplayMode, WidgetStateUpdate};
pub use compose::{ComposeOptions, compose_document, escape_attr, escape_json_for_script};
pub use globals::WidgetGlobals;
