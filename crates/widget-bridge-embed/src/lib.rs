//! Host side of the widget sandbox bridge.
//!
//! [`EmbedController`] stores a widget through a [`WidgetStore`], mounts the
//! sandboxed frame, and answers the frame's protocol messages.

pub mod controller;
pub mod store_client;
pub mod view;

pub use controller::{
    DisplayModeDecision, DisplayModePolicy, EmbedController, EmbedPhase, HostWindow, TracingHostWindow,
};
pub use store_client::{CacheWidgetStore, HttpWidgetStore, WidgetStore};
pub use view::{EmbedView, FRAME_SANDBOX, FrameView};
