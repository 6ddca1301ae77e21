//! Message-posting handles for host and frame browsing contexts.
//!
//! A `WindowHandle` is the only way one side reaches the other: posting is
//! asynchronous and fire-and-forget, and every delivered message carries the
//! `WindowId` of its sender so receivers can filter by source.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::mpsc;

static NEXT_WINDOW_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a browsing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u64);

impl WindowId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        Self(NEXT_WINDOW_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// A delivered message.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub source: WindowId,
    pub data: Value,
}

/// Something messages can be posted to.
pub trait WindowHandle: Send + Sync {
    /// Identity of the window receiving the messages.
    fn id(&self) -> WindowId;

    /// Post `data` on behalf of `source`. Delivery is best-effort.
    fn post_message(&self, source: WindowId, data: Value);
}

/// In-process window backed by an unbounded channel. Send order is
/// preserved per channel.
#[derive(Debug, Clone)]
pub struct ChannelWindow {
    id: WindowId,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl ChannelWindow {
    /// Create a window and the receiver its owner drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: WindowId::next(),
                tx,
            },
            rx,
        )
    }
}

impl WindowHandle for ChannelWindow {
    fn id(&self) -> WindowId {
        self.id
    }

    fn post_message(&self, source: WindowId, data: Value) {
        if self.tx.send(Envelope { source, data }).is_err() {
            tracing::trace!(window = self.id.as_u64(), "Window closed, message dropped");
        }
    }
}
