//! Native frame-side protocol.
//!
//! `FrameBridge` mirrors what the injected script does inside a real frame:
//! it owns the globals snapshot, correlates display-mode requests with the
//! host's results by `requestId`, and forwards its logger's output to the host
//! as `widget-debug` telemetry.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use widget_bridge_core::error::{Result, WidgetBridgeError};
use widget_bridge_core::protocol::{DisplayMode, DisplayModeOutcome, FrameMessage, HostMessage};
use widget_bridge_core::telemetry::{
    ForwardingLogger, TelemetryEvent, TelemetrySink, TracingLogger, WidgetLogger,
};
use widget_bridge_core::window::{Envelope, WindowHandle, WindowId};

use crate::globals::WidgetGlobals;

/// Event names the full globals snapshot is dispatched under.
pub const SET_GLOBALS_EVENTS: [&str; 2] = ["openai:set_globals", "webplus:set_globals"];

type GlobalsListener = Box<dyn Fn(&str, &WidgetGlobals) + Send + Sync>;

/// Argument to [`FrameBridge::set_widget_state`].
pub enum WidgetStateUpdate {
    Value(Value),
    /// Computes the next state from the previous one.
    Reducer(Box<dyn FnOnce(&Value) -> Value + Send>),
}

impl WidgetStateUpdate {
    pub fn reduce(f: impl FnOnce(&Value) -> Value + Send + 'static) -> Self {
        Self::Reducer(Box::new(f))
    }
}

impl From<Value> for WidgetStateUpdate {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Posts telemetry to the host as `widget-debug` messages.
struct ParentSink {
    parent: Option<Arc<dyn WindowHandle>>,
    source: WindowId,
}

impl TelemetrySink for ParentSink {
    fn forward(&self, event: TelemetryEvent) {
        if let Some(parent) = &self.parent {
            let msg = FrameMessage::WidgetDebug {
                event: event.into_value(),
            };
            parent.post_message(self.source, msg.to_value());
        }
    }
}

struct BridgeState {
    globals: WidgetGlobals,
    request_counter: u64,
    pending: HashMap<u64, oneshot::Sender<DisplayModeOutcome>>,
}

pub struct FrameBridge {
    window: WindowId,
    parent: Option<Arc<dyn WindowHandle>>,
    state: Mutex<BridgeState>,
    listeners: Mutex<Vec<GlobalsListener>>,
    logger: ForwardingLogger<TracingLogger, ParentSink>,
}

impl FrameBridge {
    /// `window` is the id the host sees as this frame's message source.
    /// Without a `parent` the frame behaves as a top-level page: display-mode
    /// requests resolve locally and nothing is posted.
    pub fn new(
        window: WindowId,
        widget_id: impl Into<String>,
        globals: WidgetGlobals,
        parent: Option<Arc<dyn WindowHandle>>,
    ) -> Self {
        let logger = ForwardingLogger::new(
            TracingLogger::new(widget_id),
            ParentSink {
                parent: parent.clone(),
                source: window,
            },
        );
        Self {
            window,
            parent,
            state: Mutex::new(BridgeState {
                globals,
                request_counter: 0,
                pending: HashMap::new(),
            }),
            listeners: Mutex::new(Vec::new()),
            logger,
        }
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    fn lock(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn post(&self, msg: FrameMessage) {
        if let Some(parent) = &self.parent {
            parent.post_message(self.window, msg.to_value());
        }
    }

    /// The logger widget content writes to; every call is also forwarded to the host.
    pub fn logger(&self) -> &dyn WidgetLogger {
        &self.logger
    }

    pub fn globals(&self) -> WidgetGlobals {
        self.lock().globals.clone()
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.lock().globals.display_mode
    }

    /// Register a listener for globals dispatches. It is called once per
    /// event name with the full snapshot.
    pub fn on_globals(&self, listener: impl Fn(&str, &WidgetGlobals) + Send + Sync + 'static) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(listener));
    }

    /// Dispatch the full snapshot under both event names.
    pub fn dispatch_globals(&self) {
        let snapshot = self.globals();
        let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        for event in SET_GLOBALS_EVENTS {
            for listener in listeners.iter() {
                listener(event, &snapshot);
            }
        }
    }

    /// Apply a mode; a no-op when it is already current.
    fn set_display_mode(&self, mode: DisplayMode) -> bool {
        {
            let mut state = self.lock();
            if state.globals.display_mode == mode {
                return false;
            }
            state.globals.display_mode = mode;
        }
        debug!(mode = %mode, "Frame display mode changed");
        self.dispatch_globals();
        true
    }

    /// Ask the host for `mode`.
    ///
    /// The request is posted before this returns. The returned future resolves
    /// when the host's matching result arrives and never times out on its own;
    /// see [`Self::request_display_mode_with_timeout`] and [`Self::cancel`].
    pub fn request_display_mode(&self, mode: DisplayMode) -> PendingDisplayMode {
        let Some(parent) = &self.parent else {
            self.set_display_mode(mode);
            return PendingDisplayMode::ready(DisplayModeOutcome {
                mode,
                granted: true,
            });
        };

        let (tx, rx) = oneshot::channel();
        let request_id = {
            let mut state = self.lock();
            state.request_counter += 1;
            let id = state.request_counter;
            state.pending.insert(id, tx);
            id
        };

        let msg = FrameMessage::RequestDisplayMode {
            mode: Value::from(mode.as_str()),
            request_id: Some(request_id),
        };
        parent.post_message(self.window, msg.to_value());

        PendingDisplayMode {
            request_id: Some(request_id),
            state: PendingState::Waiting(rx),
        }
    }

    /// Like [`Self::request_display_mode`], but gives up after `timeout`,
    /// dropping the pending entry so a late result is ignored.
    pub async fn request_display_mode_with_timeout(
        &self,
        mode: DisplayMode,
        timeout: Duration,
    ) -> Result<DisplayModeOutcome> {
        let pending = self.request_display_mode(mode);
        let request_id = pending.request_id();
        match tokio::time::timeout(timeout, pending).await {
            Ok(result) => result,
            Err(_) => {
                let id = request_id.unwrap_or_default();
                self.cancel(id);
                Err(WidgetBridgeError::Timeout(id))
            }
        }
    }

    /// Drop a pending request; its future resolves to `Abandoned`.
    pub fn cancel(&self, request_id: u64) -> bool {
        self.lock().pending.remove(&request_id).is_some()
    }

    /// Drop every pending request, as on frame teardown.
    pub fn abandon_all(&self) -> usize {
        let drained: Vec<_> = self.lock().pending.drain().collect();
        drained.len()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Handle a message delivered to this frame. Returns whether it was acted upon.
    ///
    /// Only messages from the parent are considered. Results for unknown
    /// request ids and repeated updates are silently dropped.
    pub fn handle_message(&self, envelope: &Envelope) -> bool {
        match &self.parent {
            Some(parent) if parent.id() == envelope.source => {}
            _ => {
                trace!(source = envelope.source.as_u64(), "Ignoring message from non-parent window");
                return false;
            }
        }

        let Some(msg) = HostMessage::from_value(&envelope.data) else {
            return false;
        };

        match msg {
            HostMessage::DisplayModeResult {
                request_id,
                mode,
                granted,
            } => {
                let Some(tx) = self.lock().pending.remove(&request_id) else {
                    trace!(request_id, "No pending display-mode request");
                    return false;
                };
                self.set_display_mode(mode);
                // The caller may have dropped its future; that is fine.
                let _ = tx.send(DisplayModeOutcome { mode, granted });
                true
            }
            HostMessage::DisplayModeUpdate { mode } => self.set_display_mode(mode),
        }
    }

    /// Update widget state, notify the host, and re-dispatch globals.
    pub fn set_widget_state(&self, update: impl Into<WidgetStateUpdate>) -> Value {
        let resolved = {
            let mut state = self.lock();
            let next = match update.into() {
                WidgetStateUpdate::Value(v) => v,
                WidgetStateUpdate::Reducer(f) => f(&state.globals.widget_state),
            };
            state.globals.widget_state = next.clone();
            next
        };

        self.post(FrameMessage::WidgetState {
            state: resolved.clone(),
        });
        self.dispatch_globals();
        resolved
    }

    pub fn widget_state(&self) -> Value {
        self.lock().globals.widget_state.clone()
    }

    /// Ask the host to open `href` in a new browsing context. Fire-and-forget.
    pub fn open_external(&self, href: &str) {
        if href.is_empty() {
            return;
        }
        self.post(FrameMessage::OpenExternal {
            href: href.to_string(),
        });
    }

    pub async fn call_tool(&self, _name: &str, _arguments: Value) -> Result<Value> {
        Err(WidgetBridgeError::Unsupported("callTool".into()))
    }

    pub async fn send_follow_up_message(&self, _prompt: &str) -> Result<()> {
        Err(WidgetBridgeError::Unsupported("sendFollowUpMessage".into()))
    }
}

enum PendingState {
    Ready(Option<DisplayModeOutcome>),
    Waiting(oneshot::Receiver<DisplayModeOutcome>),
}

/// Result of a display-mode request still in flight.
pub struct PendingDisplayMode {
    request_id: Option<u64>,
    state: PendingState,
}

impl PendingDisplayMode {
    fn ready(outcome: DisplayModeOutcome) -> Self {
        Self {
            request_id: None,
            state: PendingState::Ready(Some(outcome)),
        }
    }

    /// `None` when the request was resolved locally.
    pub fn request_id(&self) -> Option<u64> {
        self.request_id
    }
}

impl Future for PendingDisplayMode {
    type Output = Result<DisplayModeOutcome>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let request_id = this.request_id.unwrap_or_default();
        match &mut this.state {
            PendingState::Ready(outcome) => match outcome.take() {
                Some(outcome) => Poll::Ready(Ok(outcome)),
                None => Poll::Ready(Err(WidgetBridgeError::Abandoned(request_id))),
            },
            PendingState::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|r| r.map_err(|_| WidgetBridgeError::Abandoned(request_id))),
        }
    }
}
