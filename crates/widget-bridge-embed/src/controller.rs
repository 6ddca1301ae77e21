//! Host-side embed controller.
//!
//! One controller per mounted widget. It stores the widget, tracks the frame
//! it mounts, and answers that frame's protocol messages:
//!
//! ```text
//! Uninitialized -> Storing -> Ready(src) -> Unmounted
//!                     ^          |
//!                     +----------+  (props changed)
//! ```
//!
//! Display mode (`inline` / `fullscreen`) is tracked alongside the phase.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

use widget_bridge_core::config::{EmbedConfig, WidgetHeight};
use widget_bridge_core::error::{Result, WidgetBridgeError};
use widget_bridge_core::protocol::{DisplayMode, FrameMessage, HostMessage};
use widget_bridge_core::record::StoreWidgetPayload;
use widget_bridge_core::telemetry::{LogLevel, TelemetryEvent};
use widget_bridge_core::window::{Envelope, WindowHandle, WindowId};

use crate::store_client::WidgetStore;
use crate::view::{EmbedView, FRAME_SANDBOX, FrameView};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedPhase {
    Uninitialized,
    /// A store call is in flight, or the last one failed.
    Storing,
    Ready { src: String },
    Unmounted,
}

/// What a display-mode policy decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayModeDecision {
    Allow(DisplayMode),
    Deny,
    /// Fall through to the default policy.
    Defer,
}

/// Caller-supplied override consulted before the default display-mode policy.
pub trait DisplayModePolicy: Send + Sync {
    fn decide(&self, requested: &str, current: DisplayMode) -> DisplayModeDecision;
}

impl<F> DisplayModePolicy for F
where
    F: Fn(&str, DisplayMode) -> DisplayModeDecision + Send + Sync,
{
    fn decide(&self, requested: &str, current: DisplayMode) -> DisplayModeDecision {
        self(requested, current)
    }
}

/// Opens URLs in a new browsing context. Never navigates the host itself.
pub trait HostWindow: Send + Sync {
    fn open_new_window(&self, href: &str);
}

/// Default host window for headless hosts: records the request in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHostWindow;

impl HostWindow for TracingHostWindow {
    fn open_new_window(&self, href: &str) {
        info!(href = %href, "Opening external link in new window");
    }
}

type SrcFactory = Box<dyn Fn(&str) -> String + Send + Sync>;
type OpenExternalHandler = Box<dyn Fn(&str) + Send + Sync>;

pub struct EmbedController {
    window: WindowId,
    store: Arc<dyn WidgetStore>,
    phase: EmbedPhase,
    props: Option<StoreWidgetPayload>,
    display_mode: DisplayMode,
    frame: Option<Arc<dyn WindowHandle>>,
    widget_state: Option<Value>,
    inline_height: WidgetHeight,
    loading_fallback: Option<String>,
    src_factory: SrcFactory,
    policy: Option<Box<dyn DisplayModePolicy>>,
    on_open_external: Option<OpenExternalHandler>,
    host_window: Box<dyn HostWindow>,
}

impl EmbedController {
    pub fn new(store: Arc<dyn WidgetStore>, config: &EmbedConfig) -> Self {
        let prefix = config.render_prefix.clone();
        Self {
            window: WindowId::next(),
            store,
            phase: EmbedPhase::Uninitialized,
            props: None,
            display_mode: DisplayMode::Inline,
            frame: None,
            widget_state: None,
            inline_height: config.inline_height.clone(),
            loading_fallback: None,
            src_factory: Box::new(move |id| format!("{prefix}{id}")),
            policy: None,
            on_open_external: None,
            host_window: Box::new(TracingHostWindow),
        }
    }

    /// The id frames see as this host's message source.
    pub fn with_window(mut self, window: WindowId) -> Self {
        self.window = window;
        self
    }

    pub fn with_src_factory(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.src_factory = Box::new(f);
        self
    }

    pub fn with_policy(mut self, policy: impl DisplayModePolicy + 'static) -> Self {
        self.policy = Some(Box::new(policy));
        self
    }

    pub fn with_open_external(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_open_external = Some(Box::new(f));
        self
    }

    pub fn with_host_window(mut self, window: impl HostWindow + 'static) -> Self {
        self.host_window = Box::new(window);
        self
    }

    pub fn with_loading_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.loading_fallback = Some(fallback.into());
        self
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn phase(&self) -> &EmbedPhase {
        &self.phase
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    /// The latest state the frame reported via `widget-state`.
    pub fn widget_state(&self) -> Option<&Value> {
        self.widget_state.as_ref()
    }

    pub fn src(&self) -> Option<&str> {
        match &self.phase {
            EmbedPhase::Ready { src } => Some(src),
            _ => None,
        }
    }

    pub async fn mount(&mut self, props: StoreWidgetPayload) -> Result<()> {
        self.update_props(props).await
    }

    /// Store `props` and move to `Ready` with the resulting frame address.
    ///
    /// Unchanged props on a ready controller are a no-op. A failed store
    /// leaves the controller in `Storing` until the next prop change.
    pub async fn update_props(&mut self, props: StoreWidgetPayload) -> Result<()> {
        if self.phase == EmbedPhase::Unmounted {
            return Err(WidgetBridgeError::Protocol("embed controller is unmounted".into()));
        }
        if self.src().is_some() && self.props.as_ref() == Some(&props) {
            return Ok(());
        }

        self.phase = EmbedPhase::Storing;
        let result = self.store.store(&props).await;
        self.props = Some(props);

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                error!(%e, "Failed to store widget");
                return Err(e);
            }
        };

        let src = match (result.src, result.id) {
            (Some(src), _) => src,
            (None, Some(id)) => (self.src_factory)(&id),
            (None, None) => {
                error!("Store returned neither an id nor a src");
                return Err(WidgetBridgeError::Protocol(
                    "store returned neither an id nor a src".into(),
                ));
            }
        };

        info!(src = %src, "Widget ready");
        self.phase = EmbedPhase::Ready { src };
        Ok(())
    }

    /// Track the mounted frame. Only messages whose source is this frame are
    /// acted upon.
    pub fn attach_frame(&mut self, frame: Arc<dyn WindowHandle>) {
        debug!(frame = frame.id().as_u64(), "Frame attached");
        self.frame = Some(frame);
    }

    fn post(&self, msg: HostMessage) {
        if let Some(frame) = &self.frame {
            frame.post_message(self.window, msg.to_value());
        }
    }

    fn push_display_mode(&self) {
        self.post(HostMessage::DisplayModeUpdate {
            mode: self.display_mode,
        });
    }

    /// Push the current mode once the frame has finished loading.
    pub fn on_frame_load(&self) {
        self.push_display_mode();
    }

    /// Host-initiated return to inline. Returns whether the mode changed.
    pub fn exit_fullscreen(&mut self) -> bool {
        if self.display_mode != DisplayMode::Fullscreen {
            return false;
        }
        self.display_mode = DisplayMode::Inline;
        self.push_display_mode();
        true
    }

    /// Detach from the frame. Later messages are ignored and any request the
    /// frame still has pending is never answered.
    pub fn unmount(&mut self) {
        self.frame = None;
        self.phase = EmbedPhase::Unmounted;
        debug!("Embed unmounted");
    }

    /// Handle a message delivered to the host window. Returns whether it was
    /// acted upon.
    pub fn handle_message(&mut self, envelope: &Envelope) -> bool {
        let from_frame = self
            .frame
            .as_ref()
            .is_some_and(|frame| frame.id() == envelope.source);
        if !from_frame {
            trace!(source = envelope.source.as_u64(), "Ignoring message from unknown window");
            return false;
        }

        let Some(msg) = FrameMessage::from_value(&envelope.data) else {
            return false;
        };

        match msg {
            FrameMessage::RequestDisplayMode { mode, request_id } => {
                // Non-string modes still get an answer: they fall through to denial.
                self.on_display_mode_request(mode.as_str().unwrap_or(""), request_id);
            }
            FrameMessage::DisplayModeUpdate { mode } => match DisplayMode::parse(&mode) {
                Some(mode) => self.display_mode = mode,
                None => trace!(mode = %mode, "Ignoring unknown display mode"),
            },
            FrameMessage::OpenExternal { href } => self.open_external(&href),
            FrameMessage::WidgetDebug { event } => {
                let event = if event.is_null() { envelope.data.clone() } else { event };
                log_widget_event(TelemetryEvent::from_value(event));
            }
            FrameMessage::WidgetState { state } => {
                debug!("Widget state updated");
                self.widget_state = Some(state);
            }
        }
        true
    }

    fn on_display_mode_request(&mut self, requested: &str, request_id: Option<u64>) {
        let decision = self
            .policy
            .as_ref()
            .map(|p| p.decide(requested, self.display_mode))
            .unwrap_or(DisplayModeDecision::Defer);

        let decision = match decision {
            DisplayModeDecision::Defer => DisplayMode::parse(requested)
                .map(DisplayModeDecision::Allow)
                .unwrap_or(DisplayModeDecision::Deny),
            decided => decided,
        };

        match decision {
            DisplayModeDecision::Allow(mode) => {
                debug!(mode = %mode, ?request_id, "Display mode granted");
                self.display_mode = mode;
                if let Some(request_id) = request_id {
                    self.post(HostMessage::DisplayModeResult {
                        request_id,
                        mode,
                        granted: true,
                    });
                }
                self.push_display_mode();
            }
            _ => {
                debug!(requested = %requested, ?request_id, "Display mode denied");
                if let Some(request_id) = request_id {
                    self.post(HostMessage::DisplayModeResult {
                        request_id,
                        mode: self.display_mode,
                        granted: false,
                    });
                }
            }
        }
    }

    fn open_external(&self, href: &str) {
        if href.is_empty() {
            return;
        }
        match &self.on_open_external {
            Some(handler) => handler(href),
            None => self.host_window.open_new_window(href),
        }
    }

    /// What the host should render right now.
    pub fn view(&self) -> EmbedView {
        let src = match &self.phase {
            EmbedPhase::Unmounted => return EmbedView::Unmounted,
            EmbedPhase::Ready { src } => src.clone(),
            _ => {
                return EmbedView::Loading {
                    height: self.inline_height.css(),
                    fallback: self.loading_fallback.clone(),
                };
            }
        };

        let fullscreen = self.display_mode == DisplayMode::Fullscreen;
        EmbedView::Frame(FrameView {
            src,
            title: self
                .props
                .as_ref()
                .and_then(|p| p.output_template())
                .map(str::to_string),
            sandbox: FRAME_SANDBOX,
            height: if fullscreen {
                "100%".into()
            } else {
                self.inline_height.css()
            },
            fullscreen,
            exit_control: fullscreen,
        })
    }
}

fn log_widget_event(event: TelemetryEvent) {
    let payload = event.as_value();
    match event.level() {
        LogLevel::Error => error!(%payload, "Widget reported error"),
        LogLevel::Warn => warn!(%payload, "Widget reported warning"),
        LogLevel::Log => info!(%payload, "Widget log"),
    }
}
