//! Widget telemetry: a logger abstraction with a forwarding decorator.
//!
//! `ForwardingLogger` wraps any `WidgetLogger` and emits a sanitized
//! `TelemetryEvent` to a `TelemetrySink` before delegating. Forwarding is
//! infallible from the caller's point of view, so the wrapped logger always runs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Console severity carried by telemetry events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Log,
    Warn,
    Error,
}

impl LogLevel {
    /// Map a wire level onto a severity; unknown levels are plain logs.
    pub fn from_wire(level: Option<&str>) -> Self {
        match level {
            Some("error") => Self::Error,
            Some("warn") => Self::Warn,
            _ => Self::Log,
        }
    }
}

/// A sanitized telemetry event: a JSON object with at least `level`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TelemetryEvent(Value);

impl TelemetryEvent {
    /// A console call: `{level, args}`.
    pub fn console(level: LogLevel, args: &[Value]) -> Self {
        Self(json!({ "level": level, "args": args }))
    }

    /// An uncaught error flattened to `{level: "error", message, stack}`.
    ///
    /// The `stack` is the error's source chain, outermost first.
    pub fn error(error: &(dyn std::error::Error + 'static)) -> Self {
        let (message, stack) = flatten_error(error);
        Self(json!({ "level": LogLevel::Error, "message": message, "stack": stack }))
    }

    /// Wrap an already-shaped event received from a frame.
    pub fn from_value(value: Value) -> Self {
        Self(sanitize(value))
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_wire(self.0.get("level").and_then(Value::as_str))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Flatten an error into `(message, stack)`.
pub fn flatten_error(error: &(dyn std::error::Error + 'static)) -> (String, String) {
    let message = error.to_string();
    let mut stack = message.clone();
    let mut source = error.source();
    while let Some(cause) = source {
        stack.push_str("\n    caused by: ");
        stack.push_str(&cause.to_string());
        source = cause.source();
    }
    (message, stack)
}

/// Coerce an arbitrary value into an event object.
///
/// Objects pass through; anything else becomes `{level: "log", args: [value]}`.
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(map),
        other => {
            let mut map = Map::new();
            map.insert("level".into(), json!(LogLevel::Log));
            map.insert("args".into(), Value::Array(vec![other]));
            Value::Object(map)
        }
    }
}

/// The logging surface widget content writes to.
pub trait WidgetLogger: Send + Sync {
    fn log(&self, level: LogLevel, args: &[Value]);

    fn report_error(&self, error: &(dyn std::error::Error + 'static));
}

/// Where forwarded telemetry goes. Implementations must not fail loudly:
/// dropped events are acceptable.
pub trait TelemetrySink: Send + Sync {
    fn forward(&self, event: TelemetryEvent);
}

/// Logger that writes through `tracing`.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    widget_id: String,
}

impl TracingLogger {
    pub fn new(widget_id: impl Into<String>) -> Self {
        Self {
            widget_id: widget_id.into(),
        }
    }
}

impl WidgetLogger for TracingLogger {
    fn log(&self, level: LogLevel, args: &[Value]) {
        let args = Value::Array(args.to_vec());
        match level {
            LogLevel::Error => tracing::error!(widget_id = %self.widget_id, %args, "Widget console"),
            LogLevel::Warn => tracing::warn!(widget_id = %self.widget_id, %args, "Widget console"),
            LogLevel::Log => tracing::info!(widget_id = %self.widget_id, %args, "Widget console"),
        }
    }

    fn report_error(&self, error: &(dyn std::error::Error + 'static)) {
        let (message, stack) = flatten_error(error);
        tracing::error!(widget_id = %self.widget_id, %message, %stack, "Widget error");
    }
}

/// Decorator forwarding every call to a sink, then to the wrapped logger.
pub struct ForwardingLogger<L, S> {
    inner: L,
    sink: S,
}

impl<L, S> ForwardingLogger<L, S>
where
    L: WidgetLogger,
    S: TelemetrySink,
{
    pub fn new(inner: L, sink: S) -> Self {
        Self { inner, sink }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }
}

impl<L, S> WidgetLogger for ForwardingLogger<L, S>
where
    L: WidgetLogger,
    S: TelemetrySink,
{
    fn log(&self, level: LogLevel, args: &[Value]) {
        self.sink.forward(TelemetryEvent::console(level, args));
        self.inner.log(level, args);
    }

    fn report_error(&self, error: &(dyn std::error::Error + 'static)) {
        self.sink.forward(TelemetryEvent::error(error));
        self.inner.report_error(error);
    }
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for std::sync::Arc<T> {
    fn forward(&self, event: TelemetryEvent) {
        (**self).forward(event);
    }
}

impl<T: WidgetLogger + ?Sized> WidgetLogger for std::sync::Arc<T> {
    fn log(&self, level: LogLevel, args: &[Value]) {
        (**self).log(level, args);
    }

    fn report_error(&self, error: &(dyn std::error::Error + 'static)) {
        (**self).report_error(error);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<TelemetryEvent>>);

    impl TelemetrySink for RecordingSink {
        fn forward(&self, event: TelemetryEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[derive(Default)]
    struct RecordingLogger(Mutex<Vec<(LogLevel, Vec<Value>)>>);

    impl WidgetLogger for RecordingLogger {
        fn log(&self, level: LogLevel, args: &[Value]) {
            self.0.lock().unwrap().push((level, args.to_vec()));
        }

        fn report_error(&self, error: &(dyn std::error::Error + 'static)) {
            self.0
                .lock()
                .unwrap()
                .push((LogLevel::Error, vec![json!(error.to_string())]));
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("render failed")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn test_forwarding_keeps_original_logger() {
        let sink = Arc::new(RecordingSink::default());
        let inner = Arc::new(RecordingLogger::default());
        let logger = ForwardingLogger::new(inner.clone(), sink.clone());

        logger.log(LogLevel::Warn, &[json!("low disk"), json!(3)]);

        let forwarded = sink.0.lock().unwrap();
        assert_eq!(forwarded.len(), 1);
        assert_eq!(
            forwarded[0].as_value(),
            &json!({"level": "warn", "args": ["low disk", 3]})
        );
        assert_eq!(inner.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_error_flattened_with_chain() {
        let err = Outer(std::io::Error::other("disk gone"));
        let event = TelemetryEvent::error(&err);
        assert_eq!(event.level(), LogLevel::Error);
        assert_eq!(event.as_value()["message"], "render failed");
        let stack = event.as_value()["stack"].as_str().unwrap();
        assert!(stack.contains("caused by: disk gone"));
    }

    #[test]
    fn test_sanitize_wraps_scalars() {
        assert_eq!(
            sanitize(json!("hello")),
            json!({"level": "log", "args": ["hello"]})
        );
        let obj = json!({"level": "error", "message": "x"});
        assert_eq!(sanitize(obj.clone()), obj);
    }

    #[test]
    fn test_level_from_wire() {
        assert_eq!(LogLevel::from_wire(Some("error")), LogLevel::Error);
        assert_eq!(LogLevel::from_wire(Some("warn")), LogLevel::Warn);
        assert_eq!(LogLevel::from_wire(Some("debug")), LogLevel::Log);
        assert_eq!(LogLevel::from_wire(None), LogLevel::Log);
    }
}
