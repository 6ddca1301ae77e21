//! Widget records: the persisted artifact and the payloads that create it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata key naming the resource URI the widget HTML was fetched from.
pub const OUTPUT_TEMPLATE_KEY: &str = "openai/outputTemplate";

/// Metadata key flagging whether the frame may read `toolOutput`.
pub const WIDGET_ACCESSIBLE_KEY: &str = "openai/widgetAccessible";

/// Side-channel metadata returned alongside a tool result.
pub type WidgetMetadata = serde_json::Map<String, Value>;

/// What a caller hands to `store`: every record field except id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreWidgetPayload {
    pub html: String,
    #[serde(rename = "toolOutput", default)]
    pub tool_output: Value,
    #[serde(rename = "toolResponseMetadata", default)]
    pub tool_response_metadata: Option<WidgetMetadata>,
}

impl StoreWidgetPayload {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            tool_output: Value::Null,
            tool_response_metadata: None,
        }
    }

    pub fn with_tool_output(mut self, output: Value) -> Self {
        self.tool_output = output;
        self
    }

    pub fn with_metadata(mut self, metadata: WidgetMetadata) -> Self {
        self.tool_response_metadata = Some(metadata);
        self
    }

    /// The output-template URI, used as the frame title.
    pub fn output_template(&self) -> Option<&str> {
        self.tool_response_metadata
            .as_ref()
            .and_then(|m| m.get(OUTPUT_TEMPLATE_KEY))
            .and_then(Value::as_str)
    }
}

/// A stored widget. Immutable once written; `timestamp` is set by the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetRecord {
    pub html: String,
    #[serde(rename = "toolOutput", default)]
    pub tool_output: Value,
    #[serde(rename = "toolResponseMetadata", default)]
    pub tool_response_metadata: Option<WidgetMetadata>,
    /// Creation time, persisted as epoch milliseconds.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl WidgetRecord {
    /// Stamp a payload with the current time.
    pub fn from_payload(payload: StoreWidgetPayload) -> Self {
        Self {
            html: payload.html,
            tool_output: payload.tool_output,
            tool_response_metadata: payload.tool_response_metadata,
            timestamp: Utc::now(),
        }
    }

    /// `Some(false)` only when the metadata explicitly denies output access.
    pub fn widget_accessible(&self) -> Option<bool> {
        self.tool_response_metadata
            .as_ref()
            .and_then(|m| m.get(WIDGET_ACCESSIBLE_KEY))
            .and_then(Value::as_bool)
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.timestamp
    }
}

/// Result of a host-side store call: an id to build the frame address from,
/// or a ready-made address. `src` wins when both are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreWidgetResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

impl StoreWidgetResult {
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            src: None,
        }
    }
}

/// Bridge a tool result into a store payload.
///
/// `resource_html` is the text fetched for the metadata's output template.
/// Returns `None` when the tool produced no renderable HTML. When HTML was
/// resolved, `openai/widgetAccessible` is set to `true` unless it already is.
pub fn attach_widget_resource(
    mut metadata: WidgetMetadata,
    resource_html: Option<String>,
    tool_output: Value,
) -> Option<StoreWidgetPayload> {
    metadata.get(OUTPUT_TEMPLATE_KEY).and_then(Value::as_str)?;
    let html = resource_html.filter(|h| !h.is_empty())?;

    let accessible = metadata
        .get(WIDGET_ACCESSIBLE_KEY)
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !accessible {
        metadata.insert(WIDGET_ACCESSIBLE_KEY.to_string(), Value::Bool(true));
    }

    Some(StoreWidgetPayload {
        html,
        tool_output,
        tool_response_metadata: Some(metadata),
    })
}
