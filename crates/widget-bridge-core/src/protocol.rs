//! Frame/host message protocol.
//!
//! Messages are plain JSON objects tagged by `type`, posted with a wildcard
//! target origin. Each side parses inbound data into its own enum and drops
//! anything it does not recognise: unknown types, missing fields and stale
//! request ids are routine and never errors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const REQUEST_DISPLAY_MODE: &str = "request-display-mode";
pub const DISPLAY_MODE_RESULT: &str = "display-mode-result";
pub const DISPLAY_MODE_UPDATE: &str = "display-mode-update";
pub const OPEN_EXTERNAL: &str = "open-external";
pub const WIDGET_DEBUG: &str = "widget-debug";
pub const WIDGET_STATE: &str = "widget-state";

/// Every wire `type` string, in table order.
pub const MESSAGE_TYPES: &[&str] = &[
    REQUEST_DISPLAY_MODE,
    DISPLAY_MODE_RESULT,
    DISPLAY_MODE_UPDATE,
    OPEN_EXTERNAL,
    WIDGET_DEBUG,
    WIDGET_STATE,
];

/// How the widget is laid out by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Inline,
    Fullscreen,
}

impl DisplayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Fullscreen => "fullscreen",
        }
    }

    /// Parse a wire value; anything but the two known modes is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        value.parse().ok()
    }
}

impl FromStr for DisplayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inline" => Ok(Self::Inline),
            "fullscreen" => Ok(Self::Fullscreen),
            other => Err(format!("unknown display mode '{other}'")),
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messages the frame posts to its host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FrameMessage {
    /// Ask the host to switch display mode. `mode` is kept raw (possibly
    /// missing or not a string) so the host can still answer with a denial.
    #[serde(rename = "request-display-mode", alias = "openai-request-display-mode")]
    RequestDisplayMode {
        #[serde(default)]
        mode: Value,
        #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
    },

    #[serde(rename = "display-mode-update", alias = "openai-display-mode-update")]
    DisplayModeUpdate { mode: String },

    #[serde(rename = "open-external", alias = "openai-open-external")]
    OpenExternal { href: String },

    /// `event` is `Null` when the frame sent the fields at the top level.
    #[serde(rename = "widget-debug", alias = "openai-widget-debug")]
    WidgetDebug {
        #[serde(default)]
        event: Value,
    },

    #[serde(rename = "widget-state", alias = "openai-widget-state")]
    WidgetState { state: Value },
}

/// Messages the host posts to its frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostMessage {
    #[serde(rename = "display-mode-result", alias = "openai-display-mode-result")]
    DisplayModeResult {
        #[serde(rename = "requestId")]
        request_id: u64,
        mode: DisplayMode,
        granted: bool,
    },

    #[serde(rename = "display-mode-update", alias = "openai-display-mode-update")]
    DisplayModeUpdate { mode: DisplayMode },
}

impl FrameMessage {
    /// Parse inbound data; `None` for anything that is not a frame message.
    pub fn from_value(data: &Value) -> Option<Self> {
        parse_tagged(data)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl HostMessage {
    /// Parse inbound data; `None` for anything that is not a host message.
    pub fn from_value(data: &Value) -> Option<Self> {
        parse_tagged(data)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn parse_tagged<T: serde::de::DeserializeOwned>(data: &Value) -> Option<T> {
    if !data.is_object() {
        return None;
    }
    match serde_json::from_value(data.clone()) {
        Ok(msg) => Some(msg),
        Err(e) => {
            tracing::trace!(%e, "Ignoring unrecognised bridge message");
            None
        }
    }
}

/// Result a frame receives for its display-mode request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayModeOutcome {
    pub mode: DisplayMode,
    pub granted: bool,
}
