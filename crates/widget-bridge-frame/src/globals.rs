//! The globals snapshot a frame exposes to widget content.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use widget_bridge_core::protocol::DisplayMode;
use widget_bridge_core::record::WidgetRecord;

use crate::compose::ComposeOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetGlobals {
    pub theme: String,
    pub locale: String,
    pub user_agent: UserAgent,
    pub max_height: u32,
    pub display_mode: DisplayMode,
    pub safe_area: SafeArea,
    pub tool_input: Value,
    pub tool_output: Value,
    pub tool_response_metadata: Value,
    pub widget_state: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAgent {
    pub device: Device,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub hover: bool,
    pub touch: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeArea {
    pub insets: Insets,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insets {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl Default for UserAgent {
    fn default() -> Self {
        Self {
            device: Device {
                kind: "desktop".into(),
            },
            capabilities: Capabilities {
                hover: true,
                touch: false,
            },
        }
    }
}

impl Default for WidgetGlobals {
    fn default() -> Self {
        Self {
            theme: "light".into(),
            locale: "en-US".into(),
            user_agent: UserAgent::default(),
            max_height: 400,
            display_mode: DisplayMode::Inline,
            safe_area: SafeArea::default(),
            tool_input: Value::Null,
            tool_output: Value::Null,
            tool_response_metadata: Value::Null,
            widget_state: Value::Null,
        }
    }
}

impl WidgetGlobals {
    /// The snapshot a freshly loaded frame starts from: the same values the
    /// composed document seeds the bridge script with.
    pub fn seeded(record: &WidgetRecord, options: &ComposeOptions) -> Self {
        let tool_output = if options.expose_tool_output {
            record.tool_output.clone()
        } else {
            Value::Null
        };
        Self {
            max_height: options.default_height.numeric(),
            tool_output,
            tool_response_metadata: record
                .tool_response_metadata
                .clone()
                .map(Value::Object)
                .unwrap_or(Value::Null),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use widget_bridge_core::config::WidgetHeight;
    use widget_bridge_core::record::StoreWidgetPayload;

    use super::*;

    #[test]
    fn test_wire_shape() {
        let value = serde_json::to_value(WidgetGlobals::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "theme": "light",
                "locale": "en-US",
                "userAgent": {
                    "device": {"type": "desktop"},
                    "capabilities": {"hover": true, "touch": false}
                },
                "maxHeight": 400,
                "displayMode": "inline",
                "safeArea": {"insets": {"top": 0, "right": 0, "bottom": 0, "left": 0}},
                "toolInput": null,
                "toolOutput": null,
                "toolResponseMetadata": null,
                "widgetState": null
            })
        );
    }

    #[test]
    fn test_seeded_from_record() {
        let record = WidgetRecord::from_payload(
            StoreWidgetPayload::new("<p/>").with_tool_output(json!({"a": 1})),
        );
        let options = ComposeOptions {
            default_height: WidgetHeight::Css("720px".into()),
            ..ComposeOptions::default()
        };
        let globals = WidgetGlobals::seeded(&record, &options);
        assert_eq!(globals.max_height, 720);
        assert_eq!(globals.tool_output, json!({"a": 1}));
        assert_eq!(globals.display_mode, DisplayMode::Inline);
        assert!(globals.widget_state.is_null());
    }
}
