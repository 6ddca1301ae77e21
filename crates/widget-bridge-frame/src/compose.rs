//! Document composer.
//!
//! Builds the complete HTML document a sandboxed frame loads: the stored
//! markup as the body, and the bridge script, seeded with the record's data,
//! in the head.

use serde::Serialize;
use serde_json::Value;

use widget_bridge_core::config::{RenderConfig, WidgetHeight};
use widget_bridge_core::error::{Result, WidgetBridgeError};
use widget_bridge_core::record::WidgetRecord;

const BRIDGE_TEMPLATE: &str = include_str!("../assets/bridge.js");

const WIDGET_ID: &str = "__WIDGET_ID__";
const MAX_HEIGHT: &str = "__MAX_HEIGHT__";
const TOOL_OUTPUT: &str = "__TOOL_OUTPUT__";
const TOOL_RESPONSE_METADATA: &str = "__TOOL_RESPONSE_METADATA__";
const LOG_PATH: &str = "__LOG_PATH__";

#[derive(Debug, Clone, PartialEq)]
pub struct ComposeOptions {
    pub default_height: WidgetHeight,
    pub base_href: String,
    /// Where the bridge script beacons telemetry. Empty disables beaconing.
    pub log_path: String,
    /// When false the frame sees `toolOutput: null`.
    pub expose_tool_output: bool,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self::from(&RenderConfig::default())
    }
}

impl From<&RenderConfig> for ComposeOptions {
    fn from(config: &RenderConfig) -> Self {
        Self {
            default_height: config.default_height.clone(),
            base_href: config.base_href.clone(),
            log_path: config.log_path.clone(),
            expose_tool_output: true,
        }
    }
}

/// Escape serialized JSON for inlining inside a `<script>` element.
///
/// `<`, `>` and `&` become `\u003c`, `\u003e` and `\u0026`, so no value can
/// close the script element or open a comment. U+2028/U+2029 are escaped as
/// well; they are legal in JSON but terminate lines in older JS parsers.
pub fn escape_json_for_script(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out
}

fn script_literal<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)
        .map_err(|e| WidgetBridgeError::Render(format!("cannot serialize widget data: {e}")))?;
    Ok(escape_json_for_script(&json))
}

/// Escape a value for a double-quoted HTML attribute.
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

/// Substitute placeholders in one pass over the template, so substituted
/// values are never scanned for further placeholders.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + values.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;

    loop {
        let next = values
            .iter()
            .filter_map(|(key, value)| rest.find(key).map(|pos| (pos, *key, *value)))
            .min_by_key(|(pos, _, _)| *pos);

        match next {
            Some((pos, key, value)) => {
                out.push_str(&rest[..pos]);
                out.push_str(value);
                rest = &rest[pos + key.len()..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

/// The bridge script seeded for one widget.
pub fn bridge_script(id: &str, record: &WidgetRecord, options: &ComposeOptions) -> Result<String> {
    let tool_output = if options.expose_tool_output {
        &record.tool_output
    } else {
        &Value::Null
    };

    let id_literal = script_literal(id)?;
    let height = options.default_height.numeric().to_string();
    let output_literal = script_literal(tool_output)?;
    let metadata_literal = script_literal(&record.tool_response_metadata)?;
    let log_path_literal = script_literal(options.log_path.as_str())?;

    Ok(fill_template(
        BRIDGE_TEMPLATE,
        &[
            (WIDGET_ID, id_literal.as_str()),
            (MAX_HEIGHT, height.as_str()),
            (TOOL_OUTPUT, output_literal.as_str()),
            (TOOL_RESPONSE_METADATA, metadata_literal.as_str()),
            (LOG_PATH, log_path_literal.as_str()),
        ],
    ))
}

/// Compose the full frame document for a stored widget.
pub fn compose_document(id: &str, record: &WidgetRecord, options: &ComposeOptions) -> Result<String> {
    let script = bridge_script(id, record, options)?;
    let base_href = escape_attr(&options.base_href);

    Ok(format!(
        r#"<!doctype html>
<html>
<head>
  <meta charset="utf-8"/>
  <base href="{base_href}">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <style>
    html,body{{margin:0;padding:0;height:100%;width:100%;background:transparent;}}
  </style>
  <script>
{script}
  </script>
</head>
<body>{body}</body>
</html>
"#,
        body = record.html,
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use widget_bridge_core::protocol::MESSAGE_TYPES;
    use widget_bridge_core::record::{StoreWidgetPayload, WidgetMetadata};

    use super::*;

    fn record(output: Value) -> WidgetRecord {
        let mut meta = WidgetMetadata::new();
        meta.insert("openai/outputTemplate".into(), json!("ui://x"));
        WidgetRecord::from_payload(
            StoreWidgetPayload::new("<div>hi</div>")
                .with_tool_output(output)
                .with_metadata(meta),
        )
    }

    #[test]
    fn test_document_shape() {
        let doc = compose_document("abc123", &record(json!({"a": 1})), &ComposeOptions::default()).unwrap();

        assert!(doc.starts_with("<!doctype html>"));
        assert!(doc.contains("<body><div>hi</div></body>"));
        assert!(doc.contains(r#"toolOutput: {"a":1}"#));
        assert!(doc.contains(r#"toolResponseMetadata: {"openai/outputTemplate":"ui://x"}"#));
        assert!(doc.contains(r#"var widgetId = "abc123";"#));
        assert!(doc.contains("maxHeight: 400,"));
        assert!(doc.contains(r#"<base href="/">"#));
        assert!(!doc.contains("__TOOL_OUTPUT__"));
        assert!(!doc.contains("__WIDGET_ID__"));
    }

    #[test]
    fn test_script_breakout_is_escaped() {
        let attack = "</script><script>alert(1)</script>";
        let doc = compose_document("x1", &record(json!({"note": attack})), &ComposeOptions::default()).unwrap();

        assert!(!doc.contains(attack));
        assert!(doc.contains(r"\u003c/script\u003e\u003cscript\u003ealert(1)\u003c/script\u003e"));
        // Exactly one script element: the bridge.
        assert_eq!(doc.matches("</script>").count(), 1);
    }

    #[test]
    fn test_escape_json_for_script() {
        assert_eq!(
            escape_json_for_script(r#"{"a":"<b>&</b>"}"#),
            r#"{"a":"\u003cb\u003e\u0026\u003c/b\u003e"}"#
        );
        assert_eq!(escape_json_for_script("\u{2028}"), "\\u2028");
    }

    #[test]
    fn test_placeholder_text_in_data_is_left_alone() {
        let doc = compose_document("p1", &record(json!("__LOG_PATH__ __WIDGET_ID__")), &ComposeOptions::default())
            .unwrap();
        assert!(doc.contains(r#"toolOutput: "__LOG_PATH__ __WIDGET_ID__""#));
        assert!(doc.contains(r#"var logPath = "/api/widget/log";"#));
    }

    #[test]
    fn test_height_and_base_href_options() {
        let options = ComposeOptions {
            default_height: WidgetHeight::Css("640px".into()),
            base_href: r#"/app/"><script>"#.into(),
            ..ComposeOptions::default()
        };
        let doc = compose_document("h1", &record(Value::Null), &options).unwrap();
        assert!(doc.contains("maxHeight: 640,"));
        assert!(doc.contains(r#"<base href="/app/&quot;&gt;&lt;script&gt;">"#));
    }

    #[test]
    fn test_withheld_tool_output() {
        let options = ComposeOptions {
            expose_tool_output: false,
            ..ComposeOptions::default()
        };
        let doc = compose_document("w1", &record(json!({"secret": true})), &options).unwrap();
        assert!(doc.contains("toolOutput: null,"));
        assert!(!doc.contains("secret"));
    }

    #[test]
    fn test_missing_metadata_is_null() {
        let record = WidgetRecord::from_payload(StoreWidgetPayload::new("<p/>"));
        let doc = compose_document("m1", &record, &ComposeOptions::default()).unwrap();
        assert!(doc.contains("toolResponseMetadata: null,"));
    }

    #[test]
    fn test_bridge_speaks_every_message_type() {
        for ty in MESSAGE_TYPES {
            assert!(BRIDGE_TEMPLATE.contains(ty), "bridge.js never mentions {ty}");
        }
        assert!(BRIDGE_TEMPLATE.contains("openai:set_globals"));
        assert!(BRIDGE_TEMPLATE.contains("webplus:set_globals"));
    }

    #[test]
    fn test_sanitize_only_flags_ancestor_cycles() {
        // Shared references (`[a, a]`) must be copied twice, so an object
        // leaves the ancestor set once its children are walked.
        assert!(BRIDGE_TEMPLATE.contains("ancestors.add(v);"));
        assert!(BRIDGE_TEMPLATE.contains("ancestors.delete(v);"));
        assert!(!BRIDGE_TEMPLATE.contains("seen.add("));
    }

    #[test]
    fn test_escape_attr() {
        assert_eq!(escape_attr(r#"a"<b>&c"#), "a&quot;&lt;b&gt;&amp;c");
    }

    #[test]
    fn test_fill_template_single_pass() {
        let out = fill_template("a=__A__ b=__B__", &[("__A__", "__B__"), ("__B__", "2")]);
        assert_eq!(out, "a=__B__ b=2");
    }
}
