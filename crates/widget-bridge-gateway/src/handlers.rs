//! Store, render, and telemetry responders.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use widget_bridge_core::error::WidgetBridgeError;
use widget_bridge_core::record::StoreWidgetPayload;
use widget_bridge_core::telemetry::{LogLevel, TelemetryEvent};
use widget_bridge_frame::compose_document;

use crate::state::GatewayState;

fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Check the raw body before typed parsing so a missing or non-string
/// `html` gets its own message.
fn parse_store_payload(body: Value) -> Result<StoreWidgetPayload, String> {
    match body.get("html") {
        Some(Value::String(html)) if !html.is_empty() => {}
        _ => return Err("Missing html".into()),
    }
    serde_json::from_value(body).map_err(|e| format!("Invalid widget payload: {e}"))
}

/// `POST /api/widget/store`
pub async fn store_widget(
    State(state): State<Arc<GatewayState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let payload = match body.map_err(|e| e.body_text()).and_then(|Json(b)| parse_store_payload(b)) {
        Ok(payload) => payload,
        Err(message) => {
            debug!(%message, "Rejected store request");
            #[cfg(feature = "metrics")]
            crate::metrics::record_store("rejected");
            return json_error(StatusCode::BAD_REQUEST, message);
        }
    };

    if let Some(validator) = &state.validator {
        match validator.validate(&payload).await {
            Ok(()) => {}
            Err(WidgetBridgeError::Validation(message)) => {
                debug!(%message, "Store validator rejected widget");
                #[cfg(feature = "metrics")]
                crate::metrics::record_store("rejected");
                return json_error(StatusCode::BAD_REQUEST, message);
            }
            Err(e) => {
                error!(operation = "store", %e, "Store validator failed");
                #[cfg(feature = "metrics")]
                crate::metrics::record_store("failed");
                return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store widget");
            }
        }
    }

    match state.cache.store(payload).await {
        Ok(id) => {
            #[cfg(feature = "metrics")]
            crate::metrics::record_store("stored");
            Json(json!({ "id": id })).into_response()
        }
        Err(e) => {
            error!(operation = "store", %e, "Failed to store widget");
            #[cfg(feature = "metrics")]
            crate::metrics::record_store("failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store widget")
        }
    }
}

fn render_status(status: StatusCode, body: &'static str) -> Response {
    #[cfg(feature = "metrics")]
    crate::metrics::record_render(status.as_u16());
    (status, body).into_response()
}

/// `GET /api/widget/`: the frame address was built without an id.
pub async fn render_missing_id() -> Response {
    warn!("Widget request missing id parameter");
    render_status(StatusCode::BAD_REQUEST, "Missing widget id")
}

/// `GET /api/widget/{id}`
pub async fn render_widget(State(state): State<Arc<GatewayState>>, Path(id): Path<String>) -> Response {
    if id.is_empty() {
        return render_missing_id().await;
    }

    let Some(record) = state.cache.get(&id).await else {
        warn!(id = %id, "Widget not found");
        return render_status(StatusCode::NOT_FOUND, "Widget not found or expired");
    };

    let mut options = state.render.compose.clone();
    if state.render.respect_widget_accessible && record.widget_accessible() == Some(false) {
        debug!(id = %id, "Withholding tool output from widget");
        options.expose_tool_output = false;
    }

    match compose_document(&id, &record, &options) {
        Ok(document) => {
            debug!(id = %id, bytes = document.len(), "Rendered widget");
            #[cfg(feature = "metrics")]
            crate::metrics::record_render(StatusCode::OK.as_u16());
            (state.render.document_headers(), document).into_response()
        }
        Err(e) => {
            error!(operation = "render", id = %id, %e, "Failed to render widget");
            render_status(StatusCode::INTERNAL_SERVER_ERROR, "Failed to render widget")
        }
    }
}

/// `POST <render.log_path>`: telemetry beaconed from frames.
///
/// Beacons arrive as `text/plain`, so the body is parsed regardless of its
/// content type.
pub async fn log_event(body: Bytes) -> Response {
    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            debug!(%e, "Malformed widget log payload");
            return (StatusCode::BAD_REQUEST, Json(json!({ "ok": false }))).into_response();
        }
    };

    let widget_id = body.get("id").and_then(Value::as_str).unwrap_or("unknown").to_string();
    let event = TelemetryEvent::from_value(body.get("event").cloned().unwrap_or(Value::Null));
    let payload = event.as_value();

    match event.level() {
        LogLevel::Error => error!(widget_id = %widget_id, %payload, "Widget reported error"),
        LogLevel::Warn => warn!(widget_id = %widget_id, %payload, "Widget reported warning"),
        LogLevel::Log => info!(widget_id = %widget_id, %payload, "Widget log"),
    }
    #[cfg(feature = "metrics")]
    crate::metrics::record_log_event(event.level());

    Json(json!({ "ok": true })).into_response()
}

/// `GET /health`
pub async fn health(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let uptime = chrono::Utc::now() - state.started_at;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime.num_seconds(),
        "widget_ttl_secs": state.config.cache().max_age_secs,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_store_payload() {
        assert_eq!(parse_store_payload(json!({})).unwrap_err(), "Missing html");
        assert_eq!(parse_store_payload(json!({"html": ""})).unwrap_err(), "Missing html");
        assert_eq!(parse_store_payload(json!({"html": 42})).unwrap_err(), "Missing html");
        assert!(
            parse_store_payload(json!({"html": "<p/>", "toolResponseMetadata": [1]}))
                .unwrap_err()
                .starts_with("Invalid widget payload")
        );

        let payload = parse_store_payload(json!({
            "html": "<div>hi</div>",
            "toolOutput": {"a": 1},
            "toolResponseMetadata": null
        }))
        .unwrap();
        assert_eq!(payload.tool_output, json!({"a": 1}));
        assert!(payload.tool_response_metadata.is_none());
    }
}
