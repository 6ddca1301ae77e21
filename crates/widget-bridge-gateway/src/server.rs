//! Axum-based HTTP server.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::handlers::{health, log_event, render_missing_id, render_widget, store_widget};
use crate::state::GatewayState;

/// Build the router. The telemetry route follows `render.log_path`.
pub fn router(state: Arc<GatewayState>) -> Router {
    let log_path = state.render.compose.log_path.clone();

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/api/widget/store", post(store_widget))
        .route("/api/widget/", get(render_missing_id))
        .route("/api/widget/{id}", get(render_widget));

    if log_path.starts_with('/') {
        app = app.route(&log_path, post(log_event));
    } else if !log_path.is_empty() {
        warn!(log_path = %log_path, "Ignoring relative telemetry path");
    }

    #[cfg(feature = "metrics")]
    {
        if state.metrics.is_some() {
            app = app.route("/metrics", get(metrics_handler));
        }
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Start the gateway HTTP server and run until Ctrl+C.
pub async fn start_gateway(state: Arc<GatewayState>, bind: &str, port: u16) -> anyhow::Result<()> {
    let app = router(state);

    let addr = format!("{bind}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Widget gateway listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[cfg(feature = "metrics")]
async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<Arc<GatewayState>>,
) -> impl axum::response::IntoResponse {
    state.metrics.as_ref().map(|h| h.render()).unwrap_or_default()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(%e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use widget_bridge_cache::{FsCacheOptions, FsWidgetCache};
    use widget_bridge_core::config::Config;

    use super::*;

    async fn app(config: Config) -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsWidgetCache::open(
            FsCacheOptions::new(dir.path()).with_cleanup_interval(Duration::ZERO),
        )
        .await
        .unwrap();
        let state = GatewayState::new(Arc::new(config), cache).unwrap();
        (router(Arc::new(state)), dir)
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_store_then_render() {
        let (app, _dir) = app(Config::default()).await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/widget/store",
                json!({"html": "<div>hi</div>", "toolOutput": {"a": 1}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stored: Value = serde_json::from_str(&body_text(response).await).unwrap();
        let id = stored["id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(Request::get(format!("/api/widget/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "SAMEORIGIN");
        assert!(response.headers().contains_key(header::CONTENT_SECURITY_POLICY));
        let html = body_text(response).await;
        assert!(html.contains("<body><div>hi</div></body>"));
    }

    #[tokio::test]
    async fn test_missing_and_unknown_ids() {
        let (app, _dir) = app(Config::default()).await;

        let response = app
            .clone()
            .oneshot(Request::get("/api/widget/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Missing widget id");

        let response = app
            .oneshot(Request::get("/api/widget/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "Widget not found or expired");
    }

    #[tokio::test]
    async fn test_store_rejections() {
        let (app, _dir) = app(Config::default()).await;

        for body in [json!({}), json!({"html": 7}), json!({"toolOutput": {}})] {
            let response = app.clone().oneshot(post_json("/api/widget/store", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
            assert_eq!(body, json!({"error": "Missing html"}));
        }

        let response = app
            .oneshot(
                Request::post("/api/widget/store")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_log_accepts_beacon_bodies() {
        let (app, _dir) = app(Config::default()).await;

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/widget/log")
                    .header(header::CONTENT_TYPE, "text/plain;charset=UTF-8")
                    .body(Body::from(r#"{"id":"abc","event":{"level":"warn","args":["x"]}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, r#"{"ok":true}"#);

        let response = app
            .oneshot(Request::post("/api/widget/log").body(Body::from("nope")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_custom_log_path() {
        let config: Config = json5::from_str(r#"{ render: { log_path: "/telemetry" } }"#).unwrap();
        let (app, _dir) = app(config).await;

        let response = app
            .oneshot(post_json("/telemetry", json!({"id": "a", "event": "hello"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
