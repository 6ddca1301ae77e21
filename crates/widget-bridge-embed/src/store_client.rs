//! Store operations the embed controller persists widgets through.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use widget_bridge_core::cache::ArtifactCache;
use widget_bridge_core::error::{Result, WidgetBridgeError};
use widget_bridge_core::record::{StoreWidgetPayload, StoreWidgetResult};

/// Persists a widget and reports where the frame can load it from.
#[async_trait]
pub trait WidgetStore: Send + Sync {
    async fn store(&self, payload: &StoreWidgetPayload) -> Result<StoreWidgetResult>;
}

/// Stores through the gateway's `POST <store_path>` endpoint.
#[derive(Debug, Clone)]
pub struct HttpWidgetStore {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpWidgetStore {
    pub fn new(base_url: &str, store_path: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, store_path)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, store_path: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), store_path),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl WidgetStore for HttpWidgetStore {
    async fn store(&self, payload: &StoreWidgetPayload) -> Result<StoreWidgetResult> {
        debug!(endpoint = %self.endpoint, html_len = payload.html.len(), "Storing widget");

        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| WidgetBridgeError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WidgetBridgeError::Http(format!(
                "Failed to store widget. Status: {status}: {body}"
            )));
        }

        response
            .json::<StoreWidgetResult>()
            .await
            .map_err(|e| WidgetBridgeError::Http(format!("invalid store response: {e}")))
    }
}

/// Stores straight into an in-process cache, for hosts that embed the
/// gateway rather than talk to it.
#[derive(Clone)]
pub struct CacheWidgetStore {
    cache: Arc<dyn ArtifactCache>,
}

impl CacheWidgetStore {
    pub fn new(cache: Arc<dyn ArtifactCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl WidgetStore for CacheWidgetStore {
    async fn store(&self, payload: &StoreWidgetPayload) -> Result<StoreWidgetResult> {
        let id = self.cache.store(payload.clone()).await?;
        Ok(StoreWidgetResult::from_id(id))
    }
}
