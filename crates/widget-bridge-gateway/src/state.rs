//! Gateway shared state.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use widget_bridge_core::cache::ArtifactCache;
use widget_bridge_core::config::Config;
use widget_bridge_core::error::Result;
use widget_bridge_core::record::StoreWidgetPayload;

use crate::headers::RenderOptions;

/// Hook run on every store request before the payload is persisted.
/// Returning `WidgetBridgeError::Validation` rejects it with a 400.
#[async_trait]
pub trait StoreValidator: Send + Sync {
    async fn validate(&self, payload: &StoreWidgetPayload) -> Result<()>;
}

/// Shared gateway state accessible from all handlers.
pub struct GatewayState {
    pub config: Arc<Config>,
    pub cache: Arc<dyn ArtifactCache>,
    pub render: RenderOptions,
    pub validator: Option<Arc<dyn StoreValidator>>,
    pub started_at: DateTime<Utc>,
    #[cfg(feature = "metrics")]
    pub metrics: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl GatewayState {
    pub fn new(config: Arc<Config>, cache: Arc<dyn ArtifactCache>) -> Result<Self> {
        let render = RenderOptions::from_config(&config.render())?;
        Ok(Self {
            config,
            cache,
            render,
            validator: None,
            started_at: Utc::now(),
            #[cfg(feature = "metrics")]
            metrics: None,
        })
    }

    pub fn with_validator(mut self, validator: Arc<dyn StoreValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, handle: metrics_exporter_prometheus::PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
