//! Artifact cache contract.

use async_trait::async_trait;

use crate::error::Result;
use crate::record::{StoreWidgetPayload, WidgetRecord};

/// Key-value store mapping opaque ids to immutable widget records.
///
/// `store` and `get` may be called concurrently; every record lives under its
/// own key, so no two calls ever write the same entry.
#[async_trait]
pub trait ArtifactCache: Send + Sync {
    /// Persist a payload under a freshly minted id. Storing identical content
    /// twice yields two ids.
    async fn store(&self, payload: StoreWidgetPayload) -> Result<String>;

    /// Read a record. Absent, expired, malformed and unreadable ids are all
    /// `None`; read failures are logged, never raised.
    async fn get(&self, id: &str) -> Option<WidgetRecord>;

    /// Remove every record older than the configured maximum age, returning
    /// how many were removed. Failures are logged and swallowed.
    async fn cleanup(&self) -> usize;
}
