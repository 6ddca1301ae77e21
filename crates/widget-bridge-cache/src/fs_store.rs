//! JSON-file widget cache.
//!
//! Layout: `<dir>/<id>.json`, one serialized `WidgetRecord` per file. Writes
//! go to `<id>.json.tmp` and are renamed into place, so a reader sees either
//! the whole record or nothing.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use widget_bridge_core::cache::ArtifactCache;
use widget_bridge_core::config::CacheConfig;
use widget_bridge_core::error::{Result, WidgetBridgeError};
use widget_bridge_core::record::{StoreWidgetPayload, WidgetRecord};

use crate::id::{self, IdFactory, is_valid_id};
use crate::sweeper;

const RECORD_EXT: &str = ".json";
const TMP_EXT: &str = ".json.tmp";

/// Construction options for [`FsWidgetCache`].
#[derive(Clone)]
pub struct FsCacheOptions {
    pub cache_dir: PathBuf,
    pub max_age: Duration,
    /// Zero disables the recurring sweep.
    pub cleanup_interval: Duration,
    pub id_factory: Arc<dyn IdFactory>,
}

impl FsCacheOptions {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            max_age: Duration::from_secs(30 * 60),
            cleanup_interval: Duration::from_secs(5 * 60),
            id_factory: Arc::new(id::Base36IdFactory::default()),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            cache_dir: config.resolve_dir(),
            max_age: config.max_age(),
            cleanup_interval: config.cleanup_interval(),
            id_factory: Arc::from(id::factory_for(config.id_format)),
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn with_id_factory(mut self, factory: Arc<dyn IdFactory>) -> Self {
        self.id_factory = factory;
        self
    }
}

/// Filesystem-backed [`ArtifactCache`].
///
/// Construct once per process with [`FsWidgetCache::open`] and share the
/// returned `Arc`. The recurring sweep is started there and stops when the
/// last `Arc` is dropped.
pub struct FsWidgetCache {
    dir: PathBuf,
    max_age: Duration,
    id_factory: Arc<dyn IdFactory>,
    shutdown: CancellationToken,
}

impl FsWidgetCache {
    /// Create the cache directory, sweep it once, and start the recurring sweep.
    ///
    /// Fails only if the directory cannot be created; callers should treat
    /// that as fatal.
    pub async fn open(options: FsCacheOptions) -> Result<Arc<Self>> {
        let dir = options.cache_dir;
        if !dir.exists() {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| WidgetBridgeError::storage("init", dir.display().to_string(), e))?;
            info!(dir = %dir.display(), "Created widget cache directory");
        }

        let cache = Arc::new(Self {
            dir,
            max_age: options.max_age,
            id_factory: options.id_factory,
            shutdown: CancellationToken::new(),
        });

        cache.cleanup().await;

        if !options.cleanup_interval.is_zero() {
            sweeper::spawn(
                Arc::downgrade(&cache),
                options.cleanup_interval,
                cache.shutdown.child_token(),
            );
        }

        Ok(cache)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}{RECORD_EXT}"))
    }

    fn is_expired(&self, age: chrono::Duration) -> bool {
        chrono::Duration::from_std(self.max_age)
            .map(|max| age > max)
            .unwrap_or(false)
    }

    async fn mint_id(&self) -> Result<String> {
        for _ in 0..3 {
            let id = self.id_factory.next_id();
            if !is_valid_id(&id) {
                return Err(WidgetBridgeError::Validation(format!(
                    "id factory produced an unusable id '{id}'"
                )));
            }
            if !tokio::fs::try_exists(self.entry_path(&id)).await.unwrap_or(false) {
                return Ok(id);
            }
            warn!(id = %id, "Widget id collision, minting another");
        }
        Err(WidgetBridgeError::Validation(
            "id factory keeps producing ids already in use".into(),
        ))
    }

    /// Whether the entry at `path` is past its maximum age.
    ///
    /// Records are aged by their stored timestamp; entries whose timestamp
    /// cannot be read fall back to the file's modification time.
    async fn entry_expired(&self, path: &Path, now: DateTime<Utc>) -> std::io::Result<bool> {
        if path.to_string_lossy().ends_with(RECORD_EXT) {
            let data = tokio::fs::read(path).await?;
            if let Ok(record) = serde_json::from_slice::<WidgetRecord>(&data) {
                return Ok(self.is_expired(record.age(now)));
            }
        }
        let modified = tokio::fs::metadata(path).await?.modified()?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        Ok(age > self.max_age)
    }

    async fn sweep(&self) -> std::io::Result<usize> {
        let now = Utc::now();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(RECORD_EXT) && !name.ends_with(TMP_EXT) {
                continue;
            }

            match self.entry_expired(&path, now).await {
                Ok(true) => match tokio::fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    // Already gone: another sweep got there first.
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!(file = %name, %e, "Failed to remove stale widget"),
                },
                Ok(false) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(file = %name, %e, "Failed to inspect cached widget"),
            }
        }

        Ok(removed)
    }
}

impl Drop for FsWidgetCache {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl ArtifactCache for FsWidgetCache {
    async fn store(&self, payload: StoreWidgetPayload) -> Result<String> {
        let id = self.mint_id().await?;

        let mut record = WidgetRecord::from_payload(payload);
        // Persisted at millisecond precision; keep the in-memory value identical.
        if let Some(ts) = DateTime::from_timestamp_millis(record.timestamp.timestamp_millis()) {
            record.timestamp = ts;
        }
        let data = serde_json::to_vec(&record)?;

        let path = self.entry_path(&id);
        let tmp = self.dir.join(format!("{id}{TMP_EXT}"));
        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|e| WidgetBridgeError::storage("store", &id, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(WidgetBridgeError::storage("store", &id, e));
        }

        info!(
            id = %id,
            path = %path.display(),
            html_len = record.html.len(),
            "Stored widget"
        );
        Ok(id)
    }

    async fn get(&self, id: &str) -> Option<WidgetRecord> {
        if !is_valid_id(id) {
            debug!(id = %id, "Rejected malformed widget id");
            return None;
        }

        let path = self.entry_path(id);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(id = %id, "Widget not found");
                return None;
            }
            Err(e) => {
                warn!(operation = "get", id = %id, %e, "Failed to read cached widget");
                return None;
            }
        };

        match serde_json::from_slice::<WidgetRecord>(&data) {
            Ok(record) => {
                debug!(id = %id, html_len = record.html.len(), "Retrieved widget");
                Some(record)
            }
            Err(e) => {
                warn!(operation = "get", id = %id, %e, "Corrupt cached widget");
                None
            }
        }
    }

    async fn cleanup(&self) -> usize {
        match self.sweep().await {
            Ok(removed) => {
                if removed > 0 {
                    info!(removed, "Removed stale widgets");
                }
                removed
            }
            Err(e) => {
                error!(operation = "cleanup", dir = %self.dir.display(), %e, "Widget cache sweep failed");
                0
            }
        }
    }
}
