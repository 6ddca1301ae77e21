//! Recurring cleanup task.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use widget_bridge_core::cache::ArtifactCache;

/// Run `cache.cleanup()` every `period` until the token is cancelled or the
/// cache has been dropped. The first sweep happens one full period after
/// spawning.
pub(crate) fn spawn<C>(cache: Weak<C>, period: Duration, shutdown: CancellationToken) -> JoinHandle<()>
where
    C: ArtifactCache + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_secs = period.as_secs_f64(), "Widget cache sweeper started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(cache) = cache.upgrade() else { break };
                    let removed = cache.cleanup().await;
                    debug!(removed, "Periodic widget sweep");
                }
            }
        }

        debug!("Widget cache sweeper stopped");
    })
}
