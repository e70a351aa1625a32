//! Metrics Publisher (component C9): the 60s queue-length history sampler,
//! grounded on `original_source/redis_metrics_tracker.py` (sample, record,
//! evict anything older than the 24h window, sleep, repeat) and
//! `queue_trend_setup.py` for the history key's shape.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use webcrawler_core::CrawlError;
use webcrawler_queue::QueueStore;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_HISTORY_WINDOW: Duration = Duration::from_secs(24 * 3600);

/// One sample-record-evict cycle, pulled out of the spawned loop so it can
/// be exercised directly in tests.
pub async fn tick(queue: &dyn QueueStore, history_window: Duration) -> Result<i64, CrawlError> {
    let length = queue.approx_length().await?;
    let now = chrono::Utc::now().timestamp();
    queue.history_record(now, length).await?;
    queue.history_evict_older_than(now - history_window.as_secs() as i64).await?;
    Ok(length)
}

/// Spawns the publisher loop. A failed tick is logged and does not stop the
/// loop; there's no state carried between ticks to corrupt.
pub fn spawn(
    queue: Arc<dyn QueueStore>,
    tick_interval: Duration,
    history_window: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_interval);
        loop {
            interval.tick().await;
            match tick(queue.as_ref(), history_window).await {
                Ok(length) => info!(queue_length = length, "queue metrics tick"),
                Err(e) => warn!(error = %e, "queue metrics tick failed"),
            }
        }
    })
}
