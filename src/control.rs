//! Control Plane (component C8): the §6 operations as plain async methods
//! over the injected stores and pool. No HTTP server lives here — the CLI
//! is the only caller, per the explicit Non-goal on the HTTP/dashboard
//! surface. Grounded on `original_source/redis_queue_manager.py`'s
//! `get_queue_state`/`clear_queue`/`get_health_status` and
//! `crawler_worker.py::WorkerManager` for the operation shapes.

use std::sync::Arc;

use webcrawler_content::{ContentStore, StoredPage};
use webcrawler_core::{CrawlError, HistoryPoint, QueueStats};
use webcrawler_queue::QueueStore;
use webcrawler_worker::{WorkerPool, WorkerPoolStats};

pub struct ControlPlane {
    queue: Arc<dyn QueueStore>,
    content: Arc<dyn ContentStore>,
    pool: Arc<WorkerPool>,
}

#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub queue_reachable: bool,
    pub content_reachable: bool,
    pub queue_stats: QueueStats,
}

impl ControlPlane {
    pub fn new(queue: Arc<dyn QueueStore>, content: Arc<dyn ContentStore>, pool: Arc<WorkerPool>) -> Self {
        Self { queue, content, pool }
    }

    /// `POST /enqueue`. Returns `Ok(false)` (not an error) when the URL is
    /// already visited within 24h or already pending.
    pub async fn enqueue(&self, url: &str) -> Result<bool, CrawlError> {
        url::Url::parse(url).map_err(|e| CrawlError::InputInvalid(e.to_string()))?;
        self.queue.enqueue(url, 1.0).await
    }

    /// `GET /queue/stats`.
    pub async fn queue_stats(&self) -> Result<QueueStats, CrawlError> {
        let metrics: std::collections::HashMap<_, _> =
            self.queue.metrics_get_all().await?.into_iter().collect();
        let get = |field: &str| metrics.get(field).copied().unwrap_or(0);
        Ok(QueueStats {
            total_urls: get("total_urls"),
            queued_urls: self.queue.approx_length().await?,
            processing_urls: 0,
            completed_urls: get("completed_urls"),
            failed_urls: get("failed_urls"),
        })
    }

    /// `GET /queue/pending?limit=N`.
    pub async fn queue_pending(&self, limit: usize) -> Result<Vec<String>, CrawlError> {
        self.queue.peek(limit).await
    }

    /// `POST /queue/clear`.
    pub async fn queue_clear(&self) -> Result<(), CrawlError> {
        self.queue.clear().await
    }

    /// `GET /queue/history`: ordered `{timestamp, queue_length}` for the
    /// last 24h.
    pub async fn queue_history(&self) -> Result<Vec<HistoryPoint>, CrawlError> {
        let now = chrono::Utc::now().timestamp();
        self.queue.history_range(now - 24 * 3600, now).await
    }

    pub async fn workers_start(&self, num_workers: usize) {
        self.pool.start(num_workers).await;
    }

    pub async fn workers_stop(&self) {
        self.pool.stop().await;
    }

    pub async fn workers_add(&self) -> String {
        self.pool.add_worker().await
    }

    pub async fn workers_remove(&self, id: &str) -> bool {
        self.pool.remove_worker(id).await
    }

    /// `GET /workers/stats`.
    pub async fn workers_stats(&self) -> Result<WorkerPoolStats, CrawlError> {
        self.pool.stats().await
    }

    /// `GET /health`. Repairs the queue counter via a scan when it has
    /// drifted from the true pending length (Open Question 1, DESIGN.md).
    pub async fn health(&self) -> Result<HealthStatus, CrawlError> {
        let approx = self.queue.approx_length().await?;
        let scanned = self.queue.reset_counter().await?;
        if approx != scanned {
            tracing::warn!(approx, scanned, "queue counter drift detected, repaired by scan");
        }
        let queue_stats = self.queue_stats().await?;
        let content_reachable = self.content.count_pages().await.is_ok();
        Ok(HealthStatus {
            queue_reachable: true,
            content_reachable,
            queue_stats,
        })
    }

    /// `GET /content?limit=L&offset=O`.
    pub async fn content_list(&self, offset: i64, limit: i64) -> Result<Vec<StoredPage>, CrawlError> {
        self.content.list_pages(offset, limit).await
    }

    /// `GET /content/html?url=U`.
    pub async fn content_html(&self, url: &str) -> Result<Option<String>, CrawlError> {
        Ok(self.content.get_page(url).await?.map(|p| p.html))
    }
}
