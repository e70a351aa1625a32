//! Worker Pool (component C7): spawns, supervises, scales, and terminates
//! workers; aggregates their stats. Grounded on
//! `original_source/crawler_worker.py`'s `WorkerManager` (idempotent
//! start/stop, auto-numbered `add_worker`, per-worker stats aggregation).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use webcrawler_content::ContentStore;
use webcrawler_core::{CrawlError, WorkerStats};
use webcrawler_fetch::Fetcher;
use webcrawler_queue::QueueStore;

use crate::worker::{Worker, WorkerRuntimeConfig};

struct WorkerHandle {
    stop_tx: watch::Sender<bool>,
    alive: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

pub struct WorkerPool {
    queue: Arc<dyn QueueStore>,
    content: Arc<dyn ContentStore>,
    fetcher: Arc<Fetcher>,
    runtime_config: WorkerRuntimeConfig,
    drain_window: Duration,
    workers: Mutex<HashMap<String, WorkerHandle>>,
    next_id: AtomicUsize,
    running: AtomicBool,
}

#[derive(Debug, Clone, Default)]
pub struct WorkerPoolStats {
    pub total_workers: usize,
    pub running: bool,
    pub workers: Vec<WorkerStats>,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<dyn QueueStore>,
        content: Arc<dyn ContentStore>,
        fetcher: Arc<Fetcher>,
        runtime_config: WorkerRuntimeConfig,
        drain_window: Duration,
    ) -> Self {
        Self {
            queue,
            content,
            fetcher,
            runtime_config,
            drain_window,
            workers: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            running: AtomicBool::new(false),
        }
    }

    /// Idempotent: starting an already-running pool is a no-op.
    pub async fn start(&self, num_workers: usize) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        for _ in 0..num_workers {
            self.spawn_worker().await;
        }
    }

    /// Idempotent: stopping a non-running pool is a no-op. Each worker is
    /// given up to `drain_window` to finish its in-flight URL before this
    /// returns.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut workers = self.workers.lock().await;
        for (id, handle) in workers.drain() {
            let _ = handle.stop_tx.send(true);
            if tokio::time::timeout(self.drain_window, handle.join)
                .await
                .is_err()
            {
                warn!(worker_id = %id, "worker did not drain within window");
            }
        }
    }

    pub async fn add_worker(&self) -> String {
        self.running.store(true, Ordering::SeqCst);
        self.spawn_worker().await
    }

    pub async fn remove_worker(&self, id: &str) -> bool {
        let handle = self.workers.lock().await.remove(id);
        let Some(handle) = handle else {
            return false;
        };
        let _ = handle.stop_tx.send(true);
        if tokio::time::timeout(self.drain_window, handle.join)
            .await
            .is_err()
        {
            warn!(worker_id = %id, "worker did not drain within window on removal");
        }
        true
    }

    async fn spawn_worker(&self) -> String {
        let id = format!("worker_{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let (stop_tx, stop_rx) = watch::channel(false);
        let alive = Arc::new(AtomicBool::new(false));

        let worker = Worker::new(
            id.clone(),
            self.queue.clone(),
            self.content.clone(),
            self.fetcher.clone(),
            self.runtime_config.clone(),
            stop_rx,
            alive.clone(),
        );
        let join = tokio::spawn(worker.run());

        info!(worker_id = %id, "worker started");
        self.workers.lock().await.insert(
            id.clone(),
            WorkerHandle {
                stop_tx,
                alive,
                join,
            },
        );
        id
    }

    pub async fn stats(&self) -> Result<WorkerPoolStats, CrawlError> {
        let metrics: HashMap<String, i64> = self.queue.metrics_get_all().await?.into_iter().collect();
        let workers = self.workers.lock().await;
        let mut out = Vec::with_capacity(workers.len());
        for (id, handle) in workers.iter() {
            let get = |field: &str| metrics.get(&format!("{id}:{field}")).copied().unwrap_or(0);
            out.push(WorkerStats {
                worker_id: id.clone(),
                processed_urls: get("processed_urls"),
                failed_urls: get("failed_urls"),
                started_at: get("started_at"),
                alive: handle.alive.load(Ordering::SeqCst),
            });
        }
        Ok(WorkerPoolStats {
            total_workers: out.len(),
            running: self.running.load(Ordering::SeqCst),
            workers: out,
        })
    }
}
