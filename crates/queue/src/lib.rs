//! Queue Store (component C1): the shared work queue, the 24h visited set,
//! the queue-length counter, the metrics hash, per-worker timing ring
//! buffers, and the queue-length history time series.
//!
//! `InMemoryQueueStore` is the one implementation shipped here (the real
//! backing store — Redis, an embedded KV, whatever — is out of scope per
//! the crate's purpose); it is built from the same `DashMap`-per-partition
//! plus `Mutex`-for-ordering idiom the teacher's `CrawlFrontier` uses.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;
use webcrawler_core::{CrawlError, HistoryPoint, TimingRecord};

#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Push a URL onto the FIFO iff its dedup key is not visited and not
    /// already pending. `priority` is accepted but never changes ordering
    /// (see DESIGN.md, Open Question 2).
    async fn enqueue(&self, url: &str, priority: f64) -> Result<bool, CrawlError>;

    /// Pop the oldest URL, marking its dedup key visited for the
    /// configured TTL. Returns `None` if the queue is empty.
    async fn dequeue(&self) -> Result<Option<String>, CrawlError>;

    /// Peek at up to `limit` pending URLs without consuming them.
    async fn peek(&self, limit: usize) -> Result<Vec<String>, CrawlError>;

    async fn approx_length(&self) -> Result<i64, CrawlError>;

    /// Scan-based repair of the counter against the true pending length
    /// (DESIGN.md, Open Question 1).
    async fn reset_counter(&self) -> Result<i64, CrawlError>;

    /// Drop the pending queue, the visited set, and the counter together.
    async fn clear(&self) -> Result<(), CrawlError>;

    async fn metrics_incr(&self, field: &str, delta: i64) -> Result<(), CrawlError>;
    async fn metrics_set(&self, field: &str, value: i64) -> Result<(), CrawlError>;
    async fn metrics_set_str(&self, field: &str, value: &str) -> Result<(), CrawlError>;
    async fn metrics_get_all(&self) -> Result<Vec<(String, i64)>, CrawlError>;
    async fn metrics_get_str(&self, field: &str) -> Result<Option<String>, CrawlError>;

    async fn timing_push(&self, worker_id: &str, record: TimingRecord) -> Result<(), CrawlError>;
    async fn timing_trim(&self, worker_id: &str, max_len: usize) -> Result<(), CrawlError>;
    async fn timing_range(&self, worker_id: &str, n: usize) -> Result<Vec<TimingRecord>, CrawlError>;

    async fn history_record(&self, timestamp: i64, queue_length: i64) -> Result<(), CrawlError>;
    async fn history_range(&self, from_ts: i64, to_ts: i64) -> Result<Vec<HistoryPoint>, CrawlError>;
    async fn history_evict_older_than(&self, ts: i64) -> Result<(), CrawlError>;
}

/// Dedup key with its insertion time, so visited-set membership can be
/// lazily expired without a background sweeper.
struct VisitedEntry {
    inserted_at: Instant,
}

pub struct InMemoryQueueStore {
    pending: Mutex<VecDeque<String>>,
    pending_keys: DashMap<String, ()>,
    visited: DashMap<String, VisitedEntry>,
    counter: AtomicI64,
    visited_ttl: Duration,
    metrics_int: DashMap<String, i64>,
    metrics_str: DashMap<String, String>,
    timings: DashMap<String, Mutex<VecDeque<TimingRecord>>>,
    history: Mutex<VecDeque<HistoryPoint>>,
}

impl InMemoryQueueStore {
    pub fn new(visited_ttl: Duration) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            pending_keys: DashMap::new(),
            visited: DashMap::new(),
            counter: AtomicI64::new(0),
            visited_ttl,
            metrics_int: DashMap::new(),
            metrics_str: DashMap::new(),
            timings: DashMap::new(),
            history: Mutex::new(VecDeque::new()),
        }
    }

    fn dedup_key(url: &str) -> Result<String, CrawlError> {
        let parsed = Url::parse(url).map_err(|e| CrawlError::InputInvalid(e.to_string()))?;
        Ok(webcrawler_policy::normalize(&parsed))
    }

    fn is_visited(&self, key: &str) -> bool {
        match self.visited.get(key) {
            Some(entry) => {
                if entry.inserted_at.elapsed() > self.visited_ttl {
                    drop(entry);
                    self.visited.remove(key);
                    debug!(key, "visited ttl expired");
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    }

    pub fn new_arc(visited_ttl: Duration) -> Arc<Self> {
        Arc::new(Self::new(visited_ttl))
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn enqueue(&self, url: &str, _priority: f64) -> Result<bool, CrawlError> {
        let key = Self::dedup_key(url)?;

        if self.is_visited(&key) {
            return Ok(false);
        }
        // `insert` is the atomic check-and-set: two concurrent enqueues for
        // the same key race here, but only one observes `None` and wins.
        if self.pending_keys.insert(key, ()).is_some() {
            return Ok(false);
        }

        self.pending.lock().await.push_back(url.to_string());
        self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn dequeue(&self) -> Result<Option<String>, CrawlError> {
        let url = {
            let mut q = self.pending.lock().await;
            q.pop_front()
        };
        let Some(url) = url else {
            return Ok(None);
        };

        self.counter.fetch_sub(1, Ordering::SeqCst);

        // Dequeue-time visiting (§4.6, §9): the dedup key becomes visited
        // the moment it leaves the queue, not on success.
        match Self::dedup_key(&url) {
            Ok(key) => {
                self.pending_keys.remove(&key);
                self.visited.insert(
                    key,
                    VisitedEntry {
                        inserted_at: Instant::now(),
                    },
                );
            }
            Err(e) => warn!(url = %url, error = %e, "dequeued url failed to re-normalize"),
        }

        Ok(Some(url))
    }

    async fn peek(&self, limit: usize) -> Result<Vec<String>, CrawlError> {
        let q = self.pending.lock().await;
        Ok(q.iter().take(limit).cloned().collect())
    }

    async fn approx_length(&self) -> Result<i64, CrawlError> {
        Ok(self.counter.load(Ordering::SeqCst))
    }

    async fn reset_counter(&self) -> Result<i64, CrawlError> {
        let len = self.pending.lock().await.len() as i64;
        self.counter.store(len, Ordering::SeqCst);
        Ok(len)
    }

    async fn clear(&self) -> Result<(), CrawlError> {
        self.pending.lock().await.clear();
        self.pending_keys.clear();
        self.visited.clear();
        self.counter.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn metrics_incr(&self, field: &str, delta: i64) -> Result<(), CrawlError> {
        *self.metrics_int.entry(field.to_string()).or_insert(0) += delta;
        Ok(())
    }

    async fn metrics_set(&self, field: &str, value: i64) -> Result<(), CrawlError> {
        self.metrics_int.insert(field.to_string(), value);
        Ok(())
    }

    async fn metrics_set_str(&self, field: &str, value: &str) -> Result<(), CrawlError> {
        self.metrics_str.insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn metrics_get_all(&self) -> Result<Vec<(String, i64)>, CrawlError> {
        Ok(self
            .metrics_int
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect())
    }

    async fn metrics_get_str(&self, field: &str) -> Result<Option<String>, CrawlError> {
        Ok(self.metrics_str.get(field).map(|e| e.value().clone()))
    }

    async fn timing_push(&self, worker_id: &str, record: TimingRecord) -> Result<(), CrawlError> {
        let buf = self
            .timings
            .entry(worker_id.to_string())
            .or_insert_with(|| Mutex::new(VecDeque::new()));
        buf.lock().await.push_front(record);
        Ok(())
    }

    async fn timing_trim(&self, worker_id: &str, max_len: usize) -> Result<(), CrawlError> {
        if let Some(buf) = self.timings.get(worker_id) {
            let mut buf = buf.lock().await;
            while buf.len() > max_len {
                buf.pop_back();
            }
        }
        Ok(())
    }

    async fn timing_range(&self, worker_id: &str, n: usize) -> Result<Vec<TimingRecord>, CrawlError> {
        match self.timings.get(worker_id) {
            Some(buf) => Ok(buf.lock().await.iter().take(n).cloned().collect()),
            None => Ok(Vec::new()),
        }
    }

    async fn history_record(&self, timestamp: i64, queue_length: i64) -> Result<(), CrawlError> {
        self.history.lock().await.push_back(HistoryPoint {
            timestamp,
            queue_length,
        });
        Ok(())
    }

    async fn history_range(&self, from_ts: i64, to_ts: i64) -> Result<Vec<HistoryPoint>, CrawlError> {
        Ok(self
            .history
            .lock()
            .await
            .iter()
            .filter(|p| p.timestamp >= from_ts && p.timestamp <= to_ts)
            .copied()
            .collect())
    }

    async fn history_evict_older_than(&self, ts: i64) -> Result<(), CrawlError> {
        self.history.lock().await.retain(|p| p.timestamp >= ts);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webcrawler_core::StepTimings;

    fn store() -> InMemoryQueueStore {
        InMemoryQueueStore::new(Duration::from_secs(24 * 3600))
    }

    #[tokio::test]
    async fn enqueue_then_dequeue_roundtrips() {
        let q = store();
        assert!(q.enqueue("https://example.com/a", 1.0).await.unwrap());
        assert_eq!(q.approx_length().await.unwrap(), 1);
        let got = q.dequeue().await.unwrap();
        assert_eq!(got.as_deref(), Some("https://example.com/a"));
        assert_eq!(q.approx_length().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_rejected_while_pending() {
        let q = store();
        assert!(q.enqueue("https://example.com/a", 1.0).await.unwrap());
        assert!(!q.enqueue("https://example.com/a", 1.0).await.unwrap());
    }

    #[tokio::test]
    async fn dedup_rejects_reenqueue_after_dequeue_within_ttl() {
        let q = store();
        q.enqueue("https://example.com/a", 1.0).await.unwrap();
        q.dequeue().await.unwrap();
        assert!(!q.enqueue("https://example.com/a", 1.0).await.unwrap());
    }

    #[tokio::test]
    async fn fifo_ordering_is_preserved() {
        let q = store();
        q.enqueue("https://example.com/a", 1.0).await.unwrap();
        q.enqueue("https://example.com/b", 1.0).await.unwrap();
        assert_eq!(q.dequeue().await.unwrap().as_deref(), Some("https://example.com/a"));
        assert_eq!(q.dequeue().await.unwrap().as_deref(), Some("https://example.com/b"));
    }

    #[tokio::test]
    async fn dequeue_on_empty_queue_returns_none() {
        let q = store();
        assert_eq!(q.dequeue().await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_resets_everything() {
        let q = store();
        q.enqueue("https://example.com/a", 1.0).await.unwrap();
        q.clear().await.unwrap();
        assert_eq!(q.approx_length().await.unwrap(), 0);
        assert!(q.enqueue("https://example.com/a", 1.0).await.unwrap());
    }

    #[tokio::test]
    async fn reset_counter_repairs_drift() {
        let q = store();
        q.enqueue("https://example.com/a", 1.0).await.unwrap();
        q.counter.store(999, Ordering::SeqCst);
        let repaired = q.reset_counter().await.unwrap();
        assert_eq!(repaired, 1);
        assert_eq!(q.approx_length().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn metrics_incr_and_get_all() {
        let q = store();
        q.metrics_incr("completed_urls", 1).await.unwrap();
        q.metrics_incr("completed_urls", 2).await.unwrap();
        let all: std::collections::HashMap<_, _> = q.metrics_get_all().await.unwrap().into_iter().collect();
        assert_eq!(all.get("completed_urls"), Some(&3));
    }

    #[tokio::test]
    async fn timing_ring_buffer_trims_to_max_len() {
        let q = store();
        for i in 0..5 {
            q.timing_push(
                "worker_1",
                TimingRecord {
                    url: format!("https://example.com/{i}"),
                    timestamp: i,
                    timings: StepTimings::default(),
                    error: None,
                    total_time_ms: 10,
                },
            )
            .await
            .unwrap();
        }
        q.timing_trim("worker_1", 3).await.unwrap();
        let range = q.timing_range("worker_1", 10).await.unwrap();
        assert_eq!(range.len(), 3);
        // head-inserted: most recent (i=4) first
        assert_eq!(range[0].timestamp, 4);
    }

    #[tokio::test]
    async fn history_range_and_eviction() {
        let q = store();
        q.history_record(100, 5).await.unwrap();
        q.history_record(200, 3).await.unwrap();
        q.history_record(300, 1).await.unwrap();
        let range = q.history_range(150, 300).await.unwrap();
        assert_eq!(range.len(), 2);
        q.history_evict_older_than(200).await.unwrap();
        let remaining = q.history_range(0, 1000).await.unwrap();
        assert_eq!(remaining.len(), 2);
    }

    #[tokio::test]
    async fn peek_does_not_consume() {
        let q = store();
        q.enqueue("https://example.com/a", 1.0).await.unwrap();
        let peeked = q.peek(10).await.unwrap();
        assert_eq!(peeked, vec!["https://example.com/a".to_string()]);
        assert_eq!(q.approx_length().await.unwrap(), 1);
    }
}
