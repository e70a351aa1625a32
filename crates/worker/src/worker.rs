//! Worker (component C6): the per-URL state machine
//! `IDLE -> CLASSIFY -> FETCH -> PARSE -> PERSIST -> DISCOVER -> METRICS`,
//! with the consecutive-failure circuit breaker and the ring-buffer timing
//! records of §4.6. Grounded on the teacher's per-network `tokio::spawn`
//! worker loop in `src/crawl.rs` (select!-on-shutdown shape) and on
//! `original_source/crawler_worker_optimized.py` for the circuit breaker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use url::Url;
use webcrawler_content::{ContentStore, PageUpsert};
use webcrawler_core::{CrawlError, StepTimings, TimingRecord};
use webcrawler_fetch::Fetcher;
use webcrawler_queue::QueueStore;

#[derive(Debug, Clone)]
pub struct WorkerRuntimeConfig {
    pub links_per_page_cap: usize,
    pub ring_buffer_size: usize,
    pub consecutive_fail_threshold: u32,
    pub circuit_backoff: Duration,
    pub idle_poll: Duration,
    pub extra_denied_keywords: Vec<String>,
}

pub struct Worker {
    pub id: String,
    queue: Arc<dyn QueueStore>,
    content: Arc<dyn ContentStore>,
    fetcher: Arc<Fetcher>,
    config: WorkerRuntimeConfig,
    stop_rx: watch::Receiver<bool>,
    alive: Arc<AtomicBool>,
}

impl Worker {
    pub fn new(
        id: String,
        queue: Arc<dyn QueueStore>,
        content: Arc<dyn ContentStore>,
        fetcher: Arc<Fetcher>,
        config: WorkerRuntimeConfig,
        stop_rx: watch::Receiver<bool>,
        alive: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            queue,
            content,
            fetcher,
            config,
            stop_rx,
            alive,
        }
    }

    fn key(&self, field: &str) -> String {
        format!("{}:{}", self.id, field)
    }

    /// The worker's main loop. Runs until `stop_rx` observes `true`,
    /// checked between state-machine steps and whenever the queue is idle.
    pub async fn run(mut self) {
        self.alive.store(true, Ordering::SeqCst);
        let now = chrono::Utc::now().timestamp();
        let _ = self.queue.metrics_set(&self.key("processed_urls"), 0).await;
        let _ = self.queue.metrics_set(&self.key("failed_urls"), 0).await;
        let _ = self.queue.metrics_set(&self.key("started_at"), now).await;

        let mut consecutive_failures: u32 = 0;

        loop {
            if *self.stop_rx.borrow() {
                break;
            }

            let dequeued = match self.queue.dequeue().await {
                Ok(v) => v,
                Err(e) => {
                    warn!(worker_id = %self.id, error = %e, "dequeue failed");
                    None
                }
            };

            let Some(raw_url) = dequeued else {
                tokio::select! {
                    _ = self.stop_rx.changed() => {}
                    _ = tokio::time::sleep(self.config.idle_poll) => {}
                }
                continue;
            };

            match self.process_url(&raw_url).await {
                Outcome::Success => {
                    consecutive_failures = 0;
                }
                Outcome::Skipped => {}
                Outcome::Rejected => {}
                Outcome::Failed => {
                    consecutive_failures += 1;
                    if consecutive_failures >= self.config.consecutive_fail_threshold {
                        warn!(
                            worker_id = %self.id,
                            threshold = self.config.consecutive_fail_threshold,
                            "consecutive failure threshold reached, cooling down"
                        );
                        tokio::select! {
                            _ = self.stop_rx.changed() => {}
                            _ = tokio::time::sleep(self.config.circuit_backoff) => {}
                        }
                        consecutive_failures = 0;
                    }
                }
            }
        }

        self.alive.store(false, Ordering::SeqCst);
    }

    async fn process_url(&self, raw_url: &str) -> Outcome {
        let total_start = std::time::Instant::now();
        let mut timings = StepTimings::default();

        // CLASSIFY
        let Ok(url) = Url::parse(raw_url) else {
            return Outcome::Rejected;
        };
        if !webcrawler_policy::is_allowed(&url, &self.config.extra_denied_keywords) {
            return Outcome::Rejected;
        }

        // FETCH
        let fetch_start = std::time::Instant::now();
        let fetched = self.fetcher.fetch(&url).await;
        timings.fetch_ms = fetch_start.elapsed().as_millis() as u64;

        let fetched = match fetched {
            Ok(f) => f,
            Err(CrawlError::SkippedNonHtml(ct)) => {
                info!(worker_id = %self.id, url = %raw_url, content_type = %ct, "skipped non-html");
                return Outcome::Skipped;
            }
            Err(CrawlError::BodyTooLarge { size, max }) => {
                info!(worker_id = %self.id, url = %raw_url, size, max, "skipped oversized body");
                return Outcome::Skipped;
            }
            Err(e) => {
                self.record_failure(raw_url, "fetch", &e, timings, total_start).await;
                return Outcome::Failed;
            }
        };

        // PARSE
        let parse_start = std::time::Instant::now();
        let processed = webcrawler_html::process_html(&fetched.body, &url);
        timings.parse_ms = parse_start.elapsed().as_millis() as u64;

        let processed = match processed {
            Ok(p) => p,
            Err(e) => {
                self.record_failure(raw_url, "parse", &e, timings, total_start).await;
                return Outcome::Failed;
            }
        };

        // PERSIST
        let save_start = std::time::Instant::now();
        let persisted = self
            .content
            .upsert_page(PageUpsert {
                url: raw_url.to_string(),
                title: processed.title.clone(),
                text: processed.text.clone(),
                html: fetched.body.clone(),
                parent_url: None,
            })
            .await;
        timings.save_ms = save_start.elapsed().as_millis() as u64;

        if let Err(e) = persisted {
            let store_err = CrawlError::Store(e.to_string());
            self.record_failure(raw_url, "persist", &store_err, timings, total_start).await;
            return Outcome::Failed;
        }

        // DISCOVER
        let discover_start = std::time::Instant::now();
        let mut discovered = 0i64;
        for link in processed.links.iter().take(self.config.links_per_page_cap) {
            match self.queue.enqueue(link, 1.0).await {
                Ok(true) => discovered += 1,
                Ok(false) => {}
                Err(e) => warn!(worker_id = %self.id, url = %link, error = %e, "enqueue failed"),
            }
        }
        timings.add_links_ms = discover_start.elapsed().as_millis() as u64;
        if discovered > 0 {
            let _ = self.queue.metrics_incr("total_urls", discovered).await;
        }

        // METRICS
        let _ = self.queue.metrics_incr("completed_urls", 1).await;
        let _ = self.queue.metrics_incr(&self.key("processed_urls"), 1).await;
        let _ = self.queue.metrics_set_str("last_crawled_url", raw_url).await;

        self.push_timing(raw_url, timings, None, total_start).await;
        info!(worker_id = %self.id, url = %raw_url, "processed successfully");
        Outcome::Success
    }

    async fn record_failure(
        &self,
        url: &str,
        step: &str,
        error: &CrawlError,
        timings: StepTimings,
        total_start: std::time::Instant,
    ) {
        warn!(worker_id = %self.id, url = %url, step = %step, error = %error, "step failed");
        let _ = self.queue.metrics_incr("failed_urls", 1).await;
        let _ = self.queue.metrics_incr(&self.key("failed_urls"), 1).await;
        self.push_timing(url, timings, Some(error.to_string()), total_start).await;
    }

    async fn push_timing(
        &self,
        url: &str,
        timings: StepTimings,
        error: Option<String>,
        total_start: std::time::Instant,
    ) {
        let record = TimingRecord {
            url: url.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            timings,
            error,
            total_time_ms: total_start.elapsed().as_millis() as u64,
        };
        let _ = self.queue.timing_push(&self.id, record).await;
        let _ = self
            .queue
            .timing_trim(&self.id, self.config.ring_buffer_size)
            .await;
    }
}

enum Outcome {
    Success,
    Skipped,
    Rejected,
    Failed,
}
