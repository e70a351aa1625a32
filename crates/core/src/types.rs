use serde::{Deserialize, Serialize};
use url::Url;

/// A unit of work taken off the queue. `priority` is accepted for API
/// symmetry with callers that still think in priority terms, but the core
/// queue is strict FIFO and never reorders on it (see DESIGN.md, Open
/// Question 2).
#[derive(Debug, Clone)]
pub struct CrawlJob {
    pub url: Url,
    pub source_url: Option<String>,
    pub priority: f64,
}

/// What a worker extracts from a fetched page, ready to persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageData {
    pub url: String,
    pub title: String,
    pub text: String,
    pub html: String,
    pub parent_url: Option<String>,
    pub links: Vec<String>,
    pub fetched_at: chrono::DateTime<chrono::Utc>,
    pub response_time_ms: u64,
    pub status_code: u16,
    pub content_type: Option<String>,
}

/// One step-timing entry in a worker's ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingRecord {
    pub url: String,
    pub timestamp: i64,
    pub timings: StepTimings,
    pub error: Option<String>,
    pub total_time_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepTimings {
    pub fetch_ms: u64,
    pub parse_ms: u64,
    pub save_ms: u64,
    pub add_links_ms: u64,
}

/// Aggregate metrics hash fields (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub total_urls: i64,
    pub queued_urls: i64,
    pub processing_urls: i64,
    pub completed_urls: i64,
    pub failed_urls: i64,
}

/// Per-worker metrics surfaced by `GET /workers/stats` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStats {
    pub worker_id: String,
    pub processed_urls: i64,
    pub failed_urls: i64,
    pub started_at: i64,
    pub alive: bool,
}

/// One sample in the queue-length time series (§4.9).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: i64,
    pub queue_length: i64,
}
