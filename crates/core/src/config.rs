use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub queue_store: QueueStoreConfig,
    pub content_store: ContentStoreConfig,
    pub fetch: FetchSettings,
    pub worker: WorkerConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    pub data_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueueStoreConfig {
    /// Address of a remote queue store (`QUEUE_STORE_ENDPOINT`). Unused by
    /// the in-process `InMemoryQueueStore`; kept so a remote adapter can be
    /// dropped in without a config shape change.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_visited_ttl_secs")]
    pub visited_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContentStoreConfig {
    /// `CONTENT_STORE_ENDPOINT` / `CONTENT_STORE_DB`.
    pub postgres_url: String,
    #[serde(default = "default_pool_size")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchSettings {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub total_timeout_secs: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_max_declared_length")]
    pub max_declared_content_length: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub http_proxy: Option<String>,
    #[serde(default)]
    pub https_proxy: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    #[serde(default = "default_links_per_page_cap")]
    pub links_per_page_cap: usize,
    #[serde(default = "default_ring_buffer_size")]
    pub ring_buffer_size: usize,
    #[serde(default = "default_consecutive_fail_threshold")]
    pub consecutive_fail_threshold: u32,
    #[serde(default = "default_circuit_backoff_secs")]
    pub circuit_backoff_secs: u64,
    #[serde(default = "default_idle_poll_secs")]
    pub idle_poll_secs: u64,
    #[serde(default = "default_drain_window_secs")]
    pub drain_window_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PolicyConfig {
    #[serde(default)]
    pub extra_denied_keywords: Vec<String>,
}

fn default_visited_ttl_secs() -> u64 {
    24 * 3600
}
fn default_pool_size() -> u32 {
    10
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_max_body_bytes() -> usize {
    500_000
}
fn default_max_declared_length() -> usize {
    1_000_000
}
fn default_max_retries() -> u32 {
    2
}
fn default_num_workers() -> usize {
    2
}
fn default_links_per_page_cap() -> usize {
    20
}
fn default_ring_buffer_size() -> usize {
    50
}
fn default_consecutive_fail_threshold() -> u32 {
    5
}
fn default_circuit_backoff_secs() -> u64 {
    30
}
fn default_idle_poll_secs() -> u64 {
    1
}
fn default_drain_window_secs() -> u64 {
    5
}

impl AppConfig {
    /// Applies the §6 environment-variable override table on top of a
    /// TOML-loaded config, the same layering `main.rs` in the teacher uses
    /// over its per-network sections.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("QUEUE_STORE_ENDPOINT") {
            self.queue_store.endpoint = Some(v);
        }
        if let Ok(v) = std::env::var("CONTENT_STORE_ENDPOINT") {
            self.content_store.postgres_url = v;
        }
        if let Ok(v) = std::env::var("NUM_WORKERS") {
            if let Ok(n) = v.parse() {
                self.worker.num_workers = n;
            }
        }
        if let Ok(v) = std::env::var("HTTP_PROXY") {
            self.fetch.http_proxy = Some(v);
        }
        if let Ok(v) = std::env::var("HTTPS_PROXY") {
            self.fetch.https_proxy = Some(v);
        }
        if let Ok(v) = std::env::var("FETCH_TIMEOUT_S") {
            if let Ok(n) = v.parse() {
                self.fetch.total_timeout_secs = n;
            }
        }
        if let Ok(v) = std::env::var("LINKS_PER_PAGE_CAP") {
            if let Ok(n) = v.parse() {
                self.worker.links_per_page_cap = n;
            }
        }
        self
    }
}
