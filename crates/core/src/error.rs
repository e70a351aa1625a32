use thiserror::Error;

/// The error taxonomy used across the crawl pipeline. Variant names follow
/// the kinds a worker distinguishes when deciding whether a failure counts
/// against `failed_urls`, gets retried by the fetcher, or is silently
/// skipped.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("invalid url: {0}")]
    InputInvalid(String),

    #[error("dedup skip: {0}")]
    DedupSkip(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("timeout after {0}s")]
    Timeout(u64),

    #[error("http status {status}")]
    Http { status: u16 },

    #[error("skipped non-html content-type: {0}")]
    SkippedNonHtml(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("body too large: {size} bytes (max {max})")]
    BodyTooLarge { size: usize, max: usize },

    #[error("fatal: {0}")]
    Fatal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CrawlError {
    /// Whether this error should be counted against `failed_urls` per §7.
    /// Input-invalid, dedup-skip, and skipped-non-html are not failures.
    pub fn counts_as_failure(&self) -> bool {
        !matches!(
            self,
            CrawlError::InputInvalid(_) | CrawlError::DedupSkip(_) | CrawlError::SkippedNonHtml(_)
        )
    }
}
