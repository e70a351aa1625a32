//! Fetcher (component C4): a single bounded-pool HTTP client with the
//! timeout/retry/body-cap/content-type-gate contract of §4.4, generalized
//! from the teacher's per-network `NetworkDriver` (`crates/networks/src/tor.rs`)
//! down to one concrete network, and carrying the retry-on-status-list plus
//! bounded connection pool from `original_source/crawler_worker_optimized.py`'s
//! `Retry`/`HTTPAdapter` setup.

use futures_util::StreamExt;
use std::time::Duration;
use url::Url;
use webcrawler_core::CrawlError;

const RETRYABLE_STATUSES: &[u16] = &[429, 500, 502, 503, 504];
const MAX_POOL_SIZE: usize = 10;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub connect_timeout: Duration,
    pub total_timeout: Duration,
    pub max_body_bytes: usize,
    pub max_declared_content_length: usize,
    pub max_retries: u32,
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            total_timeout: Duration::from_secs(30),
            max_body_bytes: 500_000,
            max_declared_content_length: 1_000_000,
            max_retries: 2,
            http_proxy: None,
            https_proxy: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
    pub elapsed_ms: u64,
}

pub struct Fetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self, CrawlError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .pool_max_idle_per_host(MAX_POOL_SIZE);

        if let Some(proxy) = &config.http_proxy {
            builder = builder.proxy(
                reqwest::Proxy::http(proxy).map_err(|e| CrawlError::Network(e.to_string()))?,
            );
        }
        if let Some(proxy) = &config.https_proxy {
            builder = builder.proxy(
                reqwest::Proxy::https(proxy).map_err(|e| CrawlError::Network(e.to_string()))?,
            );
        }

        let client = builder
            .build()
            .map_err(|e| CrawlError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// GET `url`, retrying on the §4.4 retryable status list with
    /// exponential backoff. Returns `CrawlError::SkippedNonHtml` (not a
    /// failure) when the response content-type isn't HTML/XHTML.
    pub async fn fetch(&self, url: &Url) -> Result<FetchResult, CrawlError> {
        let start = std::time::Instant::now();
        let mut attempt = 0u32;

        loop {
            match self.try_once(url).await {
                Ok(result) => return Ok(result),
                Err(FetchAttemptError::Retryable(status)) => {
                    if attempt >= self.config.max_retries {
                        return Err(CrawlError::Http { status });
                    }
                    let backoff = Duration::from_millis(200 * 2u64.pow(attempt));
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(FetchAttemptError::Fatal(err)) => return Err(err),
            }
            if start.elapsed() > self.config.total_timeout {
                return Err(CrawlError::Timeout(self.config.total_timeout.as_secs()));
            }
        }
    }

    async fn try_once(&self, url: &Url) -> Result<FetchResult, FetchAttemptError> {
        let started = std::time::Instant::now();
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchAttemptError::Fatal(CrawlError::Timeout(self.config.total_timeout.as_secs()))
            } else {
                FetchAttemptError::Fatal(CrawlError::Network(e.to_string()))
            }
        })?;

        let status = response.status().as_u16();
        if RETRYABLE_STATUSES.contains(&status) {
            return Err(FetchAttemptError::Retryable(status));
        }
        if !(200..300).contains(&status) {
            return Err(FetchAttemptError::Fatal(CrawlError::Http { status }));
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.config.max_declared_content_length {
                return Err(FetchAttemptError::Fatal(CrawlError::BodyTooLarge {
                    size: len as usize,
                    max: self.config.max_declared_content_length,
                }));
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let is_html = content_type
            .as_deref()
            .map(|ct| {
                let ct = ct.to_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml")
            })
            .unwrap_or(false);
        if !is_html {
            return Err(FetchAttemptError::Fatal(CrawlError::SkippedNonHtml(
                content_type.unwrap_or_default(),
            )));
        }

        let max_body = self.config.max_body_bytes;
        let mut buf = Vec::with_capacity(max_body.min(64 * 1024));
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchAttemptError::Fatal(CrawlError::Network(e.to_string())))?;
            let remaining = max_body.saturating_sub(buf.len());
            if remaining == 0 {
                break;
            }
            let take = remaining.min(chunk.len());
            buf.extend_from_slice(&chunk[..take]);
            if buf.len() >= max_body {
                break;
            }
        }

        let body = String::from_utf8_lossy(&buf).into_owned();
        Ok(FetchResult {
            status,
            content_type,
            body,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

enum FetchAttemptError {
    Retryable(u16),
    Fatal(CrawlError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        Fetcher::new(FetchConfig {
            connect_timeout: Duration::from_secs(2),
            total_timeout: Duration::from_secs(5),
            max_body_bytes: 500_000,
            max_declared_content_length: 1_000_000,
            max_retries: 2,
            http_proxy: None,
            https_proxy: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn fetches_html_successfully() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string("<html><body>hi</body></html>"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/ok", server.uri())).unwrap();
        let result = fetcher().fetch(&url).await.unwrap();
        assert_eq!(result.status, 200);
        assert!(result.body.contains("hi"));
    }

    #[tokio::test]
    async fn skips_non_html_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_string("%PDF-1.4"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/pdf", server.uri())).unwrap();
        let err = fetcher().fetch(&url).await.unwrap_err();
        assert!(matches!(err, CrawlError::SkippedNonHtml(_)));
        assert!(!err.counts_as_failure());
    }

    #[tokio::test]
    async fn retries_on_retryable_status_then_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/flaky", server.uri())).unwrap();
        let err = fetcher().fetch(&url).await.unwrap_err();
        match err {
            CrawlError::Http { status } => assert_eq!(status, 503),
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn truncates_body_at_cap() {
        let server = MockServer::start().await;
        let big_body = "a".repeat(10_000);
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(big_body),
            )
            .mount(&server)
            .await;

        let mut cfg = FetchConfig::default();
        cfg.max_body_bytes = 1_000;
        let fetcher = Fetcher::new(cfg).unwrap();
        let url = Url::parse(&format!("{}/big", server.uri())).unwrap();
        let result = fetcher.fetch(&url).await.unwrap();
        assert!(result.body.len() <= 1_000);
    }

    #[tokio::test]
    async fn declines_when_declared_content_length_exceeds_cap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/huge"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .insert_header("content-length", "2000000")
                    .set_body_string("short but lies about length"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/huge", server.uri())).unwrap();
        let err = fetcher().fetch(&url).await.unwrap_err();
        assert!(matches!(err, CrawlError::BodyTooLarge { .. }));
    }
}
