use std::sync::Arc;
use std::time::Duration;

use webcrawler_content::{ContentStore, InMemoryContentStore};
use webcrawler_fetch::{FetchConfig, Fetcher};
use webcrawler_queue::{InMemoryQueueStore, QueueStore};
use webcrawler_worker::worker::{Worker, WorkerRuntimeConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn runtime_config() -> WorkerRuntimeConfig {
    WorkerRuntimeConfig {
        links_per_page_cap: 20,
        ring_buffer_size: 50,
        consecutive_fail_threshold: 5,
        circuit_backoff: Duration::from_secs(30),
        idle_poll: Duration::from_millis(50),
        extra_denied_keywords: Vec::new(),
    }
}

/// S1 — happy path: fetch, extract, persist, and enqueue a discovered link.
#[tokio::test]
async fn happy_path_persists_page_and_discovers_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(format!(
                    r#"<html><head><title>Page A</title></head><body>
                        <p>Enough content text to survive the extractor filter.</p>
                        <a href="{}/b">next</a>
                    </body></html>"#,
                    server.uri()
                )),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html").set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let queue: Arc<dyn QueueStore> = Arc::new(InMemoryQueueStore::new(Duration::from_secs(24 * 3600)));
    let content: Arc<dyn ContentStore> = Arc::new(InMemoryContentStore::new());
    let fetcher = Arc::new(Fetcher::new(FetchConfig::default()).unwrap());

    let url_a = format!("{}/a", server.uri());
    queue.enqueue(&url_a, 1.0).await.unwrap();

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let alive = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let worker = Worker::new(
        "worker_1".into(),
        queue.clone(),
        content.clone(),
        fetcher,
        runtime_config(),
        stop_rx,
        alive,
    );

    // `process_url` is private; exercise the worker end-to-end by running
    // it briefly in the background and then requesting shutdown.
    let run_handle = tokio::spawn(worker.run());
    tokio::time::sleep(Duration::from_millis(300)).await;
    stop_tx.send(true).unwrap();
    let _ = tokio::time::timeout(Duration::from_secs(2), run_handle).await;

    let page = content.get_page(&url_a).await.unwrap();
    assert!(page.is_some());
    let page = page.unwrap();
    assert_eq!(page.title, "Page A");
    assert!(page.text.contains("Enough content text"));

    let metrics: std::collections::HashMap<_, _> = queue.metrics_get_all().await.unwrap().into_iter().collect();
    assert_eq!(metrics.get("completed_urls").copied().unwrap_or(0), 1);
}

/// S4-style: repeated failures trip the circuit breaker without panicking
/// and keep incrementing failed_urls.
#[tokio::test]
async fn repeated_failures_increment_failed_urls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let queue: Arc<dyn QueueStore> = Arc::new(InMemoryQueueStore::new(Duration::from_secs(24 * 3600)));
    let content: Arc<dyn ContentStore> = Arc::new(InMemoryContentStore::new());
    let mut fetch_cfg = FetchConfig::default();
    fetch_cfg.max_retries = 0;
    let fetcher = Arc::new(Fetcher::new(fetch_cfg).unwrap());

    // distinct URLs: the dedup visited-set would otherwise reject
    // re-enqueuing the same failing URL after it's dequeued once.
    for i in 0..3 {
        let url = format!("{}/broken/{i}", server.uri());
        queue.enqueue(&url, 1.0).await.unwrap();
    }

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let alive = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let mut cfg = runtime_config();
    cfg.consecutive_fail_threshold = 2;
    cfg.circuit_backoff = Duration::from_millis(50);

    let worker = Worker::new("worker_1".into(), queue.clone(), content, fetcher, cfg, stop_rx, alive);

    let run_handle = tokio::spawn(worker.run());
    tokio::time::sleep(Duration::from_millis(400)).await;
    stop_tx.send(true).unwrap();
    let _ = tokio::time::timeout(Duration::from_secs(2), run_handle).await;

    let metrics: std::collections::HashMap<_, _> = queue.metrics_get_all().await.unwrap().into_iter().collect();
    assert!(metrics.get("failed_urls").copied().unwrap_or(0) >= 1);
}
