mod cli;
mod control;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use webcrawler_content::PostgresContentStore;
use webcrawler_core::AppConfig;
use webcrawler_fetch::{FetchConfig, Fetcher};
use webcrawler_queue::InMemoryQueueStore;
use webcrawler_worker::WorkerPool;
use webcrawler_worker::worker::WorkerRuntimeConfig;

use crate::cli::{Cli, Commands, QueueCommand, WorkerCommand};
use crate::control::ControlPlane;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config).unwrap_or_else(|_| {
        warn!(path = %cli.config, "config file not found, using embedded defaults");
        include_str!("../config/default.toml").to_string()
    });
    let config: AppConfig = toml::from_str(&config_str)?;
    let config = config.apply_env_overrides();

    let queue = InMemoryQueueStore::new_arc(Duration::from_secs(config.queue_store.visited_ttl_secs));

    let content = Arc::new(
        PostgresContentStore::with_pool_size(
            &config.content_store.postgres_url,
            config.content_store.max_connections,
        )
        .await?,
    );
    content.run_migrations().await?;

    let fetcher = Arc::new(Fetcher::new(FetchConfig {
        connect_timeout: Duration::from_secs(config.fetch.connect_timeout_secs),
        total_timeout: Duration::from_secs(config.fetch.total_timeout_secs),
        max_body_bytes: config.fetch.max_body_bytes,
        max_declared_content_length: config.fetch.max_declared_content_length,
        max_retries: config.fetch.max_retries,
        http_proxy: config.fetch.http_proxy.clone(),
        https_proxy: config.fetch.https_proxy.clone(),
    })?);

    let runtime_config = WorkerRuntimeConfig {
        links_per_page_cap: config.worker.links_per_page_cap,
        ring_buffer_size: config.worker.ring_buffer_size,
        consecutive_fail_threshold: config.worker.consecutive_fail_threshold,
        circuit_backoff: Duration::from_secs(config.worker.circuit_backoff_secs),
        idle_poll: Duration::from_secs(config.worker.idle_poll_secs),
        extra_denied_keywords: config.policy.extra_denied_keywords.clone(),
    };
    let pool = Arc::new(WorkerPool::new(
        queue.clone(),
        content.clone(),
        fetcher,
        runtime_config,
        Duration::from_secs(config.worker.drain_window_secs),
    ));

    webcrawler_metrics::spawn(
        queue.clone(),
        webcrawler_metrics::DEFAULT_TICK_INTERVAL,
        webcrawler_metrics::DEFAULT_HISTORY_WINDOW,
    );

    let control = ControlPlane::new(queue, content, pool.clone());

    match cli.command {
        Commands::Run { seed } => {
            if let Some(url) = seed {
                match control.enqueue(&url).await {
                    Ok(true) => info!(url = %url, "seed accepted"),
                    Ok(false) => warn!(url = %url, "seed rejected: already pending or visited"),
                    Err(e) => warn!(url = %url, error = %e, "seed enqueue failed"),
                }
            }
            control.workers_start(config.worker.num_workers).await;
            info!(num_workers = config.worker.num_workers, "worker pool started, press ctrl-c to stop");
            tokio::signal::ctrl_c().await?;
            info!("shutdown signal received, draining workers");
            control.workers_stop().await;
        }
        Commands::Enqueue { url } => match control.enqueue(&url).await {
            Ok(true) => println!("accepted: {url}"),
            Ok(false) => println!("rejected (dedup-skip): {url}"),
            Err(e) => println!("error: {e}"),
        },
        Commands::Queue { command } => match command {
            QueueCommand::Stats => {
                let stats = control.queue_stats().await?;
                println!("{stats:#?}");
            }
            QueueCommand::Pending { limit } => {
                for url in control.queue_pending(limit).await? {
                    println!("{url}");
                }
            }
            QueueCommand::Clear => {
                control.queue_clear().await?;
                println!("queue cleared");
            }
            QueueCommand::History => {
                for point in control.queue_history().await? {
                    println!("{}\t{}", point.timestamp, point.queue_length);
                }
            }
        },
        Commands::Workers { command } => match command {
            WorkerCommand::Start { num_workers } => {
                control.workers_start(num_workers.unwrap_or(config.worker.num_workers)).await;
                println!("workers started");
            }
            WorkerCommand::Stop => {
                control.workers_stop().await;
                println!("workers stopped");
            }
            WorkerCommand::Add => {
                let id = control.workers_add().await;
                println!("added {id}");
            }
            WorkerCommand::Remove { id } => {
                if control.workers_remove(&id).await {
                    println!("removed {id}");
                } else {
                    println!("no such worker: {id}");
                }
            }
            WorkerCommand::Stats => {
                let stats = control.workers_stats().await?;
                println!("{stats:#?}");
            }
        },
        Commands::Health => {
            let health = control.health().await?;
            println!("{health:#?}");
        }
        Commands::Content { offset, limit } => {
            for page in control.content_list(offset, limit).await? {
                let preview: String = page.text.chars().take(500).collect();
                println!("{}\t{}\t{}", page.url, page.title, preview);
            }
        }
        Commands::ContentHtml { url } => match control.content_html(&url).await? {
            Some(html) => println!("{html}"),
            None => println!("not found: {url}"),
        },
    }

    Ok(())
}
