use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "webcrawler", about = "Distributed web crawler core")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enqueue a seed URL and start the worker pool
    Run {
        /// Seed URL to enqueue before starting workers
        #[arg(long)]
        seed: Option<String>,
    },
    /// Push a single URL onto the queue
    Enqueue {
        url: String,
    },
    /// Queue inspection and control
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },
    /// Worker pool control
    Workers {
        #[command(subcommand)]
        command: WorkerCommand,
    },
    /// Component health plus queue snapshot
    Health,
    /// List stored pages
    Content {
        #[arg(short, long, default_value_t = 0)]
        offset: i64,
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },
    /// Fetch a single stored page's HTML by URL
    ContentHtml {
        url: String,
    },
}

#[derive(Subcommand)]
pub enum QueueCommand {
    /// `completed_urls`/`failed_urls`/`queued_urls`/`total_urls`
    Stats,
    /// Peek at up to `limit` pending URLs without consuming them
    Pending {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Drop the pending queue, visited set, and counter
    Clear,
    /// Queue-length time series for the last 24h
    History,
}

#[derive(Subcommand)]
pub enum WorkerCommand {
    /// Start the pool with the configured (or given) worker count
    Start {
        #[arg(short, long)]
        num_workers: Option<usize>,
    },
    /// Stop all workers, draining within the configured window
    Stop,
    /// Add one worker to the running pool
    Add,
    /// Remove a single worker by id
    Remove {
        id: String,
    },
    /// Per-worker processed/failed/alive counts
    Stats,
}
