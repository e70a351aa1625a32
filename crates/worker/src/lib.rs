pub mod pool;
pub mod worker;

pub use pool::{WorkerPool, WorkerPoolStats};
pub use worker::Worker;
