//! # http-dl
//!
//! Resumable, concurrent HTTP batch-download engine with a persistent task
//! queue.
//!
//! ## Design Philosophy
//!
//! http-dl is designed to be:
//! - **Resumable** - Partial transfers survive process restarts; the next run
//!   continues from the bytes already on disk via HTTP range requests
//! - **Failure-isolated** - Each task in a batch settles on its own; one dead
//!   URL never delays or aborts its siblings
//! - **Bounded** - Transient failures retry with exponential backoff inside a
//!   run, and a per-task attempt budget caps the damage across runs
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use http_dl::{BatchRunner, BatchWorker, Config, SqliteTaskStore, run_with_shutdown};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!
//!     let store = Arc::new(SqliteTaskStore::new(&config.persistence.database_path).await?);
//!     store.add_task("http://example.com/files/archive.tar.gz").await?;
//!
//!     let interval = config.worker.sleep_interval;
//!     let runner = Arc::new(BatchRunner::new(config, store)?);
//!
//!     // Run batches periodically until SIGTERM/SIGINT
//!     run_with_shutdown(BatchWorker::new(runner, interval)).await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Batch orchestration of concurrent download attempts
pub mod batch;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Resumable HTTP transfer for a single URL
pub mod fetcher;
/// Retry logic with exponential backoff
pub mod retry;
/// Partial/completed file storage layout
pub mod storage;
/// Task persistence
pub mod store;
/// Core task types
pub mod task;
/// Periodic batch worker
pub mod worker;

// Re-export commonly used types
pub use batch::{BatchRunner, BatchStats};
pub use config::{
    Config, DownloadConfig, PersistenceConfig, RetryConfig, StorageConfig, WorkerConfig,
};
pub use error::{DatabaseError, Error, Result, StorageError};
pub use fetcher::Fetcher;
pub use retry::{with_backoff, IsRetryable};
pub use storage::Storage;
pub use store::{SqliteTaskStore, TaskStore};
pub use task::{Task, TaskId, TaskStatus};
pub use worker::{run_with_shutdown, BatchWorker};
