//! Batch orchestration of concurrent download attempts
//!
//! [`BatchRunner::run_batch`] pulls every pending task from the store, marks
//! each one in progress, fans out one concurrent backoff-wrapped fetch per
//! task, and settles each task into a terminal status for this run. A failure
//! in one task never aborts or delays its siblings, and no exception escapes
//! a batch run: each task's final status and timestamps are the sole failure
//! signal.

use crate::config::Config;
use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::retry::{with_backoff, IsRetryable};
use crate::storage::Storage;
use crate::store::TaskStore;
use crate::task::{Task, TaskStatus};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Outcome counts for one batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Tasks attempted in this run
    pub total: usize,
    /// Tasks that reached Ready
    pub ready: usize,
    /// Tasks that failed but stay eligible for a future run
    pub failed: usize,
    /// Tasks whose attempt budget is now exhausted
    pub forbidden: usize,
}

/// Drives one batch of download tasks to completion
pub struct BatchRunner {
    store: Arc<dyn TaskStore>,
    storage: Arc<Storage>,
    fetcher: Fetcher,
    config: Arc<Config>,
    concurrent_limit: Arc<Semaphore>,
}

impl BatchRunner {
    /// Create a batch runner
    ///
    /// Validates the configuration, creates the storage directories, and
    /// builds the shared HTTP client.
    pub fn new(config: Config, store: Arc<dyn TaskStore>) -> Result<Self> {
        config.validate()?;

        let storage = Arc::new(Storage::new(&config.storage)?);
        let fetcher = Fetcher::new(&config.download, storage.clone())?;
        let concurrent_limit = Arc::new(Semaphore::new(config.download.max_concurrent));

        Ok(Self {
            store,
            storage,
            fetcher,
            config: Arc::new(config),
            concurrent_limit,
        })
    }

    /// Run one batch: attempt every pending task once, concurrently
    ///
    /// Every task settles into Ready, Failed, or Forbidden before this
    /// returns; there is no early exit on first failure. Returns the outcome
    /// counts for the run.
    pub async fn run_batch(&self) -> Result<BatchStats> {
        let mut tasks = self.store.pending_tasks().await?;

        // Mark every task in progress before any transfer begins, so a crash
        // mid-run leaves visible in-progress state
        for task in &mut tasks {
            task.status = TaskStatus::InProgress;
            task.file_partial = Storage::file_name(&task.url);
            task.attempts += 1;
            self.store.save(task).await?;
        }

        let mut stats = BatchStats {
            total: tasks.len(),
            ..BatchStats::default()
        };

        let mut jobs = JoinSet::new();
        for task in tasks {
            // Each job owns its task outright; the semaphore bounds how many
            // transfers are in flight at once
            let fetcher = self.fetcher.clone();
            let store = self.store.clone();
            let config = self.config.clone();
            let permit_source = self.concurrent_limit.clone();

            jobs.spawn(async move {
                // Closed semaphores cannot occur here; treat failure as fatal
                // for this job only
                let _permit = match permit_source.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return TaskStatus::Failed,
                };
                attempt_task(task, fetcher, store, config).await
            });
        }

        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok(TaskStatus::Ready) => stats.ready += 1,
                Ok(TaskStatus::Forbidden) => stats.forbidden += 1,
                Ok(_) => stats.failed += 1,
                Err(e) => {
                    // A panicked job counts as a failure; its task was already
                    // persisted InProgress and will be retried next run
                    tracing::error!(error = %e, "Download job panicked");
                    stats.failed += 1;
                }
            }
        }

        tracing::info!(
            total = stats.total,
            ready = stats.ready,
            failed = stats.failed,
            forbidden = stats.forbidden,
            "Batch run finished"
        );

        Ok(stats)
    }

    /// Storage shared with the fetcher (useful for inspection in embedders)
    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }
}

/// Run one backoff-wrapped fetch for a task and settle its terminal status
///
/// Always persists a terminal status: no error path may leave the task stuck
/// in InProgress.
async fn attempt_task(
    mut task: Task,
    fetcher: Fetcher,
    store: Arc<dyn TaskStore>,
    config: Arc<Config>,
) -> TaskStatus {
    let url = task.url.clone();
    let outcome = with_backoff(&config.retry, || fetcher.fetch(&url)).await;

    match outcome {
        Ok(()) => {
            task.status = TaskStatus::Ready;
            task.datetime_ready = Some(Utc::now());
            task.file_partial = String::new();
            task.file_completed = Storage::file_name(&task.url);
        }
        Err(e) => {
            task.datetime_failed = Some(Utc::now());
            task.record_error(&format!("attempt {}: {}", task.attempts, e));

            // Only transient failures consume the attempt budget toward
            // Forbidden; anything else stays Failed for a later run
            if e.is_retryable() && task.attempts >= config.download.max_attempts {
                task.status = TaskStatus::Forbidden;
                tracing::error!(
                    url = %task.url,
                    attempts = task.attempts,
                    "Attempt budget exhausted, task is now forbidden"
                );
            } else {
                task.status = TaskStatus::Failed;
                tracing::warn!(url = %task.url, error = %e, "Download failed");
            }
        }
    }

    if let Err(e) = store.save(&task).await {
        // The transfer outcome stands; losing the status write only means
        // the task is re-attempted next run
        tracing::error!(task_id = %task.id, error = %e, "Failed to persist task status");
    }

    task.status
}
