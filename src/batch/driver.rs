//! Batch orchestration: checkpoint resume, bounded dispatch, aggregation.

use super::report::{BatchEntry, BatchReport};
use crate::checkpoint::CheckpointStore;
use crate::client::CompletionBackend;
use crate::retry::{self, RetryPolicy};
use crate::types::Message;
use crate::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Tuning for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Exact number of work items that may be in flight simultaneously.
    /// There is no hidden reservation for the driver itself; the driver
    /// task never holds a permit.
    pub concurrency: usize,
    /// Attempt budget per work item.
    pub max_attempts: u32,
    /// Per-attempt deadline; `Duration::ZERO` waits indefinitely.
    pub timeout: Duration,
    /// Base for the randomized sleep before each retry.
    pub backoff_base: Duration,
    /// Clear the checkpoint before loading, so every index is re-requested.
    pub fresh_start: bool,
}

impl BatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    pub fn with_fresh_start(mut self, fresh_start: bool) -> Self {
        self.fresh_start = fresh_start;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::configuration("concurrency must be greater than 0"));
        }
        if self.max_attempts == 0 {
            return Err(Error::configuration("max_attempts must be at least 1"));
        }
        Ok(())
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_attempts: 1,
            timeout: Duration::ZERO,
            backoff_base: Duration::ZERO,
            fresh_start: false,
        }
    }
}

/// Drives a list of independent conversations through a completion backend,
/// persisting each success to the checkpoint so interrupted runs resume
/// where they left off.
pub struct BatchDriver<B: ?Sized> {
    backend: Arc<B>,
    store: CheckpointStore,
    options: BatchOptions,
}

impl<B> BatchDriver<B>
where
    B: CompletionBackend + ?Sized + 'static,
{
    pub fn new(backend: Arc<B>, checkpoint: impl Into<PathBuf>, options: BatchOptions) -> Self {
        Self {
            backend,
            store: CheckpointStore::new(checkpoint),
            options,
        }
    }

    /// Run the batch to completion.
    ///
    /// Per-item failures (exhausted attempts, append I/O errors) are
    /// reported as `None` slots in the returned report and never abort the
    /// other items. Configuration errors and checkpoint load failures abort
    /// the whole run before anything is dispatched.
    pub async fn run(&self, work_items: Vec<Vec<Message>>) -> Result<BatchReport> {
        self.options.validate()?;
        if work_items.is_empty() {
            return Ok(BatchReport::default());
        }

        if self.options.fresh_start {
            self.store.clear().await?;
        }
        let mut loaded = self.store.load().await?;
        if loaded.len() > work_items.len() {
            warn!(
                checkpoint = %self.store.path().display(),
                loaded = loaded.len(),
                input = work_items.len(),
                "checkpoint has more entries than the input; truncating the view"
            );
            loaded.truncate(work_items.len());
        }
        loaded.resize(work_items.len(), None);

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency));
        let append_lock = Arc::new(Mutex::new(()));
        let policy = RetryPolicy::new(self.options.max_attempts)
            .with_timeout(self.options.timeout)
            .with_backoff_base(self.options.backoff_base);

        let mut tasks: JoinSet<(usize, Result<BatchEntry>)> = JoinSet::new();
        let mut dispatched = 0usize;
        for (index, item) in work_items.iter().enumerate() {
            if loaded[index].is_some() {
                continue;
            }
            dispatched += 1;
            let backend = Arc::clone(&self.backend);
            let store = self.store.clone();
            let semaphore = Arc::clone(&semaphore);
            let append_lock = Arc::clone(&append_lock);
            let policy = policy.clone();
            let mut payload = item.clone();
            tasks.spawn(async move {
                let permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (index, Err(Error::configuration("concurrency limiter closed")))
                    }
                };
                let result = async {
                    let response = retry::execute(backend.as_ref(), &payload, &policy).await?;
                    let reply = response.message().cloned().ok_or_else(|| {
                        Error::invalid_response("response carries no assistant message")
                    })?;
                    payload.push(reply);
                    // The append lock serializes file writes only; the
                    // network exchange above ran outside it.
                    {
                        let _guard = append_lock.lock().await;
                        store.append(index, &payload).await?;
                    }
                    Ok(BatchEntry {
                        payload,
                        usage: response.usage,
                        resumed: false,
                    })
                }
                .await;
                drop(permit);
                (index, result)
            });
        }
        debug!(
            total = work_items.len(),
            dispatched,
            resumed = work_items.len() - dispatched,
            "batch dispatched"
        );

        let mut entries: Vec<Option<BatchEntry>> = loaded
            .into_iter()
            .map(|slot| {
                slot.map(|payload| BatchEntry {
                    payload,
                    usage: None,
                    resumed: true,
                })
            })
            .collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(entry))) => entries[index] = Some(entry),
                Ok((index, Err(e))) => {
                    warn!(index, error = %e, "work item failed");
                }
                Err(e) => {
                    warn!(error = %e, "work item task aborted");
                }
            }
        }

        Ok(BatchReport {
            entries,
            dispatched,
        })
    }
}

/// One-shot convenience wrapper around [`BatchDriver`].
pub async fn run_batch<B>(
    backend: Arc<B>,
    work_items: Vec<Vec<Message>>,
    checkpoint: impl Into<PathBuf>,
    options: BatchOptions,
) -> Result<BatchReport>
where
    B: CompletionBackend + ?Sized + 'static,
{
    BatchDriver::new(backend, checkpoint, options)
        .run(work_items)
        .await
}
