//! Bounded pool for blocking handler work.

use std::sync::Arc;
use std::thread;

use once_cell::sync::Lazy;
use tokio::sync::Semaphore;

use crate::error::{ConfigError, RouteError, RouteResult};

const MAX_DEFAULT_WORKERS: usize = 32;

static SHARED_POOL: Lazy<WorkerPool> = Lazy::new(|| WorkerPool::sized(default_size()));

fn default_size() -> usize {
    let cpus = thread::available_parallelism().map_or(1, |n| n.get());
    cpus.saturating_add(4).min(MAX_DEFAULT_WORKERS)
}

/// Runs blocking closures on tokio's blocking threads, at most `size` at a time.
///
/// The submitting task waits for a permit asynchronously, so a full pool
/// suspends the caller without stalling its scheduler. Clones share permits.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Creates a pool running at most `size` jobs concurrently.
    ///
    /// `size` must be between 1 and `Semaphore::MAX_PERMITS`.
    pub fn new(size: usize) -> Result<Self, ConfigError> {
        if size == 0 {
            return Err(ConfigError::ZeroPoolSize);
        }
        if size > Semaphore::MAX_PERMITS {
            return Err(ConfigError::PoolTooLarge {
                max: Semaphore::MAX_PERMITS,
            });
        }
        Ok(Self::sized(size))
    }

    fn sized(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Process-wide pool used by routes that are not given one.
    ///
    /// Sized `min(32, cpus + 4)`.
    pub fn shared() -> Self {
        SHARED_POOL.clone()
    }

    /// Maximum number of concurrent jobs.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held by a running job.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Stops accepting jobs. Running jobs finish; later submissions fail.
    ///
    /// Closing the shared pool affects every route that uses it.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Runs `job` on a blocking thread and waits for its result.
    pub async fn run<F, T>(&self, job: F) -> RouteResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| RouteError::PoolClosed)?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| {
            if e.is_cancelled() {
                RouteError::Cancelled
            } else {
                RouteError::Worker(e)
            }
        })
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::shared()
    }
}
