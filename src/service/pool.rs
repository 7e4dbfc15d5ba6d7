use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{timeout, Duration};

use crate::config::PoolConfig;

/// Faults a dispatch can produce, separate from whatever the work itself
/// returns.
#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("dispatch exceeded its {0:?} deadline")]
    Timeout(Duration),

    #[error("dispatched work panicked: {0}")]
    Panicked(String),

    #[error("worker pool is shut down")]
    Closed,
}

/// Bounded set of execution slots for blocking fetch work.
///
/// A slot is a semaphore permit. The permit travels into the blocking
/// closure, so a call abandoned by its timeout keeps its slot busy until
/// the call actually returns; the abandoned work is still consuming a
/// thread.
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    max_workers: usize,
    drain_timeout: Duration,
}

impl WorkerPool {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(config.max_workers)),
            max_workers: config.max_workers,
            drain_timeout: Duration::from_secs(config.drain_timeout_secs),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run `work` on a free slot, waiting cooperatively for one if all are
    /// busy. Returns `DispatchError::Timeout` if the call does not complete
    /// within `deadline`; the underlying call is abandoned, not stopped.
    pub async fn dispatch<F, T>(&self, work: F, deadline: Duration) -> Result<T, DispatchError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DispatchError::Closed)?;

        let handle = tokio::task::spawn_blocking(move || {
            let _slot = permit;
            work()
        });

        match timeout(deadline, handle).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(join_error)) => Err(DispatchError::Panicked(join_error.to_string())),
            Err(_) => Err(DispatchError::Timeout(deadline)),
        }
    }

    /// Wait for in-flight work to finish, up to the configured grace
    /// period. Abandoned calls that outlive the grace period are left to
    /// the runtime to reap at process exit.
    pub async fn drain(&self) -> bool {
        timeout(self.drain_timeout, async {
            let _all = self
                .permits
                .acquire_many(self.max_workers as u32)
                .await;
        })
        .await
        .is_ok()
    }
}
