// Bounded worker pool for short background writes
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Semaphore, oneshot};

pub const DEFAULT_WORKERS: usize = 4;

#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Run `job` once a worker slot is free. The receiver yields its result,
    /// or an error if the pool was shut down before the job ran.
    pub fn submit<F, T>(&self, job: F) -> oneshot::Receiver<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let permits = self.permits.clone();
        tokio::spawn(async move {
            let Ok(permit) = permits.acquire_owned().await else {
                tracing::warn!("Worker pool closed, dropping job");
                return;
            };
            let output = job.await;
            drop(permit);
            let _ = tx.send(output);
        });
        rx
    }

    #[cfg(test)]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}
