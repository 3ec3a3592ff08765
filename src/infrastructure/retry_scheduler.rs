// Retry scheduler - Delayed background retries with exponential backoff
use crate::application::upload_ports::{RetryJob, RetryScheduler, RetryVerdict};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const INITIAL_BACKOFF: Duration = Duration::from_secs(30);
pub const MAX_BACKOFF: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

struct PendingRetry {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Pending {
    next_generation: u64,
    by_record: HashMap<String, PendingRetry>,
}

/// One tokio task per pending record. Scheduling an already pending record keeps the existing task.
#[derive(Clone)]
pub struct TokioRetryScheduler {
    job: Arc<dyn RetryJob>,
    pending: Arc<Mutex<Pending>>,
    max_attempts: u32,
}

/// Delay before the retry following `attempt` failed runs (1-based)
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    INITIAL_BACKOFF.saturating_mul(factor).min(MAX_BACKOFF)
}

impl TokioRetryScheduler {
    pub fn new(job: Arc<dyn RetryJob>, max_attempts: u32) -> Self {
        Self {
            job,
            pending: Arc::new(Mutex::new(Pending::default())),
            max_attempts: max_attempts.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    pub fn pending_count(&self) -> usize {
        self.lock().by_record.len()
    }

    #[cfg(test)]
    pub fn is_scheduled(&self, record_id: &str) -> bool {
        self.lock().by_record.contains_key(record_id)
    }
}

impl RetryScheduler for TokioRetryScheduler {
    fn schedule_retry(&self, record_id: &str, file_name: &str, interval_minutes: u64) {
        let mut pending = self.lock();
        if pending.by_record.contains_key(record_id) {
            tracing::debug!("Retry for {} already pending, keeping it", record_id);
            return;
        }

        let generation = pending.next_generation;
        pending.next_generation += 1;

        let job = self.job.clone();
        let registry = self.pending.clone();
        let max_attempts = self.max_attempts;
        let id = record_id.to_string();
        let file = file_name.to_string();
        let initial = Duration::from_secs(interval_minutes.saturating_mul(60));

        let handle = tokio::spawn(async move {
            tokio::time::sleep(initial).await;
            let mut attempt = 1;
            loop {
                let verdict = job.run(&id, &file).await;
                tracing::debug!("Retry {} for {}: {:?}", attempt, id, verdict);
                match verdict {
                    RetryVerdict::Done | RetryVerdict::Abandon => break,
                    RetryVerdict::Retry if attempt >= max_attempts => {
                        tracing::warn!("Giving up on {} after {} attempts", id, attempt);
                        break;
                    }
                    RetryVerdict::Retry => {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        attempt += 1;
                    }
                }
            }

            let mut pending = registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if pending.by_record.get(&id).map(|p| p.generation) == Some(generation) {
                pending.by_record.remove(&id);
            }
        });

        tracing::info!(
            "Scheduled retry for {} ({}) in {} min",
            record_id,
            file_name,
            interval_minutes
        );
        pending
            .by_record
            .insert(record_id.to_string(), PendingRetry { generation, handle });
    }

    fn cancel_retry(&self, record_id: &str) {
        if let Some(retry) = self.lock().by_record.remove(record_id) {
            retry.handle.abort();
            tracing::info!("Cancelled retry for {}", record_id);
        }
    }
}
