// Upload seams - sync channels, video transport, retries and network state
use crate::domain::sync::ChannelId;
use crate::domain::training::SyncKind;
use crate::domain::video::NetworkTransport;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct UploadContext {
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelOutcome {
    pub succeeded: u32,
    pub failed: u32,
}

impl ChannelOutcome {
    pub fn new(succeeded: u32, failed: u32) -> Self {
        Self { succeeded, failed }
    }
}

/// Progress callback bound to one channel slot. Reports that would move backwards are dropped.
pub struct ProgressReporter {
    sink: Box<dyn Fn(u32, u32) + Send + Sync>,
    last: AtomicU32,
}

impl ProgressReporter {
    pub fn new(sink: impl Fn(u32, u32) + Send + Sync + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            last: AtomicU32::new(0),
        }
    }

    #[cfg(test)]
    pub fn noop() -> Self {
        Self::new(|_, _| {})
    }

    pub fn report(&self, current: u32, total: u32) {
        let previous = self.last.fetch_max(current, Ordering::SeqCst);
        if current < previous {
            return;
        }
        (self.sink)(current, total);
    }
}

/// One independent upload pathway driven by "sync now".
///
/// The returned outcome is the channel's single terminal report.
#[async_trait]
pub trait SyncChannel: Send + Sync {
    fn id(&self) -> ChannelId;

    /// Which persisted flag this channel drives
    fn kind(&self) -> SyncKind;

    async fn upload(&self, ctx: &UploadContext, progress: &ProgressReporter) -> ChannelOutcome;

    /// How many records the next `upload` would pick up
    async fn pending(&self) -> anyhow::Result<u32>;
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file not found: {0}")]
    MissingFile(String),
    #[error("upload rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait VideoTransport: Send + Sync {
    /// Upload one local file, returning its remote path. `progress` receives percentages.
    async fn upload_file(
        &self,
        user_id: &str,
        local_path: &Path,
        file_name: &str,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<String, UploadError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryVerdict {
    Done,
    Retry,
    Abandon,
}

#[async_trait]
pub trait RetryJob: Send + Sync {
    async fn run(&self, record_id: &str, file_name: &str) -> RetryVerdict;
}

pub trait RetryScheduler: Send + Sync {
    /// Queue a background retry; an already pending retry for the record is kept
    fn schedule_retry(&self, record_id: &str, file_name: &str, interval_minutes: u64);

    fn cancel_retry(&self, record_id: &str);
}

pub trait NetworkMonitor: Send + Sync {
    fn current_transport(&self) -> NetworkTransport;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_reporter_drops_regressions() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ProgressReporter::new(move |c, t| sink.lock().unwrap().push((c, t)));

        reporter.report(1, 4);
        reporter.report(3, 4);
        reporter.report(2, 4);
        reporter.report(3, 4);
        reporter.report(4, 4);

        assert_eq!(*seen.lock().unwrap(), vec![(1, 4), (3, 4), (3, 4), (4, 4)]);
    }
}
