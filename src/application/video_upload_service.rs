// Video upload service - Gated batch uploads, per-record flags and retries
use crate::application::training_repository::TrainingHistoryRepository;
use crate::application::upload_ports::{
    ChannelOutcome, NetworkMonitor, ProgressReporter, RetryJob, RetryScheduler, RetryVerdict,
    SyncChannel, UploadContext, UploadError, VideoTransport,
};
use crate::domain::sync::ChannelId;
use crate::domain::training::SyncKind;
use crate::domain::video::{
    BatchOutcome, MAX_BATCH_SIZE, VideoGateError, VideoUploadTask, check_upload_gate,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

const GUEST_USER: &str = "guest";

/// Per-file and aggregate callbacks of one batch
#[allow(unused_variables)]
pub trait BatchObserver: Send + Sync {
    fn on_file_start(&self, index: usize, total: usize, file_name: &str) {}
    fn on_file_progress(&self, index: usize, total: usize, percent: u8) {}
    fn on_file_success(&self, index: usize, total: usize, file_name: &str) {}
    fn on_file_failure(&self, index: usize, total: usize, file_name: &str, error: &str) {}
    fn on_complete(&self, outcome: &BatchOutcome) {}
}

#[derive(Debug, Clone)]
pub struct VideoUploadSettings {
    pub video_dir: PathBuf,
    pub user_id: Option<String>,
    pub retry_interval_minutes: u64,
}

impl VideoUploadSettings {
    fn user(&self) -> &str {
        self.user_id.as_deref().unwrap_or(GUEST_USER)
    }
}

pub struct VideoUploadService {
    transport: Arc<dyn VideoTransport>,
    repository: Arc<dyn TrainingHistoryRepository>,
    retries: Arc<dyn RetryScheduler>,
    network: Arc<dyn NetworkMonitor>,
    settings: VideoUploadSettings,
}

impl VideoUploadService {
    pub fn new(
        transport: Arc<dyn VideoTransport>,
        repository: Arc<dyn TrainingHistoryRepository>,
        retries: Arc<dyn RetryScheduler>,
        network: Arc<dyn NetworkMonitor>,
        settings: VideoUploadSettings,
    ) -> Self {
        Self {
            transport,
            repository,
            retries,
            network,
            settings,
        }
    }

    pub fn check_gate(&self, metered_consent: bool) -> Result<(), VideoGateError> {
        check_upload_gate(self.network.current_transport(), metered_consent)
    }

    /// Unsynced videos whose file is still on disk, oldest first
    pub async fn pending_tasks(&self) -> anyhow::Result<Vec<VideoUploadTask>> {
        let records = self.repository.unsynced_records(SyncKind::Video).await?;
        let mut tasks = Vec::with_capacity(records.len());
        for record in records {
            let path = self.settings.video_dir.join(&record.video_file_name);
            match tokio::fs::metadata(&path).await {
                Ok(meta) => tasks.push(VideoUploadTask::new(
                    record.training_id,
                    record.video_file_name,
                    meta.len(),
                )),
                Err(_) => {
                    tracing::debug!("Video {} has no local file, not pending", record.video_file_name);
                }
            }
        }
        Ok(tasks)
    }

    /// Upload the chosen videos if the network policy allows it
    pub async fn upload_selected(
        &self,
        tasks: Vec<VideoUploadTask>,
        metered_consent: bool,
        observer: &dyn BatchObserver,
    ) -> Result<BatchOutcome, VideoGateError> {
        if let Err(e) = self.check_gate(metered_consent) {
            tracing::warn!("Video upload blocked: {}", e);
            return Err(e);
        }
        Ok(self.upload_batch(tasks, observer).await)
    }

    /// Upload files one after another. A failed file never stops the rest of the batch.
    pub async fn upload_batch(
        &self,
        mut tasks: Vec<VideoUploadTask>,
        observer: &dyn BatchObserver,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        if tasks.is_empty() {
            tracing::info!("No videos to upload");
            observer.on_complete(&outcome);
            return outcome;
        }
        if tasks.len() > MAX_BATCH_SIZE {
            tracing::warn!(
                "{} videos selected, uploading the first {}",
                tasks.len(),
                MAX_BATCH_SIZE
            );
            tasks.truncate(MAX_BATCH_SIZE);
        }

        let total = tasks.len();
        tracing::info!("Video batch started: {} files", total);

        for (index, task) in tasks.iter().enumerate() {
            observer.on_file_start(index, total, &task.file_name);
            tracing::debug!("Uploading [{}/{}] {}", index + 1, total, task.file_name);

            let path = self.settings.video_dir.join(&task.file_name);
            let progress = |percent: u8| observer.on_file_progress(index, total, percent);
            let result = upload_one(
                self.transport.as_ref(),
                self.settings.user(),
                &path,
                &task.file_name,
                &progress,
            )
            .await;
            match result {
                Ok(remote_path) => {
                    tracing::info!("Uploaded {} to {}", task.file_name, remote_path);
                    outcome.success_count += 1;
                    outcome.uploaded_ids.push(task.record_id.clone());
                    match self.repository.mark_synced(&task.record_id, SyncKind::Video).await {
                        Ok(()) => self.retries.cancel_retry(&task.record_id),
                        Err(e) => tracing::error!(
                            "Uploaded {} but could not record it: {:#}",
                            task.record_id,
                            e
                        ),
                    }
                    observer.on_file_success(index, total, &task.file_name);
                }
                Err(e) => {
                    tracing::warn!("Upload of {} failed: {}", task.file_name, e);
                    outcome.fail_count += 1;
                    outcome.failed_files.push(task.file_name.clone());
                    self.retries.schedule_retry(
                        &task.record_id,
                        &task.file_name,
                        self.settings.retry_interval_minutes,
                    );
                    observer.on_file_failure(index, total, &task.file_name, &e.to_string());
                }
            }
        }

        tracing::info!(
            "Video batch finished: {} succeeded, {} failed",
            outcome.success_count,
            outcome.fail_count
        );
        observer.on_complete(&outcome);
        outcome
    }
}

async fn upload_one(
    transport: &dyn VideoTransport,
    user_id: &str,
    path: &Path,
    file_name: &str,
    progress: &(dyn Fn(u8) + Send + Sync),
) -> Result<String, UploadError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(UploadError::MissingFile(file_name.to_string()));
    }
    transport.upload_file(user_id, path, file_name, progress).await
}

/// Background retry of a single video, run by the retry scheduler
pub struct VideoRetryJob {
    transport: Arc<dyn VideoTransport>,
    repository: Arc<dyn TrainingHistoryRepository>,
    settings: VideoUploadSettings,
}

impl VideoRetryJob {
    pub fn new(
        transport: Arc<dyn VideoTransport>,
        repository: Arc<dyn TrainingHistoryRepository>,
        settings: VideoUploadSettings,
    ) -> Self {
        Self {
            transport,
            repository,
            settings,
        }
    }
}

#[async_trait]
impl RetryJob for VideoRetryJob {
    async fn run(&self, record_id: &str, file_name: &str) -> RetryVerdict {
        let record = match self.repository.record_by_id(record_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::warn!("Retry for unknown record {}, dropping", record_id);
                return RetryVerdict::Abandon;
            }
            Err(e) => {
                tracing::error!("Retry lookup for {} failed: {:#}", record_id, e);
                return RetryVerdict::Retry;
            }
        };
        if record.video_uploaded {
            tracing::debug!("Video for {} already uploaded", record_id);
            return RetryVerdict::Done;
        }

        let path = self.settings.video_dir.join(file_name);
        let result = upload_one(
            self.transport.as_ref(),
            self.settings.user(),
            &path,
            file_name,
            &|_: u8| {},
        )
        .await;
        match result {
            Ok(_) => match self.repository.mark_synced(record_id, SyncKind::Video).await {
                Ok(()) => {
                    tracing::info!("Retry uploaded video for {}", record_id);
                    RetryVerdict::Done
                }
                Err(e) => {
                    tracing::error!("Retry uploaded {} but could not record it: {:#}", record_id, e);
                    RetryVerdict::Retry
                }
            },
            Err(UploadError::MissingFile(name)) => {
                tracing::warn!("Video file {} is gone, dropping retry", name);
                RetryVerdict::Abandon
            }
            Err(e) => {
                tracing::warn!("Retry for {} failed: {}", record_id, e);
                RetryVerdict::Retry
            }
        }
    }
}

/// Optional third "sync now" channel pushing the oldest pending videos
pub struct VideoSyncChannel {
    service: Arc<VideoUploadService>,
    metered_consent: Arc<AtomicBool>,
}

impl VideoSyncChannel {
    pub fn new(service: Arc<VideoUploadService>, metered_consent: Arc<AtomicBool>) -> Self {
        Self {
            service,
            metered_consent,
        }
    }
}

struct ChannelBatchObserver<'a> {
    progress: &'a ProgressReporter,
    finished: AtomicU32,
    total: u32,
}

impl ChannelBatchObserver<'_> {
    fn file_done(&self) {
        let done = self.finished.fetch_add(1, Ordering::SeqCst) + 1;
        self.progress.report(done, self.total);
    }
}

impl BatchObserver for ChannelBatchObserver<'_> {
    fn on_file_success(&self, _index: usize, _total: usize, _file_name: &str) {
        self.file_done();
    }

    fn on_file_failure(&self, _index: usize, _total: usize, _file_name: &str, _error: &str) {
        self.file_done();
    }
}

#[async_trait]
impl SyncChannel for VideoSyncChannel {
    fn id(&self) -> ChannelId {
        ChannelId::new("video")
    }

    fn kind(&self) -> SyncKind {
        SyncKind::Video
    }

    async fn upload(&self, _ctx: &UploadContext, progress: &ProgressReporter) -> ChannelOutcome {
        let mut pending = match self.service.pending_tasks().await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!("Could not list pending videos: {:#}", e);
                return ChannelOutcome::default();
            }
        };
        pending.truncate(MAX_BATCH_SIZE);
        let total = u32::try_from(pending.len()).unwrap_or(u32::MAX);

        if let Err(e) = self.service.check_gate(self.metered_consent.load(Ordering::SeqCst)) {
            tracing::warn!("Video sync skipped: {}", e);
            return ChannelOutcome::new(0, total);
        }

        let observer = ChannelBatchObserver {
            progress,
            finished: AtomicU32::new(0),
            total,
        };
        let outcome = self.service.upload_batch(pending, &observer).await;
        ChannelOutcome::new(outcome.success_count, outcome.fail_count)
    }

    async fn pending(&self) -> anyhow::Result<u32> {
        let pending = self.service.pending_tasks().await?;
        Ok(u32::try_from(pending.len()).unwrap_or(u32::MAX))
    }
}
