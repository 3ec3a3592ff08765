// Supabase storage channel - Uploads pending training CSV files, retrying failures in the background
use crate::application::training_repository::TrainingHistoryRepository;
use crate::application::upload_ports::{
    ChannelOutcome, ProgressReporter, RetryJob, RetryScheduler, RetryVerdict, SyncChannel,
    UploadContext, UploadError,
};
use crate::domain::sync::ChannelId;
use crate::domain::training::{SyncKind, TrainingLabel};
use crate::infrastructure::config::SupabaseSettings;
use async_trait::async_trait;
use std::sync::Arc;

/// Posts single CSV files to the storage bucket and flags them uploaded
pub struct CsvUploader {
    client: reqwest::Client,
    settings: SupabaseSettings,
    repository: Arc<dyn TrainingHistoryRepository>,
}

impl CsvUploader {
    pub fn new(settings: SupabaseSettings, repository: Arc<dyn TrainingHistoryRepository>) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings: SupabaseSettings {
                url: settings.url.trim_end_matches('/').to_string(),
                ..settings
            },
            repository,
        }
    }

    /// `{user}/{label}/{file}`, the label taken from the file name
    fn storage_path(user_id: &str, file_name: &str) -> String {
        format!(
            "{}/{}/{}",
            urlencoding::encode(user_id),
            TrainingLabel::from_file_name(file_name).as_str(),
            urlencoding::encode(file_name)
        )
    }

    fn object_url(&self, user_id: &str, file_name: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.settings.url,
            urlencoding::encode(&self.settings.bucket),
            Self::storage_path(user_id, file_name)
        )
    }

    async fn upload(&self, user_id: &str, training_id: &str, file_name: &str) -> Result<(), UploadError> {
        let path = self.settings.csv_dir.join(file_name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(UploadError::MissingFile(file_name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let response = self
            .client
            .post(self.object_url(user_id, file_name))
            .bearer_auth(&self.settings.api_key)
            .header("apikey", &self.settings.api_key)
            .header(reqwest::header::CONTENT_TYPE, "text/csv")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected { status, body });
        }

        if let Err(e) = self.repository.mark_synced(training_id, SyncKind::Csv).await {
            tracing::error!("Uploaded {} but could not mark it: {:#}", file_name, e);
        }
        Ok(())
    }
}

pub struct SupabaseCsvChannel {
    uploader: Arc<CsvUploader>,
    retries: Arc<dyn RetryScheduler>,
    retry_interval_minutes: u64,
}

impl SupabaseCsvChannel {
    pub fn new(
        uploader: Arc<CsvUploader>,
        retries: Arc<dyn RetryScheduler>,
        retry_interval_minutes: u64,
    ) -> Self {
        Self {
            uploader,
            retries,
            retry_interval_minutes,
        }
    }
}

#[async_trait]
impl SyncChannel for SupabaseCsvChannel {
    fn id(&self) -> ChannelId {
        ChannelId::new("supabase-csv")
    }

    fn kind(&self) -> SyncKind {
        SyncKind::Csv
    }

    async fn upload(&self, ctx: &UploadContext, progress: &ProgressReporter) -> ChannelOutcome {
        let records = match self.uploader.repository.unsynced_records(SyncKind::Csv).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("Could not load pending CSV records: {:#}", e);
                return ChannelOutcome::default();
            }
        };

        let total = u32::try_from(records.len()).unwrap_or(u32::MAX);
        if total == 0 {
            tracing::debug!("No CSV files to upload");
            return ChannelOutcome::default();
        }
        let Some(user_id) = ctx.user_id.as_deref() else {
            tracing::warn!("No user id, {} CSV files left unsynced", total);
            return ChannelOutcome::new(0, total);
        };

        tracing::info!("Uploading {} CSV files", total);
        let mut outcome = ChannelOutcome::default();
        for record in &records {
            let file_name = &record.csv_file_name;
            match self.uploader.upload(user_id, &record.training_id, file_name).await {
                Ok(()) => {
                    tracing::debug!("Uploaded {}", file_name);
                    self.retries.cancel_retry(&record.training_id);
                    outcome.succeeded += 1;
                }
                Err(UploadError::MissingFile(name)) => {
                    tracing::warn!("CSV file {} is gone, not retrying", name);
                    outcome.failed += 1;
                }
                Err(e) => {
                    tracing::warn!("CSV upload of {} failed: {}", file_name, e);
                    self.retries.schedule_retry(
                        &record.training_id,
                        file_name,
                        self.retry_interval_minutes,
                    );
                    outcome.failed += 1;
                }
            }
            progress.report(outcome.succeeded + outcome.failed, total);
        }
        outcome
    }

    async fn pending(&self) -> anyhow::Result<u32> {
        self.uploader.repository.unsynced_count(SyncKind::Csv).await
    }
}

/// Background retry of one CSV upload
pub struct CsvRetryJob {
    uploader: Arc<CsvUploader>,
    user_id: Option<String>,
}

impl CsvRetryJob {
    pub fn new(uploader: Arc<CsvUploader>, user_id: Option<String>) -> Self {
        Self { uploader, user_id }
    }
}

#[async_trait]
impl RetryJob for CsvRetryJob {
    async fn run(&self, record_id: &str, file_name: &str) -> RetryVerdict {
        let record = match self.uploader.repository.record_by_id(record_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::warn!("CSV retry for unknown record {}", record_id);
                return RetryVerdict::Abandon;
            }
            Err(e) => {
                tracing::error!("CSV retry could not read {}: {:#}", record_id, e);
                return RetryVerdict::Retry;
            }
        };
        if record.csv_uploaded {
            tracing::debug!("CSV for {} already uploaded", record_id);
            return RetryVerdict::Done;
        }
        let Some(user_id) = self.user_id.as_deref() else {
            tracing::warn!("No user id, dropping CSV retry for {}", record_id);
            return RetryVerdict::Abandon;
        };

        match self.uploader.upload(user_id, record_id, file_name).await {
            Ok(()) => {
                tracing::info!("Retry uploaded CSV {}", file_name);
                RetryVerdict::Done
            }
            Err(UploadError::MissingFile(name)) => {
                tracing::warn!("CSV file {} is gone, dropping retry", name);
                RetryVerdict::Abandon
            }
            Err(e) => {
                tracing::warn!("CSV retry for {} failed: {}", record_id, e);
                RetryVerdict::Retry
            }
        }
    }
}
