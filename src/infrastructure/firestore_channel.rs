// Firestore REST channel - Upserts today's training metadata per user
use crate::application::training_repository::TrainingHistoryRepository;
use crate::application::upload_ports::{ChannelOutcome, ProgressReporter, SyncChannel, UploadContext};
use crate::domain::sync::ChannelId;
use crate::domain::training::{SyncKind, TrainingRecord};
use crate::infrastructure::config::FirestoreSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Value, json};
use std::sync::Arc;

pub struct FirestoreChannel {
    client: reqwest::Client,
    settings: FirestoreSettings,
    repository: Arc<dyn TrainingHistoryRepository>,
}

impl FirestoreChannel {
    pub fn new(settings: FirestoreSettings, repository: Arc<dyn TrainingHistoryRepository>) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings: FirestoreSettings {
                base_url: settings.base_url.trim_end_matches('/').to_string(),
                ..settings
            },
            repository,
        }
    }

    fn document_url(&self, user_id: &str, training_id: &str) -> String {
        let mut url = format!(
            "{}/projects/{}/databases/(default)/documents/Users/{}/trainingHistory/{}",
            self.settings.base_url,
            urlencoding::encode(&self.settings.project_id),
            urlencoding::encode(user_id),
            urlencoding::encode(training_id)
        );
        if let Some(key) = &self.settings.api_key {
            url.push_str("?key=");
            url.push_str(&urlencoding::encode(key));
        }
        url
    }

    /// Only today's records are pushed; older unsynced rows stay local
    async fn pending_records(&self) -> Result<Vec<TrainingRecord>> {
        let records = self
            .repository
            .today_records()
            .await
            .context("Failed to load today's records")?;
        Ok(records
            .into_iter()
            .filter(|r| r.needs_upload(SyncKind::Metadata))
            .collect())
    }

    async fn push(&self, user_id: &str, record: &TrainingRecord) -> Result<()> {
        let url = self.document_url(user_id, &record.training_id);
        let response = self
            .client
            .patch(&url)
            .json(&document_body(record))
            .send()
            .await
            .context("Failed to send request to Firestore")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Firestore upsert failed with status {}: {}", status, body);
        }

        if let Err(e) = self
            .repository
            .mark_synced(&record.training_id, SyncKind::Metadata)
            .await
        {
            tracing::error!("Uploaded {} but could not mark it synced: {:#}", record.training_id, e);
        }
        Ok(())
    }
}

/// Firestore typed-value document for one training record
fn document_body(record: &TrainingRecord) -> Value {
    json!({
        "fields": {
            "trainingLabel": { "stringValue": record.training_label },
            "createAt": { "integerValue": record.create_at.to_string() },
            "finishAt": { "integerValue": record.finish_at.to_string() },
            "targetTimes": { "integerValue": record.target_times.to_string() },
            "achievedTimes": { "integerValue": record.achieved_times.to_string() },
            "durationTime": { "integerValue": record.duration_time.to_string() },
            "curveJson": { "stringValue": record.curve_json },
        }
    })
}

#[async_trait]
impl SyncChannel for FirestoreChannel {
    fn id(&self) -> ChannelId {
        ChannelId::new("firestore")
    }

    fn kind(&self) -> SyncKind {
        SyncKind::Metadata
    }

    async fn upload(&self, ctx: &UploadContext, progress: &ProgressReporter) -> ChannelOutcome {
        let records = match self.pending_records().await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("Could not load today's records: {:#}", e);
                return ChannelOutcome::default();
            }
        };

        let total = u32::try_from(records.len()).unwrap_or(u32::MAX);
        if total == 0 {
            tracing::debug!("No metadata to upload today");
            return ChannelOutcome::default();
        }
        let Some(user_id) = ctx.user_id.as_deref() else {
            tracing::warn!("No user id, {} metadata records left unsynced", total);
            return ChannelOutcome::new(0, total);
        };

        tracing::info!("Uploading {} metadata records for {}", total, user_id);
        let mut results = futures::stream::iter(records)
            .map(|record| async move {
                let result = self.push(user_id, &record).await;
                (record.training_id, result)
            })
            .buffer_unordered(self.settings.concurrency.max(1));

        let mut outcome = ChannelOutcome::default();
        while let Some((training_id, result)) = results.next().await {
            match result {
                Ok(()) => {
                    tracing::debug!("Uploaded metadata for {}", training_id);
                    outcome.succeeded += 1;
                }
                Err(e) => {
                    tracing::warn!("Metadata upload for {} failed: {:#}", training_id, e);
                    outcome.failed += 1;
                }
            }
            progress.report(outcome.succeeded + outcome.failed, total);
        }
        outcome
    }

    async fn pending(&self) -> Result<u32> {
        let records = self.pending_records().await?;
        Ok(u32::try_from(records.len()).unwrap_or(u32::MAX))
    }
}
