// Repository trait for training history access
use crate::domain::training::{SyncKind, TrainingRecord};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};

#[async_trait]
pub trait TrainingHistoryRepository: Send + Sync {
    /// Records created on the given local day, newest first
    async fn records_for_date(&self, date: NaiveDate) -> anyhow::Result<Vec<TrainingRecord>>;

    async fn record_by_id(&self, training_id: &str) -> anyhow::Result<Option<TrainingRecord>>;

    /// Records still waiting on the given channel, oldest first
    async fn unsynced_records(&self, kind: SyncKind) -> anyhow::Result<Vec<TrainingRecord>>;

    /// Set the persisted upload flag for one channel (`SyncKind::Video` marks the video uploaded)
    async fn mark_synced(&self, training_id: &str, kind: SyncKind) -> anyhow::Result<()>;

    async fn update_self_report(&self, training_id: &str, count: u32) -> anyhow::Result<()>;

    async fn today_records(&self) -> anyhow::Result<Vec<TrainingRecord>> {
        self.records_for_date(Local::now().date_naive()).await
    }

    async fn unsynced_count(&self, kind: SyncKind) -> anyhow::Result<u32> {
        let records = self.unsynced_records(kind).await?;
        Ok(u32::try_from(records.len()).unwrap_or(u32::MAX))
    }
}
