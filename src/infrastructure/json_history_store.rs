// JSON file backed training history store
use crate::application::training_repository::TrainingHistoryRepository;
use crate::domain::training::{SyncKind, TrainingRecord};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

pub struct JsonHistoryStore {
    path: Option<PathBuf>,
    records: RwLock<Vec<TrainingRecord>>,
}

impl JsonHistoryStore {
    /// Load the store from `path`; a missing file starts an empty history.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Vec<TrainingRecord>>(&bytes)
                .with_context(|| format!("Failed to parse history file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("History file {} not found, starting empty", path.display());
                Vec::new()
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read history file {}", path.display()));
            }
        };

        tracing::info!("Loaded {} training records from {}", records.len(), path.display());
        Ok(Self {
            path: Some(path),
            records: RwLock::new(records),
        })
    }

    /// A store that never touches the disk
    pub fn in_memory(records: Vec<TrainingRecord>) -> Self {
        Self {
            path: None,
            records: RwLock::new(records),
        }
    }

    async fn persist(&self, records: &[TrainingRecord]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(records).context("Failed to encode history")?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    async fn update<F>(&self, training_id: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut TrainingRecord) + Send,
    {
        let mut records = self.records.write().await;
        let index = records
            .iter()
            .position(|r| r.training_id == training_id)
            .with_context(|| format!("Unknown training record {}", training_id))?;

        let mut updated = records[index].clone();
        apply(&mut updated);
        let previous = std::mem::replace(&mut records[index], updated);
        if let Err(e) = self.persist(&records).await {
            // memory must keep matching the file
            records[index] = previous;
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl TrainingHistoryRepository for JsonHistoryStore {
    async fn records_for_date(&self, date: NaiveDate) -> Result<Vec<TrainingRecord>> {
        let records = self.records.read().await;
        let mut day: Vec<TrainingRecord> = records
            .iter()
            .filter(|r| r.local_day() == Some(date))
            .cloned()
            .collect();
        day.sort_by(|a, b| b.create_at.cmp(&a.create_at));
        Ok(day)
    }

    async fn record_by_id(&self, training_id: &str) -> Result<Option<TrainingRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.training_id == training_id).cloned())
    }

    async fn unsynced_records(&self, kind: SyncKind) -> Result<Vec<TrainingRecord>> {
        let records = self.records.read().await;
        let mut pending: Vec<TrainingRecord> = records
            .iter()
            .filter(|r| r.needs_upload(kind))
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.create_at);
        Ok(pending)
    }

    async fn mark_synced(&self, training_id: &str, kind: SyncKind) -> Result<()> {
        tracing::debug!("Marking {} uploaded for {:?}", training_id, kind);
        self.update(training_id, |r| r.mark_uploaded(kind)).await
    }

    async fn update_self_report(&self, training_id: &str, count: u32) -> Result<()> {
        self.update(training_id, |r| r.self_report_count = Some(count))
            .await
    }
}
