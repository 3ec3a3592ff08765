// Video upload domain model - pending tasks, batch results and the network gate
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_BATCH_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoUploadTask {
    pub record_id: String,
    pub file_name: String,
    pub size_bytes: u64,
    pub uploaded: bool,
}

impl VideoUploadTask {
    pub fn new(record_id: String, file_name: String, size_bytes: u64) -> Self {
        Self {
            record_id,
            file_name,
            size_bytes,
            uploaded: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub success_count: u32,
    pub fail_count: u32,
    pub failed_files: Vec<String>,
    /// Record ids acknowledged by the remote side.
    pub uploaded_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FileStatus {
    Queued,
    Uploading { percent: u8 },
    Uploaded,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileProgress {
    pub file_name: String,
    pub status: FileStatus,
}

/// Per-file view of the batch currently on screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub running: bool,
    pub files: Vec<FileProgress>,
    pub outcome: Option<BatchOutcome>,
}

impl BatchProgress {
    pub fn begin(file_names: impl IntoIterator<Item = String>) -> Self {
        Self {
            running: true,
            files: file_names
                .into_iter()
                .map(|file_name| FileProgress {
                    file_name,
                    status: FileStatus::Queued,
                })
                .collect(),
            outcome: None,
        }
    }

    pub fn set_status(&mut self, index: usize, status: FileStatus) {
        if let Some(file) = self.files.get_mut(index) {
            file.status = status;
        }
    }

    pub fn finish(&mut self, outcome: BatchOutcome) {
        self.running = false;
        self.outcome = Some(outcome);
    }
}

/// Record ids picked for the next batch, in pick order, never more than a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VideoSelection(Vec<String>);

impl VideoSelection {
    /// Returns false when the id would exceed the batch limit.
    pub fn toggle(&mut self, record_id: &str) -> bool {
        if let Some(pos) = self.0.iter().position(|id| id == record_id) {
            self.0.remove(pos);
            return true;
        }
        if self.0.len() >= MAX_BATCH_SIZE {
            return false;
        }
        self.0.push(record_id.to_string());
        true
    }

    pub fn ids(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn retain(&mut self, keep: impl Fn(&str) -> bool) {
        self.0.retain(|id| keep(id));
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkTransport {
    #[default]
    Unmetered,
    Metered,
    Offline,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum VideoGateError {
    #[error("no network connection")]
    NoNetwork,
    #[error("metered connection needs consent before uploading videos")]
    MeteredConsentRequired,
}

pub fn check_upload_gate(transport: NetworkTransport, metered_consent: bool) -> Result<(), VideoGateError> {
    match transport {
        NetworkTransport::Unmetered => Ok(()),
        NetworkTransport::Metered if metered_consent => Ok(()),
        NetworkTransport::Metered => Err(VideoGateError::MeteredConsentRequired),
        NetworkTransport::Offline => Err(VideoGateError::NoNetwork),
    }
}
