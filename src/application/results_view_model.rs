// Results view-model - Owns results screen state and publishes snapshots
//
// One task runs the loop. Commands come from the HTTP layer, background work
// reports back as events, and every change is published as a fresh snapshot.
use crate::application::sync_coordinator::{SyncCoordinator, SyncEventSink};
use crate::application::training_repository::TrainingHistoryRepository;
use crate::application::upload_ports::{NetworkMonitor, UploadContext};
use crate::application::video_upload_service::{BatchObserver, VideoUploadService};
use crate::domain::sync::{
    Applied, SyncAggregator, SyncEvent, SyncSummary, SyncTotals, UploadChannelState,
};
use crate::domain::training::{ResultCard, parse_self_report};
use crate::domain::video::{
    BatchOutcome, BatchProgress, FileStatus, MAX_BATCH_SIZE, NetworkTransport, VideoGateError,
    VideoSelection, VideoUploadTask,
};
use crate::infrastructure::worker_pool::WorkerPool;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch};

const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum ResultsCommand {
    Load {
        date: Option<NaiveDate>,
        focus: Option<String>,
    },
    StartSync,
    SubmitSelfReport {
        id: String,
        input: String,
    },
    ToggleVideo {
        id: String,
    },
    SetMeteredConsent(bool),
    UploadSelectedVideos,
    RefreshPendingVideos,
}

#[derive(Debug)]
enum ResultsEvent {
    Loaded {
        generation: u64,
        cards: Vec<ResultCard>,
    },
    LoadFailed(String),
    Sync(SyncEvent),
    SyncSummarized {
        cycle: u64,
        summary: SyncSummary,
    },
    SelfReportSaved {
        count: u32,
    },
    SelfReportFailed {
        id: String,
        error: String,
    },
    PendingVideos(Vec<VideoUploadTask>),
    FileStarted {
        index: usize,
    },
    FileProgress {
        index: usize,
        percent: u8,
    },
    FileUploaded {
        index: usize,
    },
    FileFailed {
        index: usize,
        error: String,
    },
    BatchFinished(BatchOutcome),
    BatchBlocked(VideoGateError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub seq: u64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncView {
    pub channels: Vec<UploadChannelState>,
    pub is_syncing: bool,
    pub summary: Option<SyncSummary>,
}

/// Immutable view of the results screen
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsSnapshot {
    pub day: NaiveDate,
    pub cards: Vec<ResultCard>,
    /// Index of the focused record in `cards`, the scroll target
    pub focus_index: Option<usize>,
    pub sync: SyncView,
    pub pending_videos: Vec<VideoUploadTask>,
    pub selected_videos: VideoSelection,
    pub video_batch: BatchProgress,
    pub network: NetworkTransport,
    pub metered_consent: bool,
    pub consent_required: bool,
    pub notice: Option<Notice>,
}

/// Cloneable front door to the running view-model
#[derive(Clone)]
pub struct ResultsHandle {
    commands: mpsc::Sender<ResultsCommand>,
    snapshots: watch::Receiver<ResultsSnapshot>,
}

impl ResultsHandle {
    pub async fn send(&self, command: ResultsCommand) -> anyhow::Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("results view-model has stopped"))
    }

    pub fn snapshot(&self) -> ResultsSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ResultsSnapshot> {
        self.snapshots.clone()
    }
}

pub struct ResultsDeps {
    pub repository: Arc<dyn TrainingHistoryRepository>,
    pub coordinator: SyncCoordinator,
    pub videos: Arc<VideoUploadService>,
    pub network: Arc<dyn NetworkMonitor>,
    pub pool: WorkerPool,
    pub user_id: Option<String>,
    /// Shared with the video sync channel
    pub metered_consent: Arc<AtomicBool>,
}

pub struct ResultsViewModel {
    deps: ResultsDeps,
    events: mpsc::UnboundedSender<ResultsEvent>,
    snapshots: watch::Sender<ResultsSnapshot>,

    day: NaiveDate,
    focus: Option<String>,
    load_generation: u64,
    cards: Vec<ResultCard>,
    aggregator: SyncAggregator,
    summary: Option<SyncSummary>,
    pending_videos: Vec<VideoUploadTask>,
    selection: VideoSelection,
    video_batch: BatchProgress,
    network: NetworkTransport,
    consent_required: bool,
    notice: Option<Notice>,
    notice_seq: u64,
}

impl ResultsViewModel {
    /// Start the loop on its own task with today's results loading
    pub fn spawn(deps: ResultsDeps) -> ResultsHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let day = Local::now().date_naive();
        let aggregator = deps.coordinator.aggregator();
        let network = deps.network.current_transport();
        let (snapshot_tx, snapshots) =
            watch::channel(Self::empty_snapshot(day, &aggregator, network));
        let mut view_model = Self {
            deps,
            events: event_tx,
            snapshots: snapshot_tx,
            day,
            focus: None,
            load_generation: 0,
            cards: Vec::new(),
            aggregator,
            summary: None,
            pending_videos: Vec::new(),
            selection: VideoSelection::default(),
            video_batch: BatchProgress::default(),
            network,
            consent_required: false,
            notice: None,
            notice_seq: 0,
        };
        view_model.publish();
        view_model.handle_command(ResultsCommand::Load {
            date: None,
            focus: None,
        });
        view_model.handle_command(ResultsCommand::RefreshPendingVideos);
        tokio::spawn(view_model.run(command_rx, event_rx));

        ResultsHandle {
            commands: command_tx,
            snapshots,
        }
    }

    fn empty_snapshot(
        day: NaiveDate,
        aggregator: &SyncAggregator,
        network: NetworkTransport,
    ) -> ResultsSnapshot {
        ResultsSnapshot {
            day,
            cards: Vec::new(),
            focus_index: None,
            sync: SyncView {
                channels: aggregator.channels().to_vec(),
                is_syncing: false,
                summary: None,
            },
            pending_videos: Vec::new(),
            selected_videos: VideoSelection::default(),
            video_batch: BatchProgress::default(),
            network,
            metered_consent: false,
            consent_required: false,
            notice: None,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<ResultsCommand>,
        mut events: mpsc::UnboundedReceiver<ResultsEvent>,
    ) {
        tracing::info!("Results view-model started for {}", self.day);
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
            self.publish();
        }
        tracing::info!("Results view-model stopped");
    }

    fn metered_consent(&self) -> bool {
        self.deps.metered_consent.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> ResultsSnapshot {
        let focus_index = self
            .focus
            .as_deref()
            .and_then(|id| self.cards.iter().position(|c| c.training_id == id));
        ResultsSnapshot {
            day: self.day,
            cards: self.cards.clone(),
            focus_index,
            sync: SyncView {
                channels: self.aggregator.channels().to_vec(),
                is_syncing: self.aggregator.is_syncing(),
                summary: self.summary.clone(),
            },
            pending_videos: self.pending_videos.clone(),
            selected_videos: self.selection.clone(),
            video_batch: self.video_batch.clone(),
            network: self.network,
            metered_consent: self.metered_consent(),
            consent_required: self.consent_required,
            notice: self.notice.clone(),
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }

    fn notify(&mut self, message: impl Into<String>) {
        self.notice_seq += 1;
        let message = message.into();
        tracing::debug!("Notice {}: {}", self.notice_seq, message);
        self.notice = Some(Notice {
            seq: self.notice_seq,
            message,
        });
    }

    fn handle_command(&mut self, command: ResultsCommand) {
        tracing::debug!("Command: {:?}", command);
        match command {
            ResultsCommand::Load { date, focus } => {
                self.day = date.unwrap_or_else(|| Local::now().date_naive());
                self.focus = focus;
                self.reload();
            }
            ResultsCommand::StartSync => self.start_sync(),
            ResultsCommand::SubmitSelfReport { id, input } => self.submit_self_report(id, &input),
            ResultsCommand::ToggleVideo { id } => self.toggle_video(&id),
            ResultsCommand::SetMeteredConsent(allow) => {
                self.deps.metered_consent.store(allow, Ordering::SeqCst);
                if allow {
                    self.consent_required = false;
                }
            }
            ResultsCommand::UploadSelectedVideos => self.upload_selected(),
            ResultsCommand::RefreshPendingVideos => self.refresh_pending_videos(),
        }
    }

    fn handle_event(&mut self, event: ResultsEvent) {
        match event {
            ResultsEvent::Loaded { generation, cards } => {
                if generation != self.load_generation {
                    tracing::debug!("Dropping stale load {}", generation);
                    return;
                }
                self.cards = cards;
            }
            ResultsEvent::LoadFailed(error) => self.notify(format!("Could not load results: {}", error)),
            ResultsEvent::Sync(event) => {
                if let Applied::Completed(totals) = self.aggregator.apply(event) {
                    self.summarize(totals);
                }
            }
            ResultsEvent::SyncSummarized { cycle, summary } => {
                if cycle != self.aggregator.cycle() {
                    return;
                }
                tracing::info!("Sync cycle {} finished: {}", cycle, summary.message);
                self.notify(summary.message.clone());
                self.summary = Some(summary);
                self.reload();
                self.refresh_pending_videos();
            }
            ResultsEvent::SelfReportSaved { count } => {
                self.notify(format!("Self-report updated: {}", count));
                self.reload();
            }
            ResultsEvent::SelfReportFailed { id, error } => {
                tracing::error!("Self-report for {} failed: {}", id, error);
                self.notify("Could not save self-report");
            }
            ResultsEvent::PendingVideos(tasks) => {
                self.selection
                    .retain(|id| tasks.iter().any(|t| t.record_id == id));
                self.pending_videos = tasks;
            }
            ResultsEvent::FileStarted { index } => {
                self.video_batch
                    .set_status(index, FileStatus::Uploading { percent: 0 });
            }
            ResultsEvent::FileProgress { index, percent } => {
                self.video_batch
                    .set_status(index, FileStatus::Uploading { percent });
            }
            ResultsEvent::FileUploaded { index } => {
                self.video_batch.set_status(index, FileStatus::Uploaded);
            }
            ResultsEvent::FileFailed { index, error } => {
                self.video_batch.set_status(index, FileStatus::Failed { error });
            }
            ResultsEvent::BatchFinished(outcome) => {
                let message = if outcome.fail_count == 0 {
                    format!("Uploaded {} videos", outcome.success_count)
                } else {
                    format!(
                        "Uploaded {} videos, {} failed",
                        outcome.success_count, outcome.fail_count
                    )
                };
                self.pending_videos
                    .retain(|t| !outcome.uploaded_ids.contains(&t.record_id));
                self.selection
                    .retain(|id| !outcome.uploaded_ids.iter().any(|u| u == id));
                self.video_batch.finish(outcome);
                self.notify(message);
                self.refresh_pending_videos();
            }
            ResultsEvent::BatchBlocked(error) => {
                self.video_batch = BatchProgress::default();
                self.gate_blocked(error);
            }
        }
    }

    fn reload(&mut self) {
        self.load_generation += 1;
        let generation = self.load_generation;
        let day = self.day;
        let repository = self.deps.repository.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let event = match repository.records_for_date(day).await {
                Ok(records) => ResultsEvent::Loaded {
                    generation,
                    cards: records.iter().map(ResultCard::from).collect(),
                },
                Err(e) => {
                    tracing::error!("Loading results for {} failed: {:#}", day, e);
                    ResultsEvent::LoadFailed(e.to_string())
                }
            };
            let _ = events.send(event);
        });
    }

    fn start_sync(&mut self) {
        if self.aggregator.is_syncing() {
            self.notify("Sync already in progress");
            return;
        }

        let cycle = self.aggregator.start();
        self.summary = None;
        tracing::info!("Sync cycle {} started", cycle);
        if self.aggregator.all_done() {
            self.summarize(self.aggregator.totals());
            return;
        }

        let events = self.events.clone();
        let sink: SyncEventSink = Arc::new(move |event| {
            let _ = events.send(ResultsEvent::Sync(event));
        });
        let ctx = UploadContext {
            user_id: self.deps.user_id.clone(),
        };
        self.deps.coordinator.launch(cycle, ctx, sink);
    }

    fn summarize(&self, totals: SyncTotals) {
        let cycle = self.aggregator.cycle();
        let coordinator = self.deps.coordinator.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let summary = coordinator.summarize(totals).await;
            let _ = events.send(ResultsEvent::SyncSummarized { cycle, summary });
        });
    }

    fn submit_self_report(&mut self, id: String, input: &str) {
        let count = match parse_self_report(input) {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("Rejected self-report for {}: {}", id, e);
                self.notify(format!("Invalid self-report: {}", e));
                return;
            }
        };

        let repository = self.deps.repository.clone();
        let record_id = id.clone();
        let done = self
            .deps
            .pool
            .submit(async move { repository.update_self_report(&record_id, count).await });

        let events = self.events.clone();
        tokio::spawn(async move {
            let event = match done.await {
                Ok(Ok(())) => ResultsEvent::SelfReportSaved { count },
                Ok(Err(e)) => ResultsEvent::SelfReportFailed {
                    id,
                    error: format!("{:#}", e),
                },
                Err(_) => ResultsEvent::SelfReportFailed {
                    id,
                    error: "worker pool stopped".to_string(),
                },
            };
            let _ = events.send(event);
        });
    }

    fn toggle_video(&mut self, id: &str) {
        if self.video_batch.running {
            self.notify("Video upload in progress");
            return;
        }
        if !self.pending_videos.iter().any(|t| t.record_id == id) {
            self.notify("Video is not waiting for upload");
            return;
        }
        if !self.selection.toggle(id) {
            self.notify(format!("At most {} videos per upload", MAX_BATCH_SIZE));
        }
    }

    fn gate_blocked(&mut self, error: VideoGateError) {
        if error == VideoGateError::MeteredConsentRequired {
            self.consent_required = true;
        }
        self.notify(format!("Video upload blocked: {}", error));
    }

    fn upload_selected(&mut self) {
        if self.video_batch.running {
            self.notify("Video upload in progress");
            return;
        }
        if self.selection.is_empty() {
            self.notify("No videos selected");
            return;
        }

        self.network = self.deps.network.current_transport();
        let consent = self.metered_consent();
        if let Err(e) = self.deps.videos.check_gate(consent) {
            self.gate_blocked(e);
            return;
        }
        self.consent_required = false;

        let tasks: Vec<VideoUploadTask> = self
            .selection
            .ids()
            .iter()
            .filter_map(|id| self.pending_videos.iter().find(|t| &t.record_id == id))
            .cloned()
            .collect();
        self.video_batch = BatchProgress::begin(tasks.iter().map(|t| t.file_name.clone()));

        let videos = self.deps.videos.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let observer = EventObserver {
                events: events.clone(),
            };
            if let Err(e) = videos.upload_selected(tasks, consent, &observer).await {
                let _ = events.send(ResultsEvent::BatchBlocked(e));
            }
        });
    }

    fn refresh_pending_videos(&mut self) {
        self.network = self.deps.network.current_transport();
        let videos = self.deps.videos.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            match videos.pending_tasks().await {
                Ok(tasks) => {
                    let _ = events.send(ResultsEvent::PendingVideos(tasks));
                }
                Err(e) => tracing::error!("Listing pending videos failed: {:#}", e),
            }
        });
    }
}

/// Forwards batch callbacks into the loop
struct EventObserver {
    events: mpsc::UnboundedSender<ResultsEvent>,
}

impl BatchObserver for EventObserver {
    fn on_file_start(&self, index: usize, _total: usize, _file_name: &str) {
        let _ = self.events.send(ResultsEvent::FileStarted { index });
    }

    fn on_file_progress(&self, index: usize, _total: usize, percent: u8) {
        let _ = self.events.send(ResultsEvent::FileProgress { index, percent });
    }

    fn on_file_success(&self, index: usize, _total: usize, _file_name: &str) {
        let _ = self.events.send(ResultsEvent::FileUploaded { index });
    }

    fn on_file_failure(&self, index: usize, _total: usize, _file_name: &str, error: &str) {
        let _ = self.events.send(ResultsEvent::FileFailed {
            index,
            error: error.to_string(),
        });
    }

    fn on_complete(&self, outcome: &BatchOutcome) {
        let _ = self.events.send(ResultsEvent::BatchFinished(outcome.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::upload_ports::{
        ChannelOutcome, ProgressReporter, RetryScheduler, SyncChannel, UploadError, VideoTransport,
    };
    use crate::application::video_upload_service::VideoUploadSettings;
    use crate::domain::sync::{ChannelId, RemainingStrategy};
    use crate::domain::training::{SyncKind, TrainingRecord};
    use crate::infrastructure::json_history_store::JsonHistoryStore;
    use crate::infrastructure::network_monitor::ConfiguredNetworkMonitor;
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;

    struct FixedChannel(&'static str, u32, u32);

    #[async_trait]
    impl SyncChannel for FixedChannel {
        fn id(&self) -> ChannelId {
            ChannelId::new(self.0)
        }

        fn kind(&self) -> SyncKind {
            SyncKind::Metadata
        }

        async fn upload(&self, _ctx: &UploadContext, progress: &ProgressReporter) -> ChannelOutcome {
            progress.report(self.1 + self.2, self.1 + self.2);
            ChannelOutcome::new(self.1, self.2)
        }

        async fn pending(&self) -> anyhow::Result<u32> {
            Ok(self.2)
        }
    }

    struct OkTransport;

    #[async_trait]
    impl VideoTransport for OkTransport {
        async fn upload_file(
            &self,
            _user_id: &str,
            _local_path: &Path,
            file_name: &str,
            progress: &(dyn Fn(u8) + Send + Sync),
        ) -> Result<String, UploadError> {
            progress(100);
            Ok(file_name.to_string())
        }
    }

    struct NoRetries;

    impl RetryScheduler for NoRetries {
        fn schedule_retry(&self, _record_id: &str, _file_name: &str, _interval_minutes: u64) {}
        fn cancel_retry(&self, _record_id: &str) {}
    }

    fn record(id: &str, offset_ms: i64) -> TrainingRecord {
        TrainingRecord {
            training_id: id.to_string(),
            training_label: "JAW_RIGHT".to_string(),
            create_at: Local::now().timestamp_millis() - offset_ms,
            finish_at: Local::now().timestamp_millis(),
            target_times: 10,
            achieved_times: 6,
            duration_time: 30,
            curve_json: String::new(),
            synced: false,
            csv_uploaded: false,
            csv_file_name: String::new(),
            self_report_count: None,
            video_uploaded: false,
            video_file_name: format!("{}.mp4", id),
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        network: Arc<ConfiguredNetworkMonitor>,
        handle: ResultsHandle,
    }

    fn harness(ids: &[&str], channels: Vec<Arc<dyn SyncChannel>>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        for id in ids {
            std::fs::write(dir.path().join(format!("{}.mp4", id)), b"clip").unwrap();
        }
        let records = ids
            .iter()
            .enumerate()
            .map(|(i, id)| record(id, i as i64 * 1_000))
            .collect();
        let repository: Arc<dyn TrainingHistoryRepository> =
            Arc::new(JsonHistoryStore::in_memory(records));
        let network = Arc::new(ConfiguredNetworkMonitor::new(NetworkTransport::Unmetered));
        let videos = Arc::new(VideoUploadService::new(
            Arc::new(OkTransport),
            repository.clone(),
            Arc::new(NoRetries),
            network.clone(),
            VideoUploadSettings {
                video_dir: dir.path().to_path_buf(),
                user_id: None,
                retry_interval_minutes: 15,
            },
        ));

        let handle = ResultsViewModel::spawn(ResultsDeps {
            repository: repository.clone(),
            coordinator: SyncCoordinator::new(channels, RemainingStrategy::FailCounts),
            videos,
            network: network.clone(),
            pool: WorkerPool::new(2),
            user_id: Some("user01".to_string()),
            metered_consent: Arc::new(AtomicBool::new(false)),
        });
        Harness {
            _dir: dir,
            network,
            handle,
        }
    }

    async fn wait_for(
        handle: &ResultsHandle,
        condition: impl FnMut(&ResultsSnapshot) -> bool,
    ) -> ResultsSnapshot {
        let mut rx = handle.subscribe();
        let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(condition))
            .await
            .expect("timed out waiting for snapshot")
            .unwrap()
            .clone();
        snapshot
    }

    fn notice(snapshot: &ResultsSnapshot) -> Option<&str> {
        snapshot.notice.as_ref().map(|n| n.message.as_str())
    }

    #[tokio::test]
    async fn test_load_lists_newest_first_and_focuses() {
        let h = harness(&["newest", "middle", "oldest"], Vec::new());
        wait_for(&h.handle, |s| s.cards.len() == 3).await;

        h.handle
            .send(ResultsCommand::Load {
                date: None,
                focus: Some("oldest".to_string()),
            })
            .await
            .unwrap();
        let snapshot = wait_for(&h.handle, |s| s.focus_index.is_some()).await;

        let ids: Vec<&str> = snapshot.cards.iter().map(|c| c.training_id.as_str()).collect();
        assert_eq!(ids, vec!["newest", "middle", "oldest"]);
        assert_eq!(snapshot.focus_index, Some(2));
    }

    #[tokio::test]
    async fn test_self_report_validation_and_update() {
        let h = harness(&["r1"], Vec::new());
        wait_for(&h.handle, |s| s.cards.len() == 1).await;

        h.handle
            .send(ResultsCommand::SubmitSelfReport {
                id: "r1".to_string(),
                input: "abc".to_string(),
            })
            .await
            .unwrap();
        let snapshot = wait_for(&h.handle, |s| s.notice.is_some()).await;
        assert!(notice(&snapshot).unwrap().starts_with("Invalid self-report"));

        h.handle
            .send(ResultsCommand::SubmitSelfReport {
                id: "r1".to_string(),
                input: " 7 ".to_string(),
            })
            .await
            .unwrap();
        let snapshot = wait_for(&h.handle, |s| {
            s.cards.first().is_some_and(|c| c.display_count == "7/10")
        })
        .await;
        assert_eq!(notice(&snapshot), Some("Self-report updated: 7"));
        assert!(snapshot.notice.unwrap().seq >= 2);
    }

    #[tokio::test]
    async fn test_sync_summary_after_all_channels() {
        let h = harness(
            &[],
            vec![
                Arc::new(FixedChannel("firestore", 2, 0)),
                Arc::new(FixedChannel("supabase-csv", 1, 1)),
            ],
        );
        h.handle.send(ResultsCommand::StartSync).await.unwrap();

        let snapshot = wait_for(&h.handle, |s| s.sync.summary.is_some()).await;
        assert!(!snapshot.sync.is_syncing);
        assert!(snapshot.sync.channels.iter().all(|c| c.done));
        assert_eq!(notice(&snapshot), Some("Synced 3 items, 1 remaining"));
    }

    #[tokio::test]
    async fn test_sync_without_channels_has_nothing_to_do() {
        let h = harness(&[], Vec::new());
        h.handle.send(ResultsCommand::StartSync).await.unwrap();
        let snapshot = wait_for(&h.handle, |s| s.sync.summary.is_some()).await;
        assert_eq!(notice(&snapshot), Some("Nothing to sync"));
    }

    #[tokio::test]
    async fn test_metered_upload_waits_for_consent() {
        let h = harness(&["a", "b"], Vec::new());
        wait_for(&h.handle, |s| s.pending_videos.len() == 2).await;
        h.network.set(NetworkTransport::Metered);

        for id in ["a", "b"] {
            h.handle
                .send(ResultsCommand::ToggleVideo { id: id.to_string() })
                .await
                .unwrap();
        }
        h.handle.send(ResultsCommand::UploadSelectedVideos).await.unwrap();
        let snapshot = wait_for(&h.handle, |s| s.consent_required).await;
        assert_eq!(snapshot.network, NetworkTransport::Metered);
        assert!(!snapshot.video_batch.running);

        h.handle.send(ResultsCommand::SetMeteredConsent(true)).await.unwrap();
        h.handle.send(ResultsCommand::UploadSelectedVideos).await.unwrap();
        let snapshot = wait_for(&h.handle, |s| s.video_batch.outcome.is_some()).await;

        assert!(!snapshot.consent_required);
        assert_eq!(snapshot.video_batch.outcome.as_ref().unwrap().success_count, 2);
        assert!(
            snapshot
                .video_batch
                .files
                .iter()
                .all(|f| f.status == FileStatus::Uploaded)
        );
        assert!(snapshot.selected_videos.is_empty());
        assert_eq!(notice(&snapshot), Some("Uploaded 2 videos"));
    }

    #[tokio::test]
    async fn test_selection_is_limited_to_a_batch() {
        let ids = ["a", "b", "c", "d", "e", "f"];
        let h = harness(&ids, Vec::new());
        wait_for(&h.handle, |s| s.pending_videos.len() == ids.len()).await;

        for id in ids {
            h.handle
                .send(ResultsCommand::ToggleVideo { id: id.to_string() })
                .await
                .unwrap();
        }
        let snapshot = wait_for(&h.handle, |s| s.notice.is_some()).await;
        assert_eq!(snapshot.selected_videos.ids().len(), MAX_BATCH_SIZE);
        assert_eq!(notice(&snapshot), Some("At most 5 videos per upload"));
    }
}
