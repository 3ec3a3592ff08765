// Multi-channel sync state - per-channel slots and the reducer that joins them
use super::training::SyncKind;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadChannelState {
    pub channel_id: ChannelId,
    pub kind: SyncKind,
    pub current: u32,
    pub total: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub done: bool,
}

impl UploadChannelState {
    pub fn new(channel_id: ChannelId, kind: SyncKind) -> Self {
        Self {
            channel_id,
            kind,
            current: 0,
            total: 0,
            succeeded: 0,
            failed: 0,
            done: false,
        }
    }

    fn reset(&mut self) {
        self.current = 0;
        self.total = 0;
        self.succeeded = 0;
        self.failed = 0;
        self.done = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelUpdate {
    Progress { current: u32, total: u32 },
    Finished { succeeded: u32, failed: u32 },
}

/// One report from a channel, tagged with the sync cycle and slot it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncEvent {
    pub cycle: u64,
    pub slot: usize,
    pub update: ChannelUpdate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncTotals {
    pub succeeded: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Ignored,
    Updated,
    /// Every slot is terminal; carries the summed per-channel results.
    Completed(SyncTotals),
}

/// Fixed table of channel slots, re-evaluated after every channel event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncAggregator {
    channels: Vec<UploadChannelState>,
    cycle: u64,
    is_syncing: bool,
}

impl SyncAggregator {
    pub fn new(channels: impl IntoIterator<Item = (ChannelId, SyncKind)>) -> Self {
        Self {
            channels: channels
                .into_iter()
                .map(|(id, kind)| UploadChannelState::new(id, kind))
                .collect(),
            cycle: 0,
            is_syncing: false,
        }
    }

    pub fn channels(&self) -> &[UploadChannelState] {
        &self.channels
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn is_syncing(&self) -> bool {
        self.is_syncing
    }

    /// Reset every slot and open a new cycle. Reports from older cycles are ignored afterwards.
    pub fn start(&mut self) -> u64 {
        self.channels.iter_mut().for_each(UploadChannelState::reset);
        self.cycle += 1;
        self.is_syncing = !self.channels.is_empty();
        self.cycle
    }

    pub fn all_done(&self) -> bool {
        self.channels.iter().all(|c| c.done)
    }

    pub fn totals(&self) -> SyncTotals {
        self.channels.iter().fold(SyncTotals::default(), |acc, c| SyncTotals {
            succeeded: acc.succeeded + c.succeeded,
            failed: acc.failed + c.failed,
        })
    }

    pub fn apply(&mut self, event: SyncEvent) -> Applied {
        if event.cycle != self.cycle || !self.is_syncing {
            return Applied::Ignored;
        }
        let Some(state) = self.channels.get_mut(event.slot) else {
            return Applied::Ignored;
        };
        if state.done {
            return Applied::Ignored;
        }

        match event.update {
            ChannelUpdate::Progress { current, total } => {
                if current < state.current {
                    return Applied::Ignored;
                }
                state.current = current;
                state.total = total;
                Applied::Updated
            }
            ChannelUpdate::Finished { succeeded, failed } => {
                state.succeeded = succeeded;
                state.failed = failed;
                state.done = true;
                if self.all_done() {
                    self.is_syncing = false;
                    Applied::Completed(self.totals())
                } else {
                    Applied::Updated
                }
            }
        }
    }
}

/// How the "still pending" figure of a finished sync is obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainingStrategy {
    /// Count unsynced rows in the history store after the channels finish.
    #[default]
    Requery,
    /// Use the failures reported by the channels.
    FailCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryKind {
    NothingToSync,
    Complete,
    Partial,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub kind: SummaryKind,
    pub total_success: u32,
    pub remaining: u32,
    pub message: String,
}

impl SyncSummary {
    pub fn new(total_success: u32, remaining: u32) -> Self {
        let kind = match (total_success, remaining) {
            (0, 0) => SummaryKind::NothingToSync,
            (_, 0) => SummaryKind::Complete,
            (s, _) if s > 0 => SummaryKind::Partial,
            _ => SummaryKind::Failed,
        };
        let message = match kind {
            SummaryKind::NothingToSync => "Nothing to sync".to_string(),
            SummaryKind::Complete => format!("Sync complete: {} items", total_success),
            SummaryKind::Partial => {
                format!("Synced {} items, {} remaining", total_success, remaining)
            }
            SummaryKind::Failed => {
                format!("Sync failed, {} items remaining, will retry", remaining)
            }
        };
        Self {
            kind,
            total_success,
            remaining,
            message,
        }
    }
}
