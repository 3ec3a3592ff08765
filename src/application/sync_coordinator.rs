// Sync coordinator - Fans "sync now" out to independent channels and summarizes the result
use crate::application::upload_ports::{ChannelOutcome, ProgressReporter, SyncChannel, UploadContext};
use crate::domain::sync::{
    ChannelUpdate, RemainingStrategy, SyncAggregator, SyncEvent, SyncSummary, SyncTotals,
};
use anyhow::Context;
use std::sync::Arc;

pub type SyncEventSink = Arc<dyn Fn(SyncEvent) + Send + Sync>;

#[derive(Clone)]
pub struct SyncCoordinator {
    channels: Vec<Arc<dyn SyncChannel>>,
    strategy: RemainingStrategy,
}

impl SyncCoordinator {
    pub fn new(channels: Vec<Arc<dyn SyncChannel>>, strategy: RemainingStrategy) -> Self {
        Self { channels, strategy }
    }

    /// An empty slot table with one entry per registered channel
    pub fn aggregator(&self) -> SyncAggregator {
        SyncAggregator::new(self.channels.iter().map(|c| (c.id(), c.kind())))
    }

    /// Start every channel on its own task. Each one reports progress and then
    /// exactly one terminal event for `cycle` through `sink`.
    pub fn launch(&self, cycle: u64, ctx: UploadContext, sink: SyncEventSink) {
        for (slot, channel) in self.channels.iter().enumerate() {
            let channel = channel.clone();
            let ctx = ctx.clone();
            let sink = sink.clone();

            tokio::spawn(async move {
                let channel_id = channel.id();
                let progress_sink = sink.clone();
                let reporter = ProgressReporter::new(move |current, total| {
                    progress_sink(SyncEvent {
                        cycle,
                        slot,
                        update: ChannelUpdate::Progress { current, total },
                    })
                });

                tracing::info!("Sync channel {} started (cycle {})", channel_id, cycle);
                let run = tokio::spawn(async move { channel.upload(&ctx, &reporter).await });
                let outcome = match run.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!("Sync channel {} aborted: {}", channel_id, e);
                        ChannelOutcome::default()
                    }
                };
                tracing::info!(
                    "Sync channel {} finished: {} succeeded, {} failed",
                    channel_id,
                    outcome.succeeded,
                    outcome.failed
                );

                sink(SyncEvent {
                    cycle,
                    slot,
                    update: ChannelUpdate::Finished {
                        succeeded: outcome.succeeded,
                        failed: outcome.failed,
                    },
                });
            });
        }
    }

    /// Build the user-facing summary once every channel is terminal
    pub async fn summarize(&self, totals: SyncTotals) -> SyncSummary {
        let remaining = match self.strategy {
            RemainingStrategy::FailCounts => totals.failed,
            RemainingStrategy::Requery => match self.remaining_in_channels().await {
                Ok(remaining) => remaining,
                Err(e) => {
                    tracing::error!("Could not count unsynced records, using failures: {:#}", e);
                    totals.failed
                }
            },
        };
        SyncSummary::new(totals.succeeded, remaining)
    }

    /// Sum of what each channel would still pick up on its next run
    async fn remaining_in_channels(&self) -> anyhow::Result<u32> {
        let mut remaining = 0u32;
        for channel in &self.channels {
            let pending = channel
                .pending()
                .await
                .with_context(|| format!("Counting pending records for {}", channel.id()))?;
            remaining = remaining.saturating_add(pending);
        }
        Ok(remaining)
    }
}
