//! Ranking ingestion - async channel processor for chain events
//!
//! Main loop:
//! 1. Receives outputs, block connections and reorgs via mpsc channel
//! 2. Applies each one to the shared `RankAggregator` (one write lock per message)
//! 3. Flushes a snapshot after every connected block and once on shutdown
//!
//! An `AggregationError` means the tallies can no longer be trusted, so the
//! loop stops and returns it instead of continuing.

use super::aggregator::{IngestOutcome, RankAggregator};
use super::error::AggregationError;
use super::snapshot::SnapshotWriter;
use super::types::{Block, ChainOutput, RankSnapshot};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, RwLock};

/// Messages consumed by the ingestion loop
#[derive(Debug, Clone)]
pub enum RankMessage {
    /// A candidate output seen in the mempool or a block
    Output(ChainOutput),
    /// Block connected; `txids` are confirmed at `block.height`
    BlockConnected { block: Block, txids: Vec<String> },
    /// Block disconnected; `txids` are evicted
    Reorg { txids: Vec<String> },
    Shutdown,
}

/// Line format of the chain event feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChainEvent {
    Output(ChainOutput),
    Block {
        block: Block,
        #[serde(default)]
        txids: Vec<String>,
    },
    Reorg {
        txids: Vec<String>,
    },
}

impl From<ChainEvent> for RankMessage {
    fn from(event: ChainEvent) -> Self {
        match event {
            ChainEvent::Output(output) => RankMessage::Output(output),
            ChainEvent::Block { block, txids } => RankMessage::BlockConnected { block, txids },
            ChainEvent::Reorg { txids } => RankMessage::Reorg { txids },
        }
    }
}

/// Counters reported when the loop exits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionStats {
    pub outputs_seen: u64,
    pub applied: u64,
    pub duplicates: u64,
    /// Scripts that are not RANK outputs or fail to decode
    pub rejected: u64,
    pub below_min_burn: u64,
    pub blocks: u64,
    /// Blocks whose `ranks_length` disagrees with the txids delivered
    pub ranks_length_mismatches: u64,
    pub confirmed: u64,
    pub rolled_back: u64,
    pub snapshots_written: u64,
}

/// Start ranking ingestion from the chain event channel
///
/// Runs until the channel closes or a `Shutdown` message arrives.
///
/// Arguments:
/// - `rx`: Receiver end of chain event channel
/// - `aggregator`: Shared aggregator; readers take the read lock
/// - `writer`: Optional snapshot backend
/// - `min_burn_sats`: Outputs burning less than this are ignored
pub async fn start_rank_ingestion(
    mut rx: mpsc::Receiver<RankMessage>,
    aggregator: Arc<RwLock<RankAggregator>>,
    writer: Option<Arc<dyn SnapshotWriter>>,
    min_burn_sats: u64,
) -> Result<IngestionStats, AggregationError> {
    log::info!("🚀 Starting RANK ingestion");
    log::info!("   ├─ Min burn: {} sats", min_burn_sats);
    log::info!(
        "   └─ Snapshot backend: {}",
        writer.as_ref().map(|w| w.backend_type()).unwrap_or("none")
    );

    let mut stats = IngestionStats::default();
    let mut window_count = 0u64;
    let mut last_log_time = Instant::now();

    while let Some(message) = rx.recv().await {
        match message {
            RankMessage::Output(output) => {
                stats.outputs_seen += 1;
                let tx = match output.decode() {
                    Ok(tx) => tx,
                    Err(e) => {
                        log::debug!("Skipping output {}: {}", output.txid, e);
                        stats.rejected += 1;
                        continue;
                    }
                };

                if tx.sats < min_burn_sats {
                    log::debug!(
                        "Ignoring {} {} vote {}: burned {} < {} sats",
                        tx.output.platform,
                        tx.output.sentiment,
                        tx.txid,
                        tx.sats,
                        min_burn_sats
                    );
                    stats.below_min_burn += 1;
                    continue;
                }

                let outcome = aggregator.write().await.ingest(tx)?;
                match outcome {
                    IngestOutcome::Applied => stats.applied += 1,
                    IngestOutcome::Duplicate => stats.duplicates += 1,
                }

                window_count += 1;
                if last_log_time.elapsed().as_secs() >= 10 {
                    let per_sec = window_count as f64 / last_log_time.elapsed().as_secs_f64();
                    log::info!(
                        "📊 Ingestion rate: {:.1} outputs/sec (applied: {}, rejected: {})",
                        per_sec,
                        stats.applied,
                        stats.rejected
                    );
                    last_log_time = Instant::now();
                    window_count = 0;
                }
            }

            RankMessage::BlockConnected { block, txids } => {
                stats.blocks += 1;
                if block.ranks_length != txids.len() {
                    log::warn!(
                        "⚠️  Block {} at height {} declares {} RANK txs but {} txids were delivered",
                        block.hash,
                        block.height,
                        block.ranks_length,
                        txids.len()
                    );
                    stats.ranks_length_mismatches += 1;
                }
                let snapshot = {
                    let mut agg = aggregator.write().await;
                    let confirmed = agg.confirm(&txids, block.height)?;
                    stats.confirmed += confirmed as u64;
                    log::info!(
                        "⛓️  Block {} at height {}: {} RANK txs confirmed",
                        block.hash,
                        block.height,
                        confirmed
                    );
                    writer.as_ref().map(|_| agg.snapshot())
                };

                if let (Some(writer), Some(snapshot)) = (&writer, snapshot) {
                    flush_snapshot(writer.as_ref(), &snapshot, &mut stats).await;
                }
            }

            RankMessage::Reorg { txids } => {
                let report = aggregator.write().await.rollback(&txids)?;
                stats.rolled_back += report.removed.len() as u64;
            }

            RankMessage::Shutdown => {
                log::info!("🛑 Shutdown requested");
                break;
            }
        }
    }

    if let Some(writer) = &writer {
        let snapshot = aggregator.read().await.snapshot();
        flush_snapshot(writer.as_ref(), &snapshot, &mut stats).await;
    }

    log::info!(
        "✅ RANK ingestion finished: {} applied, {} duplicates, {} rejected, {} rolled back",
        stats.applied,
        stats.duplicates,
        stats.rejected,
        stats.rolled_back
    );

    Ok(stats)
}

async fn flush_snapshot(
    writer: &dyn SnapshotWriter,
    snapshot: &RankSnapshot,
    stats: &mut IngestionStats,
) {
    // write failures leave the in-memory state authoritative
    match writer.write_snapshot(snapshot).await {
        Ok(()) => stats.snapshots_written += 1,
        Err(e) => log::warn!("⚠️  Failed to write {} snapshot: {}", writer.backend_type(), e),
    }
}
