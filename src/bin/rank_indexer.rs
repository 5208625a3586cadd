//! Rank Indexer - replays a chain event feed into ranking snapshots
//!
//! - Restores the previous JSON or SQLite snapshot if one exists
//! - Spawns the ingestion task over a bounded channel
//! - Streams JSONL chain events (outputs, blocks, reorgs) into it
//! - Logs the top rankings per platform on exit
//!
//! Usage:
//!   cargo run --release --bin rank_indexer
//!
//! Environment variables:
//!   RANK_INPUT_PATH - JSONL chain events (default: data/chain_events.jsonl)
//!   RANK_SNAPSHOT_BACKEND - json | sqlite (default: json)
//!   RANK_SNAPSHOT_PATH - Snapshot file (default: data/rankings.json)
//!   RANK_RANKING_POLICY - votes | burn (default: votes)
//!   RANK_MIN_BURN_SATS - Burn threshold (default: 1000000)
//!   RANK_CHANNEL_BUFFER - Channel size (default: 10000)

use dotenv::dotenv;
use log::{error, info, warn};
use rankflow::ranking::{
    load_snapshot, start_rank_ingestion, ChainEvent, IndexerConfig, JsonSnapshotWriter,
    RankAggregator, RankMessage, SnapshotBackend, SnapshotWriter, SqliteSnapshotWriter,
};
use rankflow::script_core::Platform;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, RwLock};

const TOP_N: usize = 10;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize environment and logging
    dotenv().ok();
    env_logger::init();

    let config = IndexerConfig::from_env()?;

    info!("🚀 Rank Indexer");
    info!("   ├─ Input: {}", config.input_path);
    info!("   ├─ Snapshot: {:?} → {}", config.snapshot_backend, config.snapshot_path);
    info!("   ├─ Policy: {:?}", config.ranking_policy);
    info!("   ├─ Min burn: {} sats", config.min_burn_sats);
    info!("   └─ Channel buffer: {}", config.channel_buffer);

    let mut aggregator = RankAggregator::with_policy(config.ranking_policy.build());

    let writer: Arc<dyn SnapshotWriter> = match config.snapshot_backend {
        SnapshotBackend::Json => {
            if let Some(snapshot) = load_snapshot(&config.snapshot_path)? {
                aggregator.restore(&snapshot)?;
            }
            Arc::new(JsonSnapshotWriter::new(&config.snapshot_path)?)
        }
        SnapshotBackend::Sqlite => {
            let writer = SqliteSnapshotWriter::new(&config.snapshot_path)?;
            // the first flush replaces the tables, so earlier state must be replayed first
            aggregator.replay(&writer.load_transactions()?)?;
            Arc::new(writer)
        }
    };

    let aggregator = Arc::new(RwLock::new(aggregator));
    let (tx, rx) = mpsc::channel::<RankMessage>(config.channel_buffer);

    let ingestion = tokio::spawn(start_rank_ingestion(
        rx,
        Arc::clone(&aggregator),
        Some(writer),
        config.min_burn_sats,
    ));
    info!("✅ Ingestion task spawned");

    let file = tokio::fs::File::open(&config.input_path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut line_no = 0u64;
    let mut malformed = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let event: ChainEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!("⚠️  Skipping malformed event on line {}: {}", line_no, e);
                malformed += 1;
                continue;
            }
        };
        if tx.send(event.into()).await.is_err() {
            error!("❌ Ingestion task stopped early");
            break;
        }
    }
    drop(tx);

    info!("📥 Read {} lines ({} malformed)", line_no, malformed);

    let stats = ingestion.await??;
    info!(
        "📊 {} outputs, {} applied, {} below burn, {} blocks, {} rolled back",
        stats.outputs_seen, stats.applied, stats.below_min_burn, stats.blocks, stats.rolled_back
    );

    let aggregator = aggregator.read().await;
    for platform in Platform::all() {
        let rankings = aggregator.rankings(platform);
        if rankings.is_empty() {
            continue;
        }
        info!("🏆 Top {} on {}", TOP_N.min(rankings.len()), platform);
        for row in rankings.iter().take(TOP_N) {
            match &row.post_id {
                Some(post_id) => info!(
                    "   {:>6}  {}/{} (+{} / -{})",
                    row.ranking, row.profile_id, post_id, row.votes_positive, row.votes_negative
                ),
                None => info!(
                    "   {:>6}  {} (+{} / -{})",
                    row.ranking, row.profile_id, row.votes_positive, row.votes_negative
                ),
            }
        }
    }

    Ok(())
}
