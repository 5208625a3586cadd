//! # Ranking Aggregator
//!
//! Folds decoded RANK transactions into per-profile and per-post tallies
//! and keeps them consistent across chain reorganizations.
//!
//! ## Architecture
//!
//! ```text
//! chain source ──RankMessage──▶ start_rank_ingestion ──▶ RankAggregator
//!                                        │                     │
//!                                        └── after each block ─┴─▶ SnapshotWriter (JSON | SQLite)
//! ```
//!
//! 1. Outputs arrive over a bounded mpsc channel and are decoded by `script_core`
//! 2. Each RANK transaction is applied once to its profile and, if it names a post, to the post
//! 3. Connected blocks set heights; reorgs roll the evicted txids back
//! 4. Snapshots are taken under the read lock and written outside it
//!
//! The aggregator is the single writer. Readers share it through
//! `Arc<tokio::sync::RwLock<RankAggregator>>` and only ever observe state
//! between whole messages.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod policy;
pub mod snapshot;
pub mod types;

pub use aggregator::{IngestOutcome, RankAggregator, RollbackReport};
pub use config::{ConfigError, IndexerConfig, SnapshotBackend};
pub use error::AggregationError;
pub use ingestion::{start_rank_ingestion, ChainEvent, IngestionStats, RankMessage};
pub use policy::{BurnWeighted, PolicyKind, RankingPolicy, VoteDifference};
pub use snapshot::{load_snapshot, JsonSnapshotWriter, SnapshotError, SnapshotWriter, SqliteSnapshotWriter};
pub use types::{
    Block, ChainOutput, IndexedRanking, Post, PostMap, Profile, ProfileMap, RankSnapshot,
    RankTarget, RankTransaction,
};
