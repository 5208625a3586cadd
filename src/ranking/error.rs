use thiserror::Error;

/// Internal consistency failures of the aggregator
///
/// These indicate a bug rather than bad input; ingestion stops on the first
/// one instead of continuing with a corrupted tally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    #[error("tally mismatch on {target}: {positive} positive + {negative} negative != {ranks} ranks")]
    TallyMismatch {
        target: String,
        positive: u64,
        negative: u64,
        ranks: usize,
    },

    #[error("ranking drift on {target}: stored {stored}, recomputed {expected}")]
    RankingDrift {
        target: String,
        stored: i128,
        expected: i128,
    },

    #[error("transaction {txid} is indexed but missing from {target}")]
    MissingRank { txid: String, target: String },

    #[error("transaction {txid} is listed by {target} but not indexed")]
    UnindexedRank { txid: String, target: String },

    #[error("profile {0} has no votes but still owns posts")]
    DanglingPosts(String),

    #[error("index holds {indexed} transactions, profiles list {listed}")]
    IndexSizeMismatch { indexed: usize, listed: usize },
}
