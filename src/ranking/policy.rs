//! Pluggable ranking score
//!
//! A target's `ranking` is always recomputed from its full `ranks` list, so a
//! policy only has to be a pure function of that list.

use super::types::RankTransaction;
use crate::script_core::Sentiment;
use std::str::FromStr;
use std::sync::Arc;

pub trait RankingPolicy: Send + Sync {
    /// Score for a target given its contributing transactions
    fn ranking(&self, ranks: &[Arc<RankTransaction>]) -> i128;

    /// Name used in logs and configuration
    fn name(&self) -> &'static str;
}

/// `votes_positive - votes_negative`
#[derive(Debug, Clone, Copy, Default)]
pub struct VoteDifference;

impl RankingPolicy for VoteDifference {
    fn ranking(&self, ranks: &[Arc<RankTransaction>]) -> i128 {
        ranks
            .iter()
            .map(|tx| match tx.sentiment() {
                Sentiment::Positive => 1,
                Sentiment::Negative => -1,
            })
            .sum()
    }

    fn name(&self) -> &'static str {
        "votes"
    }
}

/// Signed sum of burned satoshis
#[derive(Debug, Clone, Copy, Default)]
pub struct BurnWeighted;

impl RankingPolicy for BurnWeighted {
    fn ranking(&self, ranks: &[Arc<RankTransaction>]) -> i128 {
        ranks
            .iter()
            .map(|tx| match tx.sentiment() {
                Sentiment::Positive => tx.sats as i128,
                Sentiment::Negative => -(tx.sats as i128),
            })
            .sum()
    }

    fn name(&self) -> &'static str {
        "burn"
    }
}

/// Policy selector used by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyKind {
    #[default]
    Votes,
    Burn,
}

impl PolicyKind {
    pub fn build(&self) -> Box<dyn RankingPolicy> {
        match self {
            PolicyKind::Votes => Box::new(VoteDifference),
            PolicyKind::Burn => Box::new(BurnWeighted),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "votes" => Ok(PolicyKind::Votes),
            "burn" => Ok(PolicyKind::Burn),
            other => Err(format!("unknown ranking policy: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script_core::{to_rank_script, Platform, RankOutput};

    fn vote(txid: &str, sentiment: Sentiment, sats: u64) -> Arc<RankTransaction> {
        let output = RankOutput::new(sentiment, Platform::Twitter, "abc");
        let script = to_rank_script(&output).unwrap();
        Arc::new(RankTransaction::from_script(&script, txid, None, sats, 0).unwrap())
    }

    #[test]
    fn test_vote_difference() {
        let ranks = vec![
            vote("a", Sentiment::Positive, 5),
            vote("b", Sentiment::Positive, 7),
            vote("c", Sentiment::Negative, 100),
        ];
        assert_eq!(VoteDifference.ranking(&ranks), 1);
        assert_eq!(VoteDifference.ranking(&[]), 0);
    }

    #[test]
    fn test_burn_weighted() {
        let ranks = vec![
            vote("a", Sentiment::Positive, 5_000_000),
            vote("b", Sentiment::Negative, 2_000_000),
            vote("c", Sentiment::Positive, u64::MAX),
        ];
        assert_eq!(
            BurnWeighted.ranking(&ranks),
            3_000_000i128 + u64::MAX as i128
        );
    }

    #[test]
    fn test_policy_kind_parse() {
        assert_eq!("votes".parse::<PolicyKind>(), Ok(PolicyKind::Votes));
        assert_eq!("BURN".parse::<PolicyKind>(), Ok(PolicyKind::Burn));
        assert!("decay".parse::<PolicyKind>().is_err());
        assert_eq!(PolicyKind::Burn.build().name(), "burn");
    }
}
