//! Ranking aggregator - folds decoded RANK transactions into profile and post tallies
//!
//! Per target (keyed by platform + ID) the lifecycle is:
//!
//! ```text
//! Unseen ──first vote──▶ Tracked ──more votes──▶ Tracked
//!    ▲                      │
//!    └──rollback empties────┘
//! ```
//!
//! Every transaction counts toward its profile. A transaction carrying a post
//! ID additionally counts toward that post, kept in the profile's `posts` map.
//! The first vote for a post creates both aggregates as needed, so arrival
//! order across keys does not matter.
//!
//! Invariants checked after every mutation:
//! - `votes_positive + votes_negative == ranks.len()`
//! - `ranking == policy.ranking(&ranks)`
//! - a txid is applied at most once (the transaction index is the membership set)

use super::error::AggregationError;
use super::policy::{RankingPolicy, VoteDifference};
use super::types::{
    IndexedRanking, Post, Profile, ProfileMap, RankSnapshot, RankTarget, RankTransaction,
};
use crate::script_core::{Platform, Sentiment};
use std::collections::HashMap;
use std::sync::Arc;

/// Result of offering a transaction to the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Applied,
    /// Txid already tracked; state unchanged
    Duplicate,
}

/// Result of a reorg rollback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    pub removed: Vec<String>,
    /// Evicted txids the aggregator never ingested
    pub missing: Vec<String>,
}

struct TrackedTx {
    seq: u64,
    tx: Arc<RankTransaction>,
}

pub struct RankAggregator {
    profiles: HashMap<Platform, ProfileMap>,
    /// txid → record; doubles as the idempotence set
    transactions: HashMap<String, TrackedTx>,
    next_seq: u64,
    policy: Box<dyn RankingPolicy>,
}

impl RankAggregator {
    /// Aggregator scoring by vote difference
    pub fn new() -> Self {
        Self::with_policy(Box::new(VoteDifference))
    }

    pub fn with_policy(policy: Box<dyn RankingPolicy>) -> Self {
        Self {
            profiles: HashMap::new(),
            transactions: HashMap::new(),
            next_seq: 0,
            policy,
        }
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Apply one transaction to its profile (and post, if any)
    pub fn ingest(&mut self, tx: RankTransaction) -> Result<IngestOutcome, AggregationError> {
        if self.transactions.contains_key(&tx.txid) {
            log::debug!("Skipping already tracked RANK tx {}", tx.txid);
            return Ok(IngestOutcome::Duplicate);
        }

        let tx = Arc::new(tx);
        let platform = tx.output.platform;
        let profile_id = tx.output.profile_id.clone();
        let policy = self.policy.as_ref();

        let profile = self
            .profiles
            .entry(platform)
            .or_default()
            .entry(profile_id.clone())
            .or_insert_with(|| Profile::new(platform, profile_id.clone()));
        profile.target.apply(Arc::clone(&tx), policy);
        check_tally(&profile.target, || target_label(platform, &profile_id, None))?;

        if let Some(post_id) = &tx.output.post_id {
            let post = profile
                .posts
                .entry(post_id.clone())
                .or_insert_with(|| Post::new(platform, post_id.clone(), profile_id.clone()));
            post.target.apply(Arc::clone(&tx), policy);
            check_tally(&post.target, || {
                target_label(platform, &profile_id, Some(post_id.as_str()))
            })?;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        log::debug!(
            "Applied {} vote {} → {}/{}",
            tx.output.sentiment,
            tx.txid,
            platform,
            profile_id
        );
        self.transactions.insert(tx.txid.clone(), TrackedTx { seq, tx });

        Ok(IngestOutcome::Applied)
    }

    /// Undo evicted transactions after a reorg
    ///
    /// Unknown txids are reported and skipped. Targets whose `ranks` become
    /// empty are removed from the maps.
    pub fn rollback(&mut self, txids: &[String]) -> Result<RollbackReport, AggregationError> {
        let policy = self.policy.as_ref();
        let mut report = RollbackReport::default();

        for txid in txids {
            let Some(tracked) = self.transactions.remove(txid) else {
                log::warn!("⚠️  Rollback requested for untracked tx {}", txid);
                report.missing.push(txid.clone());
                continue;
            };

            let output = &tracked.tx.output;
            let profile_label = target_label(output.platform, &output.profile_id, None);
            let profiles = self.profiles.get_mut(&output.platform).ok_or_else(|| {
                AggregationError::MissingRank {
                    txid: txid.clone(),
                    target: profile_label.clone(),
                }
            })?;
            let profile = profiles.get_mut(&output.profile_id).ok_or_else(|| {
                AggregationError::MissingRank {
                    txid: txid.clone(),
                    target: profile_label.clone(),
                }
            })?;

            profile.target.revert(txid, policy).ok_or_else(|| AggregationError::MissingRank {
                txid: txid.clone(),
                target: profile_label.clone(),
            })?;
            check_tally(&profile.target, || profile_label.clone())?;

            if let Some(post_id) = &output.post_id {
                let post_label =
                    target_label(output.platform, &output.profile_id, Some(post_id.as_str()));
                let post = profile.posts.get_mut(post_id).ok_or_else(|| {
                    AggregationError::MissingRank {
                        txid: txid.clone(),
                        target: post_label.clone(),
                    }
                })?;
                post.target.revert(txid, policy).ok_or_else(|| AggregationError::MissingRank {
                    txid: txid.clone(),
                    target: post_label.clone(),
                })?;
                check_tally(&post.target, || post_label.clone())?;

                if post.target.is_empty() {
                    profile.posts.remove(post_id);
                }
            }

            if profile.target.is_empty() {
                if !profile.posts.is_empty() {
                    return Err(AggregationError::DanglingPosts(profile_label));
                }
                profiles.remove(&output.profile_id);
            }
            if profiles.is_empty() {
                self.profiles.remove(&output.platform);
            }

            report.removed.push(txid.clone());
        }

        if !report.removed.is_empty() {
            log::info!(
                "↩️  Rolled back {} RANK txs ({} untracked)",
                report.removed.len(),
                report.missing.len()
            );
        }

        Ok(report)
    }

    /// Mark tracked transactions as mined at `height`
    pub fn confirm(&mut self, txids: &[String], height: u32) -> Result<usize, AggregationError> {
        self.set_height(txids, Some(height))
    }

    /// Set or clear the height of tracked transactions
    ///
    /// The shared record is immutable, so each affected transaction is
    /// replaced by a copy in the index and in every target listing it.
    /// Returns how many records changed; untracked txids are ignored.
    pub fn set_height(
        &mut self,
        txids: &[String],
        height: Option<u32>,
    ) -> Result<usize, AggregationError> {
        let policy = self.policy.as_ref();
        let mut updated = 0;

        for txid in txids {
            let Some(tracked) = self.transactions.get_mut(txid) else {
                continue;
            };
            if tracked.tx.height == height {
                continue;
            }
            let replacement = Arc::new(tracked.tx.with_height(height));
            tracked.tx = Arc::clone(&replacement);

            let output = &replacement.output;
            let profile_label = target_label(output.platform, &output.profile_id, None);
            let Some(profile) = self
                .profiles
                .get_mut(&output.platform)
                .and_then(|profiles| profiles.get_mut(&output.profile_id))
            else {
                return Err(AggregationError::MissingRank {
                    txid: txid.clone(),
                    target: profile_label,
                });
            };
            if !profile.target.replace(&replacement, policy) {
                return Err(AggregationError::MissingRank {
                    txid: txid.clone(),
                    target: profile_label,
                });
            }

            if let Some(post_id) = &output.post_id {
                let replaced = profile
                    .posts
                    .get_mut(post_id)
                    .map(|post| post.target.replace(&replacement, policy))
                    .unwrap_or(false);
                if !replaced {
                    return Err(AggregationError::MissingRank {
                        txid: txid.clone(),
                        target: target_label(
                            output.platform,
                            &output.profile_id,
                            Some(post_id.as_str()),
                        ),
                    });
                }
            }

            updated += 1;
        }

        Ok(updated)
    }

    pub fn profile(&self, platform: Platform, profile_id: &str) -> Option<&Profile> {
        self.profiles.get(&platform)?.get(profile_id)
    }

    pub fn post(&self, platform: Platform, profile_id: &str, post_id: &str) -> Option<&Post> {
        self.profile(platform, profile_id)?.posts.get(post_id)
    }

    pub fn profiles(&self, platform: Platform) -> Option<&ProfileMap> {
        self.profiles.get(&platform)
    }

    pub fn transaction(&self, txid: &str) -> Option<&Arc<RankTransaction>> {
        self.transactions.get(txid).map(|tracked| &tracked.tx)
    }

    pub fn contains_tx(&self, txid: &str) -> bool {
        self.transactions.contains_key(txid)
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.values().map(|profiles| profiles.len()).sum()
    }

    /// Profile and post rankings for a platform, best first
    pub fn rankings(&self, platform: Platform) -> Vec<IndexedRanking> {
        let Some(profiles) = self.profiles.get(&platform) else {
            return Vec::new();
        };

        let mut rows = Vec::new();
        for profile in profiles.values() {
            rows.push(indexed(&profile.target, profile.id(), None));
            for post in profile.posts.values() {
                rows.push(indexed(&post.target, &post.profile_id, Some(post.id())));
            }
        }

        rows.sort_by(|a, b| {
            b.ranking
                .cmp(&a.ranking)
                .then_with(|| a.profile_id.cmp(&b.profile_id))
                .then_with(|| a.post_id.cmp(&b.post_id))
        });
        rows
    }

    /// Copy of the current state for readers and persistence
    pub fn snapshot(&self) -> RankSnapshot {
        let mut profiles: Vec<Profile> = self
            .profiles
            .values()
            .flat_map(|profiles| profiles.values().cloned())
            .collect();
        profiles.sort_by(|a, b| {
            a.target
                .platform
                .cmp(&b.target.platform)
                .then_with(|| a.target.id.cmp(&b.target.id))
        });

        let mut tracked: Vec<&TrackedTx> = self.transactions.values().collect();
        tracked.sort_by_key(|tracked| tracked.seq);

        RankSnapshot {
            timestamp: chrono::Utc::now().timestamp(),
            profiles,
            transactions: tracked.into_iter().map(|t| Arc::clone(&t.tx)).collect(),
        }
    }

    /// Re-ingest a snapshot's transactions in their recorded order
    pub fn restore(&mut self, snapshot: &RankSnapshot) -> Result<usize, AggregationError> {
        self.replay(&snapshot.transactions)
    }

    /// Re-ingest persisted transactions in processing order
    pub fn replay(&mut self, transactions: &[Arc<RankTransaction>]) -> Result<usize, AggregationError> {
        let mut applied = 0;
        for tx in transactions {
            if self.ingest(RankTransaction::clone(tx))? == IngestOutcome::Applied {
                applied += 1;
            }
        }
        log::info!("Restored {} RANK txs from snapshot", applied);
        Ok(applied)
    }

    /// Re-check every invariant over the whole state
    pub fn verify(&self) -> Result<(), AggregationError> {
        let policy = self.policy.as_ref();
        let mut listed = 0;

        for (platform, profiles) in &self.profiles {
            for (profile_id, profile) in profiles {
                let profile_label = target_label(*platform, profile_id, None);
                verify_target(&profile.target, policy, &profile_label)?;

                if let Some(tx) = profile
                    .target
                    .ranks
                    .iter()
                    .find(|tx| !self.transactions.contains_key(&tx.txid))
                {
                    return Err(AggregationError::UnindexedRank {
                        txid: tx.txid.clone(),
                        target: profile_label,
                    });
                }
                if profile.target.is_empty() && !profile.posts.is_empty() {
                    return Err(AggregationError::DanglingPosts(profile_label));
                }

                for (post_id, post) in &profile.posts {
                    let post_label = target_label(*platform, profile_id, Some(post_id.as_str()));
                    verify_target(&post.target, policy, &post_label)?;
                    if let Some(tx) = post
                        .target
                        .ranks
                        .iter()
                        .find(|tx| !profile.target.contains(&tx.txid))
                    {
                        return Err(AggregationError::MissingRank {
                            txid: tx.txid.clone(),
                            target: profile_label,
                        });
                    }
                }

                listed += profile.target.ranks.len();
            }
        }

        if listed != self.transactions.len() {
            return Err(AggregationError::IndexSizeMismatch {
                indexed: self.transactions.len(),
                listed,
            });
        }

        Ok(())
    }
}

impl Default for RankAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl RankTarget {
    fn apply(&mut self, tx: Arc<RankTransaction>, policy: &dyn RankingPolicy) {
        match tx.sentiment() {
            Sentiment::Positive => self.votes_positive += 1,
            Sentiment::Negative => self.votes_negative += 1,
        }
        self.ranks.push(tx);
        self.ranking = policy.ranking(&self.ranks);
    }

    fn revert(&mut self, txid: &str, policy: &dyn RankingPolicy) -> Option<Arc<RankTransaction>> {
        let position = self.ranks.iter().position(|tx| tx.txid == txid)?;
        let tx = self.ranks.remove(position);
        match tx.sentiment() {
            Sentiment::Positive => self.votes_positive = self.votes_positive.saturating_sub(1),
            Sentiment::Negative => self.votes_negative = self.votes_negative.saturating_sub(1),
        }
        self.ranking = policy.ranking(&self.ranks);
        Some(tx)
    }

    fn replace(&mut self, updated: &Arc<RankTransaction>, policy: &dyn RankingPolicy) -> bool {
        let Some(slot) = self.ranks.iter_mut().find(|tx| tx.txid == updated.txid) else {
            return false;
        };
        *slot = Arc::clone(updated);
        self.ranking = policy.ranking(&self.ranks);
        true
    }
}

fn target_label(platform: Platform, profile_id: &str, post_id: Option<&str>) -> String {
    match post_id {
        Some(post_id) => format!("{}/{}/{}", platform, profile_id, post_id),
        None => format!("{}/{}", platform, profile_id),
    }
}

fn check_tally(target: &RankTarget, label: impl FnOnce() -> String) -> Result<(), AggregationError> {
    if target.votes_total() as usize != target.ranks.len() {
        return Err(AggregationError::TallyMismatch {
            target: label(),
            positive: target.votes_positive,
            negative: target.votes_negative,
            ranks: target.ranks.len(),
        });
    }
    Ok(())
}

fn verify_target(
    target: &RankTarget,
    policy: &dyn RankingPolicy,
    label: &str,
) -> Result<(), AggregationError> {
    let positive = target
        .ranks
        .iter()
        .filter(|tx| tx.sentiment() == Sentiment::Positive)
        .count() as u64;
    let negative = target.ranks.len() as u64 - positive;
    if positive != target.votes_positive || negative != target.votes_negative {
        return Err(AggregationError::TallyMismatch {
            target: label.to_string(),
            positive: target.votes_positive,
            negative: target.votes_negative,
            ranks: target.ranks.len(),
        });
    }

    let expected = policy.ranking(&target.ranks);
    if expected != target.ranking {
        return Err(AggregationError::RankingDrift {
            target: label.to_string(),
            stored: target.ranking,
            expected,
        });
    }

    Ok(())
}

fn indexed(target: &RankTarget, profile_id: &str, post_id: Option<&str>) -> IndexedRanking {
    IndexedRanking {
        platform: target.platform,
        profile_id: profile_id.to_string(),
        post_id: post_id.map(str::to_string),
        ranking: target.ranking,
        votes_positive: target.votes_positive,
        votes_negative: target.votes_negative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::policy::BurnWeighted;
    use crate::script_core::{to_rank_script, RankOutput};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    /// Helper to create a decoded RANK transaction
    fn make_tx(txid: &str, profile: &str, post: Option<&str>, sentiment: Sentiment) -> RankTransaction {
        let mut output = RankOutput::new(sentiment, Platform::Twitter, profile);
        output.post_id = post.map(str::to_string);
        let script = to_rank_script(&output).unwrap();
        RankTransaction::from_script(&script, txid, None, 1_000_000, 1_700_000_000).unwrap()
    }

    fn txids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_first_vote_creates_profile() {
        let mut agg = RankAggregator::new();
        let outcome = agg.ingest(make_tx("t1", "abc", None, Sentiment::Negative)).unwrap();
        assert_eq!(outcome, IngestOutcome::Applied);

        let profile = agg.profile(Platform::Twitter, "abc").unwrap();
        assert_eq!(profile.target.votes_positive, 0);
        assert_eq!(profile.target.votes_negative, 1);
        assert_eq!(profile.target.ranking, -1);
        assert_eq!(profile.target.ranks.len(), 1);
        assert!(profile.posts.is_empty());
    }

    #[test]
    fn test_tally_matches_votes() {
        let mut agg = RankAggregator::new();
        let (p, q) = (7, 4);
        for i in 0..p {
            agg.ingest(make_tx(&format!("p{}", i), "abc", None, Sentiment::Positive)).unwrap();
        }
        for i in 0..q {
            agg.ingest(make_tx(&format!("q{}", i), "abc", None, Sentiment::Negative)).unwrap();
        }

        let target = &agg.profile(Platform::Twitter, "abc").unwrap().target;
        assert_eq!(target.votes_positive, p);
        assert_eq!(target.votes_negative, q);
        assert_eq!(target.ranks.len() as u64, p + q);
        assert_eq!(target.ranking, p as i128 - q as i128);
        // ranks keep processing order
        assert_eq!(target.ranks[0].txid, "p0");
        assert_eq!(target.ranks[(p + q - 1) as usize].txid, "q3");
        agg.verify().unwrap();
    }

    #[test]
    fn test_duplicate_ingest_is_noop() {
        let mut agg = RankAggregator::new();
        agg.ingest(make_tx("t1", "abc", Some("100"), Sentiment::Positive)).unwrap();
        let before = agg.snapshot();

        let outcome = agg.ingest(make_tx("t1", "abc", Some("100"), Sentiment::Positive)).unwrap();
        assert_eq!(outcome, IngestOutcome::Duplicate);

        let after = agg.snapshot();
        assert_eq!(before.profiles, after.profiles);
        assert_eq!(before.transactions, after.transactions);
    }

    #[test]
    fn test_reorg_rollback_scenario() {
        let mut agg = RankAggregator::new();
        agg.ingest(make_tx("t1", "abc", None, Sentiment::Positive)).unwrap();
        agg.ingest(make_tx("t2", "abc", None, Sentiment::Negative)).unwrap();
        agg.ingest(make_tx("t3", "abc", None, Sentiment::Positive)).unwrap();

        let report = agg.rollback(&txids(&["t2"])).unwrap();
        assert_eq!(report.removed, txids(&["t2"]));
        assert!(report.missing.is_empty());

        let target = &agg.profile(Platform::Twitter, "abc").unwrap().target;
        assert_eq!(target.votes_positive, 2);
        assert_eq!(target.votes_negative, 0);
        assert_eq!(target.ranking, 2);
        assert_eq!(target.ranks.len(), 2);
        assert_eq!(target.ranks[0].txid, "t1");
        assert_eq!(target.ranks[1].txid, "t3");

        agg.rollback(&txids(&["t1", "t3"])).unwrap();
        assert!(agg.profile(Platform::Twitter, "abc").is_none());
        assert!(agg.profiles(Platform::Twitter).is_none());
        assert_eq!(agg.transaction_count(), 0);
        agg.verify().unwrap();
    }

    #[test]
    fn test_rollback_untracked_txid_is_reported() {
        let mut agg = RankAggregator::new();
        agg.ingest(make_tx("t1", "abc", None, Sentiment::Positive)).unwrap();

        let report = agg.rollback(&txids(&["below_burn", "t1"])).unwrap();
        assert_eq!(report.missing, txids(&["below_burn"]));
        assert_eq!(report.removed, txids(&["t1"]));
    }

    #[test]
    fn test_rolled_back_tx_can_be_ingested_again() {
        let mut agg = RankAggregator::new();
        agg.ingest(make_tx("t1", "abc", None, Sentiment::Positive)).unwrap();
        agg.rollback(&txids(&["t1"])).unwrap();
        let outcome = agg.ingest(make_tx("t1", "abc", None, Sentiment::Positive)).unwrap();
        assert_eq!(outcome, IngestOutcome::Applied);
        assert_eq!(agg.profile(Platform::Twitter, "abc").unwrap().target.ranking, 1);
    }

    #[test]
    fn test_post_votes_count_toward_profile() {
        let mut agg = RankAggregator::new();
        agg.ingest(make_tx("t1", "abc", Some("1453489038468431875"), Sentiment::Positive))
            .unwrap();
        agg.ingest(make_tx("t2", "abc", Some("1453489038468431875"), Sentiment::Positive))
            .unwrap();
        agg.ingest(make_tx("t3", "abc", None, Sentiment::Negative)).unwrap();

        let profile = agg.profile(Platform::Twitter, "abc").unwrap();
        assert_eq!(profile.target.ranks.len(), 3);
        assert_eq!(profile.target.ranking, 1);

        let post = agg
            .post(Platform::Twitter, "abc", "1453489038468431875")
            .unwrap();
        assert_eq!(post.profile_id, "abc");
        assert_eq!(post.target.votes_positive, 2);
        assert_eq!(post.target.ranking, 2);
        agg.verify().unwrap();
    }

    #[test]
    fn test_rollback_removes_empty_post_only() {
        let mut agg = RankAggregator::new();
        agg.ingest(make_tx("t1", "abc", Some("5"), Sentiment::Positive)).unwrap();
        agg.ingest(make_tx("t2", "abc", None, Sentiment::Positive)).unwrap();

        agg.rollback(&txids(&["t1"])).unwrap();
        let profile = agg.profile(Platform::Twitter, "abc").unwrap();
        assert!(profile.posts.is_empty());
        assert_eq!(profile.target.ranking, 1);
        agg.verify().unwrap();
    }

    #[test]
    fn test_out_of_order_arrival_converges() {
        let txs: Vec<RankTransaction> = (0..40)
            .map(|i| {
                let profile = ["abc", "def", "ghi"][i % 3];
                let post = if i % 4 == 0 { Some(["7", "8"][(i / 4) % 2]) } else { None };
                let sentiment = if i % 5 == 0 { Sentiment::Negative } else { Sentiment::Positive };
                make_tx(&format!("tx{}", i), profile, post, sentiment)
            })
            .collect();

        let mut in_order = RankAggregator::new();
        for tx in txs.clone() {
            in_order.ingest(tx).unwrap();
        }

        let mut shuffled = txs;
        shuffled.shuffle(&mut StdRng::seed_from_u64(7));
        let mut out_of_order = RankAggregator::new();
        for tx in shuffled {
            out_of_order.ingest(tx).unwrap();
        }
        out_of_order.verify().unwrap();

        assert_eq!(
            in_order.rankings(Platform::Twitter),
            out_of_order.rankings(Platform::Twitter)
        );
        for profile in in_order.profiles(Platform::Twitter).unwrap().values() {
            let other = out_of_order.profile(Platform::Twitter, profile.id()).unwrap();
            let mut a: Vec<&str> = profile.target.ranks.iter().map(|t| t.txid.as_str()).collect();
            let mut b: Vec<&str> = other.target.ranks.iter().map(|t| t.txid.as_str()).collect();
            a.sort_unstable();
            b.sort_unstable();
            assert_eq!(a, b);
            assert_eq!(profile.posts.len(), other.posts.len());
        }
    }

    #[test]
    fn test_confirm_sets_height_everywhere() {
        let mut agg = RankAggregator::new();
        agg.ingest(make_tx("t1", "abc", Some("9"), Sentiment::Positive)).unwrap();
        agg.ingest(make_tx("t2", "abc", None, Sentiment::Positive)).unwrap();

        let updated = agg.confirm(&txids(&["t1", "unknown"]), 812_000).unwrap();
        assert_eq!(updated, 1);
        assert_eq!(agg.transaction("t1").unwrap().height, Some(812_000));
        assert_eq!(agg.transaction("t2").unwrap().height, None);

        let profile = agg.profile(Platform::Twitter, "abc").unwrap();
        assert_eq!(profile.target.ranks[0].height, Some(812_000));
        assert_eq!(profile.posts["9"].target.ranks[0].height, Some(812_000));

        // clearing puts it back in the mempool view
        agg.set_height(&txids(&["t1"]), None).unwrap();
        assert!(!agg.transaction("t1").unwrap().is_confirmed());
        agg.verify().unwrap();
    }

    #[test]
    fn test_burn_weighted_policy() {
        let mut agg = RankAggregator::with_policy(Box::new(BurnWeighted));
        let mut heavy = make_tx("t1", "abc", None, Sentiment::Positive);
        heavy.sats = 50_000_000;
        agg.ingest(heavy).unwrap();
        agg.ingest(make_tx("t2", "abc", None, Sentiment::Negative)).unwrap();

        let target = &agg.profile(Platform::Twitter, "abc").unwrap().target;
        assert_eq!(target.ranking, 49_000_000);
        assert_eq!(agg.policy_name(), "burn");

        agg.rollback(&txids(&["t1"])).unwrap();
        let target = &agg.profile(Platform::Twitter, "abc").unwrap().target;
        assert_eq!(target.ranking, -1_000_000);
    }

    #[test]
    fn test_rankings_sorted_best_first() {
        let mut agg = RankAggregator::new();
        agg.ingest(make_tx("t1", "low", None, Sentiment::Negative)).unwrap();
        agg.ingest(make_tx("t2", "high", Some("1"), Sentiment::Positive)).unwrap();
        agg.ingest(make_tx("t3", "high", None, Sentiment::Positive)).unwrap();

        let rows = agg.rankings(Platform::Twitter);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].profile_id, "high");
        assert_eq!(rows[0].post_id, None);
        assert_eq!(rows[0].ranking, 2);
        assert_eq!(rows[1].post_id.as_deref(), Some("1"));
        assert_eq!(rows[2].profile_id, "low");
        assert_eq!(rows[2].ranking, -1);
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let mut agg = RankAggregator::new();
        agg.ingest(make_tx("t1", "abc", Some("3"), Sentiment::Positive)).unwrap();
        agg.ingest(make_tx("t2", "def", None, Sentiment::Negative)).unwrap();
        agg.ingest(make_tx("t3", "abc", None, Sentiment::Positive)).unwrap();
        let snapshot = agg.snapshot();
        assert_eq!(snapshot.profiles[0].id(), "abc");
        assert_eq!(snapshot.transactions[2].txid, "t3");

        let mut restored = RankAggregator::new();
        assert_eq!(restored.restore(&snapshot).unwrap(), 3);
        assert_eq!(restored.snapshot().profiles, snapshot.profiles);
        restored.verify().unwrap();
    }

    #[test]
    fn test_verify_detects_tampered_tally() {
        let mut agg = RankAggregator::new();
        agg.ingest(make_tx("t1", "abc", None, Sentiment::Positive)).unwrap();
        agg.profiles
            .get_mut(&Platform::Twitter)
            .unwrap()
            .get_mut("abc")
            .unwrap()
            .target
            .votes_positive += 1;

        assert!(matches!(
            agg.verify(),
            Err(AggregationError::TallyMismatch { .. })
        ));
    }

    #[test]
    fn test_verify_detects_ranking_drift() {
        let mut agg = RankAggregator::new();
        agg.ingest(make_tx("t1", "abc", None, Sentiment::Positive)).unwrap();
        agg.profiles
            .get_mut(&Platform::Twitter)
            .unwrap()
            .get_mut("abc")
            .unwrap()
            .target
            .ranking = 42;

        assert_eq!(
            agg.verify(),
            Err(AggregationError::RankingDrift {
                target: "twitter/abc".to_string(),
                stored: 42,
                expected: 1,
            })
        );
    }

    #[test]
    fn test_corrupted_counter_halts_rollback() {
        let mut agg = RankAggregator::new();
        agg.ingest(make_tx("t1", "abc", None, Sentiment::Positive)).unwrap();
        agg.ingest(make_tx("t2", "abc", None, Sentiment::Positive)).unwrap();
        {
            let target = &mut agg
                .profiles
                .get_mut(&Platform::Twitter)
                .unwrap()
                .get_mut("abc")
                .unwrap()
                .target;
            target.votes_positive = 0;
            target.votes_negative = 2;
        }

        assert!(matches!(
            agg.rollback(&txids(&["t1"])),
            Err(AggregationError::TallyMismatch { .. })
        ));
    }
}
