//! Core data structures for ranking aggregation
//!
//! `RankTransaction` records are immutable once decoded and shared through
//! `Arc` between the transaction index and every target listing them.

use crate::script_core::{DecodeError, Platform, RankOutput, ScriptProcessor, Sentiment};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A decoded RANK output plus its transaction metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankTransaction {
    pub txid: String,
    /// Raw output script, lowercase hex
    pub script_payload: String,
    #[serde(flatten)]
    pub output: RankOutput,
    /// `None` while the transaction is unconfirmed
    pub height: Option<u32>,
    /// Burned value in satoshis
    pub sats: u64,
    /// Unix seconds
    pub timestamp: i64,
}

impl RankTransaction {
    /// Decode `script` and build the record; `None` for non-RANK scripts
    pub fn from_script(
        script: &[u8],
        txid: impl Into<String>,
        height: Option<u32>,
        sats: u64,
        timestamp: i64,
    ) -> Option<Self> {
        let output = ScriptProcessor::new(script).process_rank()?;
        Some(Self::from_output(output, script, txid, height, sats, timestamp))
    }

    pub fn from_output(
        output: RankOutput,
        script: &[u8],
        txid: impl Into<String>,
        height: Option<u32>,
        sats: u64,
        timestamp: i64,
    ) -> Self {
        Self {
            txid: txid.into(),
            script_payload: hex::encode(script),
            output,
            height,
            sats,
            timestamp,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.height.is_some()
    }

    pub fn sentiment(&self) -> Sentiment {
        self.output.sentiment
    }

    /// Copy of this record with a different height
    pub fn with_height(&self, height: Option<u32>) -> Self {
        Self {
            height,
            ..self.clone()
        }
    }
}

/// Raw output as delivered by the chain source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainOutput {
    pub txid: String,
    #[serde(with = "hex::serde")]
    pub script: Vec<u8>,
    #[serde(default)]
    pub height: Option<u32>,
    pub sats: u64,
    pub timestamp: i64,
}

impl ChainOutput {
    pub fn decode(&self) -> Result<RankTransaction, DecodeError> {
        let output = ScriptProcessor::new(&self.script).decode()?;
        Ok(RankTransaction::from_output(
            output,
            &self.script,
            self.txid.clone(),
            self.height,
            self.sats,
            self.timestamp,
        ))
    }
}

/// Block metadata from the chain source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub hash: String,
    pub height: u32,
    pub timestamp: i64,
    /// Number of RANK transactions in the block
    #[serde(default)]
    pub ranks_length: usize,
    /// Only used for reorg detection upstream; never persisted
    #[serde(default, skip_serializing)]
    pub prevhash: Option<String>,
}

/// Aggregate shared by profiles and posts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankTarget {
    pub id: String,
    pub platform: Platform,
    pub ranking: i128,
    /// Contributing transactions in processing order
    pub ranks: Vec<Arc<RankTransaction>>,
    pub votes_positive: u64,
    pub votes_negative: u64,
}

impl RankTarget {
    pub fn new(platform: Platform, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            platform,
            ranking: 0,
            ranks: Vec::new(),
            votes_positive: 0,
            votes_negative: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.ranks.iter().any(|tx| tx.txid == txid)
    }

    pub fn votes_total(&self) -> u64 {
        self.votes_positive + self.votes_negative
    }
}

/// Profile aggregate with the posts ranked under it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub target: RankTarget,
    #[serde(default)]
    pub posts: PostMap,
}

impl Profile {
    pub fn new(platform: Platform, profile_id: impl Into<String>) -> Self {
        Self {
            target: RankTarget::new(platform, profile_id),
            posts: PostMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.target.id
    }
}

/// Post aggregate; `profile_id` is a back-reference by key, not ownership
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub target: RankTarget,
    pub profile_id: String,
}

impl Post {
    pub fn new(platform: Platform, post_id: impl Into<String>, profile_id: impl Into<String>) -> Self {
        Self {
            target: RankTarget::new(platform, post_id),
            profile_id: profile_id.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.target.id
    }
}

pub type ProfileMap = HashMap<String, Profile>;
pub type PostMap = HashMap<String, Post>;

/// Flattened ranking row for the query layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedRanking {
    pub platform: Platform,
    pub profile_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    pub ranking: i128,
    pub votes_positive: u64,
    pub votes_negative: u64,
}

/// Consistent copy of the aggregator state handed to readers and writers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankSnapshot {
    pub timestamp: i64,
    /// Sorted by platform, then profile ID
    pub profiles: Vec<Profile>,
    /// Every tracked transaction in processing order
    pub transactions: Vec<Arc<RankTransaction>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script_core::to_rank_script;

    #[test]
    fn test_from_script_keeps_hex_payload() {
        let output = RankOutput::new(Sentiment::Positive, Platform::Twitter, "abc");
        let script = to_rank_script(&output).unwrap();
        let tx = RankTransaction::from_script(&script, "aa11", None, 1_000_000, 1_700_000_000)
            .unwrap();

        assert_eq!(tx.script_payload, hex::encode(&script));
        assert!(tx.script_payload.starts_with("6a0452414e4b51"));
        assert_eq!(tx.output, output);
        assert!(!tx.is_confirmed());
        assert!(tx.with_height(Some(10)).is_confirmed());
    }

    #[test]
    fn test_from_script_rejects_garbage() {
        assert!(RankTransaction::from_script(&[0x6a, 0x01], "aa", None, 0, 0).is_none());
    }

    #[test]
    fn test_chain_output_json() {
        let output = RankOutput::new(Sentiment::Negative, Platform::Twitter, "abc").with_post("99");
        let script = to_rank_script(&output).unwrap();
        let json = format!(
            r#"{{"txid":"ff00","script":"{}","height":812345,"sats":5000000,"timestamp":1700000000}}"#,
            hex::encode(&script)
        );
        let chain_output: ChainOutput = serde_json::from_str(&json).unwrap();
        let tx = chain_output.decode().unwrap();
        assert_eq!(tx.height, Some(812_345));
        assert_eq!(tx.output.post_id.as_deref(), Some("99"));
        assert_eq!(tx.sentiment(), Sentiment::Negative);
    }

    #[test]
    fn test_block_prevhash_not_persisted() {
        let block = Block {
            hash: "00ab".to_string(),
            height: 5,
            timestamp: 1_700_000_000,
            ranks_length: 0,
            prevhash: Some("00aa".to_string()),
        };
        let json = serde_json::to_string(&block).unwrap();
        assert!(!json.contains("prevhash"));
        assert!(json.contains("\"ranksLength\":0"));
    }

    #[test]
    fn test_transaction_json_shape() {
        let output = RankOutput::new(Sentiment::Positive, Platform::Twitter, "abc");
        let script = to_rank_script(&output).unwrap();
        let tx = RankTransaction::from_script(&script, "01", Some(3), 10, 20).unwrap();
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["sentiment"], "positive");
        assert_eq!(value["platform"], "twitter");
        assert_eq!(value["profileId"], "abc");
        assert_eq!(value["scriptPayload"], hex::encode(&script));

        let back: RankTransaction = serde_json::from_value(value).unwrap();
        assert_eq!(back, tx);
    }
}
