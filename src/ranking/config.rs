//! Indexer configuration from environment variables

use super::policy::PolicyKind;
use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotBackend {
    #[default]
    Json,
    Sqlite,
}

impl FromStr for SnapshotBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(SnapshotBackend::Json),
            "sqlite" => Ok(SnapshotBackend::Sqlite),
            other => Err(format!("unknown snapshot backend: {}", other)),
        }
    }
}

/// Configuration for the rank indexer
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerConfig {
    /// Outputs burning fewer satoshis are decoded but not aggregated
    pub min_burn_sats: u64,

    /// Channel buffer size for chain event ingestion
    pub channel_buffer: usize,

    pub ranking_policy: PolicyKind,

    pub snapshot_backend: SnapshotBackend,

    pub snapshot_path: String,

    /// JSONL chain event feed replayed by the binary
    pub input_path: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            min_burn_sats: 1_000_000,
            channel_buffer: 10_000,
            ranking_policy: PolicyKind::Votes,
            snapshot_backend: SnapshotBackend::Json,
            snapshot_path: "data/rankings.json".to_string(),
            input_path: "data/chain_events.jsonl".to_string(),
        }
    }
}

impl IndexerConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `RANK_MIN_BURN_SATS` (default: 1000000)
    /// - `RANK_CHANNEL_BUFFER` (default: 10000)
    /// - `RANK_RANKING_POLICY` (votes | burn, default: votes)
    /// - `RANK_SNAPSHOT_BACKEND` (json | sqlite, default: json)
    /// - `RANK_SNAPSHOT_PATH` (default: data/rankings.json)
    /// - `RANK_INPUT_PATH` (default: data/chain_events.jsonl)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let channel_buffer = parse_var("RANK_CHANNEL_BUFFER", defaults.channel_buffer)?;
        if channel_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                var: "RANK_CHANNEL_BUFFER",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(Self {
            min_burn_sats: parse_var("RANK_MIN_BURN_SATS", defaults.min_burn_sats)?,
            channel_buffer,
            ranking_policy: parse_var("RANK_RANKING_POLICY", defaults.ranking_policy)?,
            snapshot_backend: parse_var("RANK_SNAPSHOT_BACKEND", defaults.snapshot_backend)?,
            snapshot_path: env::var("RANK_SNAPSHOT_PATH").unwrap_or(defaults.snapshot_path),
            input_path: env::var("RANK_INPUT_PATH").unwrap_or(defaults.input_path),
        })
    }
}

fn parse_var<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            var,
            reason: e.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test: the process environment is shared between test threads
    #[test]
    fn test_config_from_env() {
        for var in [
            "RANK_MIN_BURN_SATS",
            "RANK_CHANNEL_BUFFER",
            "RANK_RANKING_POLICY",
            "RANK_SNAPSHOT_BACKEND",
            "RANK_SNAPSHOT_PATH",
            "RANK_INPUT_PATH",
        ] {
            env::remove_var(var);
        }
        assert_eq!(IndexerConfig::from_env().unwrap(), IndexerConfig::default());

        env::set_var("RANK_MIN_BURN_SATS", "5000");
        env::set_var("RANK_RANKING_POLICY", "burn");
        env::set_var("RANK_SNAPSHOT_BACKEND", "SQLite");
        env::set_var("RANK_SNAPSHOT_PATH", "/tmp/rankings.db");
        let config = IndexerConfig::from_env().unwrap();
        assert_eq!(config.min_burn_sats, 5_000);
        assert_eq!(config.ranking_policy, PolicyKind::Burn);
        assert_eq!(config.snapshot_backend, SnapshotBackend::Sqlite);
        assert_eq!(config.snapshot_path, "/tmp/rankings.db");
        assert_eq!(config.channel_buffer, 10_000);

        env::set_var("RANK_MIN_BURN_SATS", "lots");
        assert!(matches!(
            IndexerConfig::from_env(),
            Err(ConfigError::InvalidValue { var: "RANK_MIN_BURN_SATS", .. })
        ));
        env::remove_var("RANK_MIN_BURN_SATS");

        env::set_var("RANK_CHANNEL_BUFFER", "0");
        assert!(IndexerConfig::from_env().is_err());

        // Cleanup
        for var in [
            "RANK_CHANNEL_BUFFER",
            "RANK_RANKING_POLICY",
            "RANK_SNAPSHOT_BACKEND",
            "RANK_SNAPSHOT_PATH",
        ] {
            env::remove_var(var);
        }
    }
}
