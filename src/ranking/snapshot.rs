//! Snapshot persistence backends
//!
//! The aggregator hands out a `RankSnapshot` after each block; writers store
//! it as a pretty-printed JSON document or as SQLite tables. Each write
//! replaces the previous snapshot in full.

use super::types::{RankSnapshot, RankTarget, RankTransaction};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for SnapshotError {
    fn from(err: rusqlite::Error) -> Self {
        SnapshotError::Database(err.to_string())
    }
}

/// Backend trait for persisting ranking snapshots
#[async_trait]
pub trait SnapshotWriter: Send + Sync {
    async fn write_snapshot(&self, snapshot: &RankSnapshot) -> Result<(), SnapshotError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}

fn ensure_parent_dir(path: &Path) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub struct JsonSnapshotWriter {
    path: PathBuf,
}

impl JsonSnapshotWriter {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref().to_path_buf();
        ensure_parent_dir(&path)?;
        Ok(Self { path })
    }
}

#[async_trait]
impl SnapshotWriter for JsonSnapshotWriter {
    async fn write_snapshot(&self, snapshot: &RankSnapshot) -> Result<(), SnapshotError> {
        let json = serde_json::to_string_pretty(snapshot)?;

        // readers never see a half-written file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        log::debug!(
            "Saved {} profiles / {} txs to {}",
            snapshot.profiles.len(),
            snapshot.transactions.len(),
            self.path.display()
        );
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "JSON"
    }
}

/// Load a JSON snapshot; `None` when the file does not exist yet
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Option<RankSnapshot>, SnapshotError> {
    let path = path.as_ref();
    if !path.exists() {
        log::info!("No existing snapshot file found: {}", path.display());
        return Ok(None);
    }

    let json = fs::read_to_string(path)?;
    let snapshot: RankSnapshot = serde_json::from_str(&json)?;

    log::info!(
        "Loaded {} RANK txs from {}",
        snapshot.transactions.len(),
        path.display()
    );
    Ok(Some(snapshot))
}

pub struct SqliteSnapshotWriter {
    conn: Mutex<Connection>,
}

impl SqliteSnapshotWriter {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        ensure_parent_dir(db_path.as_ref())?;
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        // rankings are i128 and stored as decimal text
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS rank_transactions (
                txid TEXT PRIMARY KEY,
                seq INTEGER NOT NULL,
                platform TEXT NOT NULL,
                profile_id TEXT NOT NULL,
                post_id TEXT,
                sentiment TEXT NOT NULL,
                comment TEXT,
                height INTEGER,
                sats INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                script_payload TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS profiles (
                platform TEXT NOT NULL,
                profile_id TEXT NOT NULL,
                ranking TEXT NOT NULL,
                votes_positive INTEGER NOT NULL,
                votes_negative INTEGER NOT NULL,
                PRIMARY KEY (platform, profile_id)
            );
            CREATE TABLE IF NOT EXISTS posts (
                platform TEXT NOT NULL,
                profile_id TEXT NOT NULL,
                post_id TEXT NOT NULL,
                ranking TEXT NOT NULL,
                votes_positive INTEGER NOT NULL,
                votes_negative INTEGER NOT NULL,
                PRIMARY KEY (platform, profile_id, post_id)
            );
            CREATE INDEX IF NOT EXISTS idx_rank_tx_profile
                ON rank_transactions(platform, profile_id);",
        )?;

        log::info!("✅ SQLite snapshot store initialized with WAL mode");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Transactions from the last written snapshot, in processing order
    ///
    /// Records are rebuilt by decoding the stored script payload, so the
    /// aggregates can be replayed rather than trusted from the tables.
    pub fn load_transactions(&self) -> Result<Vec<Arc<RankTransaction>>, SnapshotError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| SnapshotError::Database("connection mutex poisoned".to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT txid, script_payload, height, sats, timestamp
             FROM rank_transactions ORDER BY seq",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<u32>>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut transactions = Vec::new();
        for row in rows {
            let (txid, payload, height, sats, timestamp) = row?;
            let script = hex::decode(&payload).map_err(|e| {
                SnapshotError::Database(format!("bad script payload for {}: {}", txid, e))
            })?;
            let sats = u64::try_from(sats)
                .map_err(|_| SnapshotError::Database(format!("negative sats for {}", txid)))?;
            let tx = RankTransaction::from_script(&script, txid.clone(), height, sats, timestamp)
                .ok_or_else(|| {
                    SnapshotError::Database(format!("stored script for {} is not RANK", txid))
                })?;
            transactions.push(Arc::new(tx));
        }

        log::info!("Loaded {} RANK txs from SQLite snapshot", transactions.len());
        Ok(transactions)
    }
}

fn to_sql_int(value: u64, field: &str) -> Result<i64, SnapshotError> {
    i64::try_from(value)
        .map_err(|_| SnapshotError::Database(format!("{} out of range: {}", field, value)))
}

fn insert_target(
    tx: &rusqlite::Transaction<'_>,
    sql: &str,
    target: &RankTarget,
    keys: &[&str],
) -> Result<(), SnapshotError> {
    let ranking = target.ranking.to_string();
    let positive = to_sql_int(target.votes_positive, "votes_positive")?;
    let negative = to_sql_int(target.votes_negative, "votes_negative")?;
    match keys {
        [platform, profile_id] => {
            tx.execute(sql, params![platform, profile_id, ranking, positive, negative])?
        }
        [platform, profile_id, post_id] => tx.execute(
            sql,
            params![platform, profile_id, post_id, ranking, positive, negative],
        )?,
        _ => return Err(SnapshotError::Database(format!("bad key arity {}", keys.len()))),
    };
    Ok(())
}

#[async_trait]
impl SnapshotWriter for SqliteSnapshotWriter {
    async fn write_snapshot(&self, snapshot: &RankSnapshot) -> Result<(), SnapshotError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| SnapshotError::Database("connection mutex poisoned".to_string()))?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM rank_transactions", [])?;
        tx.execute("DELETE FROM profiles", [])?;
        tx.execute("DELETE FROM posts", [])?;

        for (seq, rank) in snapshot.transactions.iter().enumerate() {
            let output = &rank.output;
            tx.execute(
                "INSERT INTO rank_transactions
                 (txid, seq, platform, profile_id, post_id, sentiment, comment,
                  height, sats, timestamp, script_payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    rank.txid,
                    seq as i64,
                    output.platform.as_str(),
                    output.profile_id,
                    output.post_id,
                    output.sentiment.as_str(),
                    output.comment,
                    rank.height,
                    to_sql_int(rank.sats, "sats")?,
                    rank.timestamp,
                    rank.script_payload,
                ],
            )?;
        }

        for profile in &snapshot.profiles {
            let platform = profile.target.platform.as_str();
            insert_target(
                &tx,
                "INSERT INTO profiles
                 (platform, profile_id, ranking, votes_positive, votes_negative)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                &profile.target,
                &[platform, profile.id()],
            )?;

            for post in profile.posts.values() {
                insert_target(
                    &tx,
                    "INSERT INTO posts
                     (platform, profile_id, post_id, ranking, votes_positive, votes_negative)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    &post.target,
                    &[platform, profile.id(), post.id()],
                )?;
            }
        }

        tx.commit()?;

        log::debug!(
            "✅ Flushed snapshot to SQLite ({} profiles, {} txs)",
            snapshot.profiles.len(),
            snapshot.transactions.len()
        );
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
