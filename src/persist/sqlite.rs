//! SQLite journal of object ops plus periodic store snapshots.
//!
//! `events` holds one row per [`StoredOp`] keyed by `seq`, with the touched
//! `(pk, sk)` denormalized for per-object history. `snapshots` holds full
//! store images; loading takes the newest image and replays the tail.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    core::store::{ObjectStore, StoreSnapshotV1},
    op::{OP_FORMAT_VERSION, Op, StoredOp, StoredOpEnvelope},
    record::ObjectKey,
    types::OpSeq,
};

use super::{OpSink, PersistError, PersistResult};

/// Stored in `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;
const SNAPSHOT_FORMAT_VERSION: u16 = 1;
/// Older snapshots beyond this many are pruned on write.
const SNAPSHOTS_KEPT: i64 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotEnvelope {
    format_version: u16,
    snapshot: StoreSnapshotV1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Put = 1,
    Delete = 2,
}

impl OpKind {
    fn of(op: &Op) -> Self {
        match op {
            Op::Put { .. } => Self::Put,
            Op::Delete { .. } => Self::Delete,
        }
    }
}

/// Journal row as read back, before payload decoding.
struct RawEvent {
    seq: i64,
    ts_ms: i64,
    payload: Vec<u8>,
}

pub struct SqliteOpSink {
    conn: Connection,
}

impl SqliteOpSink {
    /// Opens or creates the journal at `path` in WAL mode.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> PersistResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> PersistResult<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        match version {
            0 => {
                conn.execute_batch(include_str!("schema.sql"))?;
                conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
                debug!(version = SCHEMA_VERSION, "journal schema created");
            }
            SCHEMA_VERSION => {}
            other => {
                return Err(PersistError::Message(format!(
                    "unsupported journal schema version {other}"
                )));
            }
        }
        Ok(Self { conn })
    }

    /// Rebuilds the store from the newest snapshot and the events after it.
    pub fn load_store(&self) -> PersistResult<ObjectStore> {
        let mut store = match self.latest_snapshot()? {
            Some(snapshot) => ObjectStore::from_snapshot(snapshot)?,
            None => ObjectStore::new(),
        };
        let tail = self.load_events_after(store.latest_op_seq())?;
        let replayed = tail.len();
        for stored in tail {
            store.apply_replayed_op(stored)?;
        }
        info!(objects = store.len(), replayed, "store loaded from journal");
        Ok(store)
    }

    /// Events with `seq > after`, in sequence order.
    pub fn load_events_after(&self, after: OpSeq) -> PersistResult<Vec<StoredOp>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT seq, ts_ms, payload FROM events WHERE seq > ?1 ORDER BY seq")?;
        let raw = stmt
            .query_map(params![after as i64], read_raw_event)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(decode_event).collect()
    }

    /// Every journaled op that touched `key`, oldest first.
    pub fn key_history(&self, key: &ObjectKey) -> PersistResult<Vec<StoredOp>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT seq, ts_ms, payload FROM events WHERE pk = ?1 AND sk = ?2 ORDER BY seq",
        )?;
        let raw = stmt
            .query_map(params![key.pk, key.sk], read_raw_event)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(decode_event).collect()
    }

    /// Stores a full image covering every op up to `last_seq`.
    pub fn write_snapshot(&mut self, snapshot: &StoreSnapshotV1, last_seq: OpSeq) -> PersistResult<()> {
        let payload = serde_json::to_vec(&SnapshotEnvelope {
            format_version: SNAPSHOT_FORMAT_VERSION,
            snapshot: snapshot.clone(),
        })?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO snapshots(last_seq, ts_ms, payload) VALUES (?1, ?2, ?3)",
            params![last_seq as i64, now_ms() as i64, payload],
        )?;
        let pruned = tx.execute(
            "DELETE FROM snapshots WHERE id NOT IN (SELECT id FROM snapshots ORDER BY id DESC LIMIT ?1)",
            params![SNAPSHOTS_KEPT],
        )?;
        tx.commit()?;
        debug!(last_seq, objects = snapshot.records.len(), pruned, "snapshot written");
        Ok(())
    }

    /// Drops journal rows with `seq <= through`; returns how many went.
    pub fn compact_through(&mut self, through: OpSeq) -> PersistResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM events WHERE seq <= ?1", params![through as i64])?;
        debug!(through, removed, "journal compacted");
        Ok(removed)
    }

    /// Highest journaled seq, 0 when empty.
    pub fn latest_seq(&self) -> PersistResult<OpSeq> {
        let seq: Option<i64> = self
            .conn
            .query_row("SELECT MAX(seq) FROM events", [], |row| row.get(0))?;
        Ok(seq.map_or(0, |s| s as OpSeq))
    }

    pub fn snapshot_count(&self) -> PersistResult<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn latest_snapshot(&self) -> PersistResult<Option<StoreSnapshotV1>> {
        let payload: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT payload FROM snapshots ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let Some(payload) = payload else {
            return Ok(None);
        };

        let env: SnapshotEnvelope = serde_json::from_slice(&payload)?;
        if env.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(PersistError::Message(format!(
                "unsupported snapshot format version {}",
                env.format_version
            )));
        }
        Ok(Some(env.snapshot))
    }
}

impl OpSink for SqliteOpSink {
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq> {
        let Some(last) = ops.last() else {
            return self.latest_seq();
        };

        let tx = self.conn.transaction()?;
        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO events(seq, ts_ms, kind, pk, sk, payload) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for stored in ops {
                let ObjectKey { pk, sk } = stored.op.key();
                let payload = serde_json::to_vec(&StoredOpEnvelope::new(stored.clone()))?;
                insert.execute(params![
                    stored.seq as i64,
                    stored.ts_ms as i64,
                    OpKind::of(&stored.op) as i64,
                    pk,
                    sk,
                    payload,
                ])?;
            }
        }
        tx.commit()?;
        Ok(last.seq)
    }

    fn flush(&mut self) -> PersistResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }

    fn write_snapshot(&mut self, snapshot: &StoreSnapshotV1, last_seq: OpSeq) -> PersistResult<()> {
        SqliteOpSink::write_snapshot(self, snapshot, last_seq)
    }

    fn compact_through(&mut self, seq: OpSeq) -> PersistResult<usize> {
        SqliteOpSink::compact_through(self, seq)
    }
}

fn read_raw_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEvent> {
    Ok(RawEvent {
        seq: row.get(0)?,
        ts_ms: row.get(1)?,
        payload: row.get(2)?,
    })
}

/// Row columns are authoritative for `seq` and `ts_ms`.
fn decode_event(raw: RawEvent) -> PersistResult<StoredOp> {
    let env: StoredOpEnvelope = serde_json::from_slice(&raw.payload)?;
    if env.format_version != OP_FORMAT_VERSION {
        return Err(PersistError::Message(format!(
            "unsupported op format version {} at seq {}",
            env.format_version, raw.seq
        )));
    }
    let mut stored = env.stored;
    stored.seq = raw.seq as OpSeq;
    stored.ts_ms = raw.ts_ms as u64;
    Ok(stored)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
