use std::collections::BTreeMap;
use std::ops::Bound;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::{
    core::lines::{self, LINE_ID_PREFIX, LineApplyError, LinePatchOutcome},
    line::PatchOp,
    op::{Op, StoredOp},
    paginate::StorePage,
    record::{ObjectDraft, ObjectKey, ObjectPatch, ObjectRecord},
    types::{ObjectType, OpSeq},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(ObjectKey),
    #[error("object already exists: {0}")]
    AlreadyExists(ObjectKey),
    #[error("invalid body: {0}")]
    InvalidBody(String),
    #[error("{0} objects carry no lines")]
    NoLines(ObjectType),
    #[error(transparent)]
    Lines(#[from] LineApplyError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshotV1 {
    pub next_op_seq: OpSeq,
    pub records: Vec<ObjectRecord>,
}

/// Paging options for [`ObjectStore::query`] and [`ObjectStore::scan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub limit: usize,
    pub exclusive_start: Option<ObjectKey>,
}

impl QueryOptions {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            exclusive_start: None,
        }
    }

    pub fn after(mut self, key: Option<ObjectKey>) -> Self {
        self.exclusive_start = key;
        self
    }
}

/// Ordered single-table object store.
///
/// Records are keyed by `(pk, sk)` and iterated in key order. Every mutation
/// queues a [`StoredOp`] for the journal.
#[derive(Debug, Default)]
pub struct ObjectStore {
    records: BTreeMap<ObjectKey, ObjectRecord>,
    pending_ops: Vec<StoredOp>,
    next_op_seq: OpSeq,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self {
            next_op_seq: 1,
            ..Self::default()
        }
    }

    pub fn from_snapshot(snapshot: StoreSnapshotV1) -> Result<Self, StoreError> {
        let mut store = Self {
            next_op_seq: snapshot.next_op_seq.max(1),
            ..Self::default()
        };
        for rec in snapshot.records {
            let key = rec.key();
            if store.records.insert(key.clone(), rec).is_some() {
                return Err(StoreError::AlreadyExists(key));
            }
        }
        Ok(store)
    }

    pub fn export_snapshot(&self) -> StoreSnapshotV1 {
        StoreSnapshotV1 {
            next_op_seq: self.next_op_seq,
            records: self.records.values().cloned().collect(),
        }
    }

    /// Conditional put: fails when the key is taken.
    pub fn create(
        &mut self,
        tenant_id: &str,
        draft: ObjectDraft,
    ) -> Result<(ObjectRecord, StoredOp), StoreError> {
        let id = draft.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let key = ObjectKey::for_object(tenant_id, draft.object_type, &id);
        if self.records.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }

        let now = now_ms();
        let record = ObjectRecord {
            tenant_id: tenant_id.to_string(),
            object_type: draft.object_type,
            id,
            body: draft.body,
            created_at_ms: now,
            updated_at_ms: now,
        };
        let stored = self.put_record(record.clone());
        Ok((record, stored))
    }

    pub fn update(
        &mut self,
        key: &ObjectKey,
        patch: &ObjectPatch,
    ) -> Result<(ObjectRecord, StoredOp), StoreError> {
        let mut record = self.get_cloned(key).ok_or_else(|| StoreError::NotFound(key.clone()))?;
        patch.apply_to(&mut record.body);
        record.updated_at_ms = now_ms();
        let stored = self.put_record(record.clone());
        Ok((record, stored))
    }

    pub fn replace_body(
        &mut self,
        key: &ObjectKey,
        body: Map<String, Value>,
    ) -> Result<(ObjectRecord, StoredOp), StoreError> {
        let mut record = self.get_cloned(key).ok_or_else(|| StoreError::NotFound(key.clone()))?;
        record.body = body;
        record.updated_at_ms = now_ms();
        let stored = self.put_record(record.clone());
        Ok((record, stored))
    }

    pub fn delete(&mut self, key: &ObjectKey) -> Result<(ObjectRecord, StoredOp), StoreError> {
        let record = self
            .records
            .remove(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        let stored = self.push_op(Op::Delete { key: key.clone() });
        Ok((record, stored))
    }

    /// Applies patch-lines ops to the `lines` of an order object.
    pub fn patch_lines(
        &mut self,
        key: &ObjectKey,
        ops: &[PatchOp],
    ) -> Result<(ObjectRecord, LinePatchOutcome, StoredOp), StoreError> {
        let record = self.get(key).ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if !record.object_type.has_lines() {
            return Err(StoreError::NoLines(record.object_type));
        }

        let current = lines::lines_of(&record.body)?;
        let outcome = lines::apply_line_ops(current, ops, || {
            format!("{LINE_ID_PREFIX}{}", Uuid::new_v4())
        })?;

        let mut body = record.body.clone();
        lines::store_lines(&mut body, &outcome.lines)?;
        let (record, stored) = self.replace_body(key, body)?;
        Ok((record, outcome, stored))
    }

    pub fn apply_replayed_op(&mut self, stored: StoredOp) -> Result<(), StoreError> {
        match stored.op {
            Op::Put { record } => {
                self.records.insert(record.key(), record);
            }
            Op::Delete { key } => {
                // deleting an already-absent key is a no-op on replay
                self.records.remove(&key);
            }
        }
        self.bump_next_seq_from(stored.seq);
        Ok(())
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&ObjectRecord> {
        self.records.get(key)
    }

    pub fn get_cloned(&self, key: &ObjectKey) -> Option<ObjectRecord> {
        self.get(key).cloned()
    }

    /// Items of partition `pk` whose sort key starts with `sk_prefix`, in
    /// sort-key order. `last_key` is set only when more items remain.
    ///
    /// A start key outside the partition/prefix is ignored so a cursor minted
    /// for another tenant or type cannot cross over.
    pub fn query(&self, pk: &str, sk_prefix: &str, opts: &QueryOptions) -> StorePage<ObjectRecord> {
        let start = match &opts.exclusive_start {
            Some(k) if k.pk == pk && k.sk.starts_with(sk_prefix) => Bound::Excluded(k.clone()),
            Some(k) => {
                warn!(pk, sk_prefix, start = %k, "ignoring foreign start key");
                Bound::Included(prefix_key(pk, sk_prefix))
            }
            None => Bound::Included(prefix_key(pk, sk_prefix)),
        };

        let matching = self
            .records
            .range((start, Bound::Unbounded))
            .take_while(|(k, _)| k.pk == pk && k.sk.starts_with(sk_prefix))
            .map(|(_, rec)| rec);
        collect_page(matching, opts.limit)
    }

    /// Every partition, in key order.
    pub fn scan(&self, opts: &QueryOptions) -> StorePage<ObjectRecord> {
        let start = match &opts.exclusive_start {
            Some(k) => Bound::Excluded(k.clone()),
            None => Bound::Unbounded,
        };
        collect_page(
            self.records.range((start, Bound::Unbounded)).map(|(_, rec)| rec),
            opts.limit,
        )
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn drain_pending_ops(&mut self) -> Vec<StoredOp> {
        std::mem::take(&mut self.pending_ops)
    }

    pub fn latest_op_seq(&self) -> OpSeq {
        self.next_op_seq.saturating_sub(1)
    }

    fn put_record(&mut self, record: ObjectRecord) -> StoredOp {
        self.records.insert(record.key(), record.clone());
        self.push_op(Op::Put { record })
    }

    fn push_op(&mut self, op: Op) -> StoredOp {
        let seq = self.take_next_op_seq();
        let stored = StoredOp {
            seq,
            ts_ms: now_ms(),
            op,
        };
        self.pending_ops.push(stored.clone());
        stored
    }

    fn take_next_op_seq(&mut self) -> OpSeq {
        let seq = self.next_op_seq.max(1);
        self.next_op_seq = seq + 1;
        seq
    }

    fn bump_next_seq_from(&mut self, seq: OpSeq) {
        self.next_op_seq = self.next_op_seq.max(seq.saturating_add(1));
    }
}

fn prefix_key(pk: &str, sk_prefix: &str) -> ObjectKey {
    ObjectKey {
        pk: pk.to_string(),
        sk: sk_prefix.to_string(),
    }
}

fn collect_page<'a>(
    mut iter: impl Iterator<Item = &'a ObjectRecord>,
    limit: usize,
) -> StorePage<ObjectRecord> {
    let items: Vec<ObjectRecord> = iter.by_ref().take(limit.max(1)).cloned().collect();
    let more = iter.next().is_some();
    let last_key = if more { items.last().map(ObjectRecord::key) } else { None };
    StorePage { items, last_key }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
