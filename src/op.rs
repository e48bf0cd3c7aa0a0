//! Store mutations as journaled. Every create, update, replace, delete and
//! line patch reduces to a full-record `Put` or a `Delete`, so replay never
//! re-runs business logic.

use serde::{Deserialize, Serialize};

use crate::{
    record::{ObjectKey, ObjectRecord},
    types::OpSeq,
};

/// Bumped whenever the JSON shape of [`StoredOp`] changes.
pub const OP_FORMAT_VERSION: u16 = 1;

/// Immutable operation appended to the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Write the full state of one record.
    Put {
        /// Record after the write.
        record: ObjectRecord,
    },
    /// Remove one record.
    Delete {
        /// Key of the removed record.
        key: ObjectKey,
    },
}

impl Op {
    /// Key touched by this op.
    pub fn key(&self) -> ObjectKey {
        match self {
            Self::Put { record } => record.key(),
            Self::Delete { key } => key.clone(),
        }
    }
}

/// An op with the sequence and time it was committed at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredOp {
    /// Strictly increasing, starting at 1.
    pub seq: OpSeq,
    /// Unix millis at commit.
    pub ts_ms: u64,
    pub op: Op,
}

/// What the journal actually stores in its payload column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredOpEnvelope {
    pub format_version: u16,
    pub stored: StoredOp,
}

impl StoredOpEnvelope {
    pub fn new(stored: StoredOp) -> Self {
        Self {
            format_version: OP_FORMAT_VERSION,
            stored,
        }
    }
}
