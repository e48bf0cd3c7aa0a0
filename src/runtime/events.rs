//! Runtime event stream payloads.

use crate::{record::ObjectKey, types::OpSeq};

/// Events emitted from the single-writer runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectEvent {
    /// A new object was created.
    Created {
        /// Created object key.
        key: ObjectKey,
    },
    /// An object body was updated.
    Updated {
        /// Updated object key.
        key: ObjectKey,
    },
    /// An object was deleted.
    Deleted {
        /// Deleted object key.
        key: ObjectKey,
    },
    /// Patch-lines ops were applied to an order.
    LinesPatched {
        /// Order key.
        key: ObjectKey,
        /// Number of ops applied.
        ops: usize,
    },
    /// Persistence has reached at least this op sequence.
    DurableUpTo {
        /// Highest sequence known durable.
        op_seq: OpSeq,
    },
}
