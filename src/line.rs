//! Order line model, line identity, and patch ops.
//!
//! A line is identified by exactly one stable key: its server `id` once the
//! backend has persisted it, otherwise a client-assigned `cid`. Positional
//! identity is never used, so inserting or removing a line cannot reassign
//! meaning to its neighbours.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Reserved prefix marking placeholder ids that the backend never assigned.
pub const TEMP_ID_PREFIX: &str = "tmp-";

/// Returns true when `id` is a client placeholder rather than a server id.
pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

/// Generates a fresh placeholder identity.
pub fn new_temp_id() -> String {
    format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4())
}

/// One row of a sales or purchase order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Line {
    /// Server-assigned identity; immutable once set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Client-assigned temporary identity; never reassigned once set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    /// Domain fields (`itemId`, `qty`, `uom`, ...).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Canonical identity of a line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LineIdentity {
    /// Identity assigned by the backend; known to the store.
    ServerId(String),
    /// Client-side identity for a line not yet persisted.
    ClientId(String),
}

impl LineIdentity {
    /// Canonical string key used for rendering and lookups.
    pub fn key(&self) -> &str {
        match self {
            Self::ServerId(k) | Self::ClientId(k) => k,
        }
    }

    /// True when the backend already knows this line.
    pub fn is_server(&self) -> bool {
        matches!(self, Self::ServerId(_))
    }
}

impl Line {
    /// Empty line without identity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Line carrying a server id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Builder-style field assignment.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Field lookup; JSON `null` reads as absent.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// Server id, if present and not a placeholder. Blank ids don't count.
    pub fn server_id(&self) -> Option<&str> {
        non_blank(&self.id).filter(|id| !is_temp_id(id))
    }

    /// Resolves identity without assigning one.
    pub fn identity(&self) -> Option<LineIdentity> {
        if let Some(id) = self.server_id() {
            return Some(LineIdentity::ServerId(id.to_string()));
        }
        non_blank(&self.cid)
            .or_else(|| non_blank(&self.id))
            .map(|k| LineIdentity::ClientId(k.to_string()))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Returns the stable key of `line`, assigning a fresh `cid` when it has no
/// identity yet. Repeated calls on the same line return the same key.
pub fn resolve_key(line: &mut Line) -> String {
    if let Some(identity) = line.identity() {
        return identity.key().to_string();
    }
    let cid = new_temp_id();
    line.cid = Some(cid.clone());
    cid
}

/// One edit sent to the patch-lines endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    /// Update an existing line (`id` set) or create a new one.
    Upsert {
        /// Server id of the line to update; absent for creates.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Client identity used as an idempotency token for creates.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cid: Option<String>,
        /// Changed or initial field values.
        #[serde(default)]
        patch: Map<String, Value>,
    },
    /// Remove a persisted line by server id.
    Remove {
        /// Server id of the line.
        id: String,
    },
}

impl PatchOp {
    /// True for removals.
    pub fn is_remove(&self) -> bool {
        matches!(self, Self::Remove { .. })
    }

    /// Server id referenced by this op, if any.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Upsert { id, .. } => id.as_deref(),
            Self::Remove { id } => Some(id),
        }
    }
}

/// Request body of the patch-lines endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PatchLinesRequest {
    /// Ops in application order.
    pub ops: Vec<PatchOp>,
}
