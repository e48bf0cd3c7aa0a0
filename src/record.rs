//! Stored object record, store key, draft, and patch types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    core::store::StoreError,
    types::{ObjectId, ObjectType, TenantId},
};

/// Body keys owned by the store; never taken from client payloads.
pub const RESERVED_KEYS: [&str; 5] = ["id", "type", "tenantId", "createdAt", "updatedAt"];

/// Store-native key tuple: partition key plus sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Partition key (tenant id).
    pub pk: String,
    /// Sort key, `<type>#<id>`.
    pub sk: String,
}

impl ObjectKey {
    /// Builds the key of one object.
    pub fn for_object(tenant_id: &str, object_type: ObjectType, id: &str) -> Self {
        Self {
            pk: tenant_id.to_string(),
            sk: format!("{}{id}", Self::type_prefix(object_type)),
        }
    }

    /// Sort-key prefix shared by every object of `object_type`.
    pub fn type_prefix(object_type: ObjectType) -> String {
        format!("{}#", object_type.as_str())
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.pk, self.sk)
    }
}

/// Fully materialized object as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Object type.
    pub object_type: ObjectType,
    /// Object id.
    pub id: ObjectId,
    /// Free-form JSON body without reserved keys.
    pub body: Map<String, Value>,
    /// Creation time in milliseconds since epoch.
    pub created_at_ms: u64,
    /// Last update time in milliseconds since epoch.
    pub updated_at_ms: u64,
}

impl ObjectRecord {
    /// Store key of this record.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::for_object(&self.tenant_id, self.object_type, &self.id)
    }

    /// Body field lookup; JSON `null` reads as absent.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name).filter(|v| !v.is_null())
    }

    /// Body string field lookup.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    /// Client-facing JSON: body merged with the reserved metadata keys.
    pub fn to_json(&self) -> Value {
        let mut out = self.body.clone();
        out.insert("id".to_string(), Value::String(self.id.clone()));
        out.insert(
            "type".to_string(),
            Value::String(self.object_type.as_str().to_string()),
        );
        out.insert("tenantId".to_string(), Value::String(self.tenant_id.clone()));
        out.insert("createdAt".to_string(), Value::from(self.created_at_ms));
        out.insert("updatedAt".to_string(), Value::from(self.updated_at_ms));
        Value::Object(out)
    }
}

/// Create payload for a new [`ObjectRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDraft {
    /// Object type to create.
    pub object_type: ObjectType,
    /// Client-supplied id; the store assigns one when absent.
    pub id: Option<ObjectId>,
    /// Body without reserved keys.
    pub body: Map<String, Value>,
}

impl ObjectDraft {
    /// Builds a draft from a request body, which must be a JSON object.
    pub fn from_body(object_type: ObjectType, body: Value) -> Result<Self, StoreError> {
        let Value::Object(mut body) = body else {
            return Err(StoreError::InvalidBody("body must be a JSON object".to_string()));
        };
        let id = match body.remove("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
            Some(Value::Null) | None => None,
            Some(Value::String(_)) => None,
            Some(_) => {
                return Err(StoreError::InvalidBody("id must be a string".to_string()));
            }
        };
        strip_reserved(&mut body);
        Ok(Self {
            object_type,
            id,
            body,
        })
    }
}

/// Sparse body patch: `null` removes a key, any other value overwrites it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectPatch(pub Map<String, Value>);

impl ObjectPatch {
    /// Builds a patch from a request body, which must be a JSON object.
    pub fn from_body(body: Value) -> Result<Self, StoreError> {
        let Value::Object(mut body) = body else {
            return Err(StoreError::InvalidBody("patch must be a JSON object".to_string()));
        };
        strip_reserved(&mut body);
        Ok(Self(body))
    }

    /// Adds one field assignment.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Applies this patch in place to `body`.
    pub fn apply_to(&self, body: &mut Map<String, Value>) {
        for (name, value) in &self.0 {
            if value.is_null() {
                body.remove(name);
            } else {
                body.insert(name.clone(), value.clone());
            }
        }
    }
}

fn strip_reserved(body: &mut Map<String, Value>) {
    for key in RESERVED_KEYS {
        body.remove(key);
    }
}
