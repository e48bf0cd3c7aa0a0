//! Generic object listing with optional in-memory filters.

use hashbrown::HashSet;
use serde_json::Value;

use crate::{
    core::store::{ObjectStore, QueryOptions},
    paginate::{Page, PageRequest, collect_filtered},
    record::{ObjectKey, ObjectRecord},
    types::ObjectType,
};

/// Filters accepted by the plain list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Case-insensitive substring over the id and top-level string fields.
    pub q: Option<String>,
    /// Allowed values of `status`.
    pub status: Option<HashSet<String>>,
}

impl ListFilter {
    /// True when no predicate is set.
    pub fn is_empty(&self) -> bool {
        self.q.is_none() && self.status.is_none()
    }

    pub fn matches(&self, rec: &ObjectRecord) -> bool {
        if let Some(allowed) = &self.status {
            match rec.str_field("status") {
                Some(s) if allowed.contains(s) => {}
                _ => return false,
            }
        }
        if let Some(q) = &self.q {
            let needle = q.to_lowercase();
            let hit = rec.id.to_lowercase().contains(&needle)
                || rec
                    .body
                    .values()
                    .filter_map(Value::as_str)
                    .any(|s| s.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Lists one object type of one tenant. Without filters this is a single
/// store page; with filters it runs the capped post-filter loop.
pub fn list_page(
    store: &ObjectStore,
    tenant_id: &str,
    object_type: ObjectType,
    filter: &ListFilter,
    start: Option<ObjectKey>,
    req: PageRequest,
) -> Page<ObjectRecord> {
    let prefix = ObjectKey::type_prefix(object_type);
    if filter.is_empty() {
        let page = store.query(tenant_id, &prefix, &QueryOptions::new(req.limit).after(start));
        return Page {
            items: page.items,
            next: page.last_key,
        };
    }

    let fetched: Result<_, std::convert::Infallible> = collect_filtered(
        start,
        req,
        |after, size| {
            Ok(store.query(
                tenant_id,
                &prefix,
                &QueryOptions::new(size).after(after.cloned()),
            ))
        },
        |rec| filter.matches(rec),
    );
    match fetched {
        Ok(page) => page,
        Err(never) => match never {},
    }
}
