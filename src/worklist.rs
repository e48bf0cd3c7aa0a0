//! Check-in worklist: an event's registrations with derived readiness.
//!
//! Blocker codes are derived from the registration body:
//!
//! | code             | condition                                        |
//! |------------------|--------------------------------------------------|
//! | `cancelled`      | `status == "cancelled"`                          |
//! | `payment_due`    | `paymentStatus` present and not `"paid"`         |
//! | `waiver_missing` | `waiverRequired == true`, `waiverSigned != true` |
//!
//! A registration is ready when it has no blockers and is not checked in.

use std::convert::Infallible;

use hashbrown::HashSet;
use serde_json::Value;

use crate::{
    core::store::{ObjectStore, QueryOptions},
    paginate::{Keyed, Page, PageRequest, StorePage, collect_filtered},
    record::{ObjectKey, ObjectRecord},
    types::ObjectType,
};

/// Reason a registration cannot be checked in yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockerCode {
    Cancelled,
    PaymentDue,
    WaiverMissing,
}

impl BlockerCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::PaymentDue => "payment_due",
            Self::WaiverMissing => "waiver_missing",
        }
    }
}

pub fn blocker_codes(rec: &ObjectRecord) -> Vec<BlockerCode> {
    let mut codes = Vec::new();
    if rec.str_field("status") == Some("cancelled") {
        codes.push(BlockerCode::Cancelled);
    }
    if rec
        .field("paymentStatus")
        .is_some_and(|payment| payment.as_str() != Some("paid"))
    {
        codes.push(BlockerCode::PaymentDue);
    }
    let waiver_required = rec.field("waiverRequired").and_then(Value::as_bool) == Some(true);
    let waiver_signed = rec.field("waiverSigned").and_then(Value::as_bool) == Some(true);
    if waiver_required && !waiver_signed {
        codes.push(BlockerCode::WaiverMissing);
    }
    codes
}

pub fn is_checked_in(rec: &ObjectRecord) -> bool {
    rec.field("checkedInAt").is_some()
}

/// One registration with its derived check-in state.
#[derive(Debug, Clone, PartialEq)]
pub struct WorklistRow {
    pub record: ObjectRecord,
    pub checked_in: bool,
    pub ready: bool,
    pub blocker_codes: Vec<BlockerCode>,
}

impl WorklistRow {
    pub fn from_record(record: ObjectRecord) -> Self {
        let blocker_codes = blocker_codes(&record);
        let checked_in = is_checked_in(&record);
        Self {
            ready: blocker_codes.is_empty() && !checked_in,
            checked_in,
            blocker_codes,
            record,
        }
    }

    /// Registration JSON plus `checkedIn`, `ready` and `blockerCodes`.
    pub fn to_json(&self) -> Value {
        let mut out = self.record.to_json();
        if let Value::Object(map) = &mut out {
            map.insert("checkedIn".to_string(), Value::Bool(self.checked_in));
            map.insert("ready".to_string(), Value::Bool(self.ready));
            map.insert(
                "blockerCodes".to_string(),
                Value::Array(
                    self.blocker_codes
                        .iter()
                        .map(|c| Value::String(c.as_str().to_string()))
                        .collect(),
                ),
            );
        }
        out
    }
}

impl Keyed for WorklistRow {
    fn store_key(&self) -> ObjectKey {
        self.record.key()
    }
}

/// Predicates of the worklist endpoint; every set predicate must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorklistFilter {
    pub status: Option<HashSet<String>>,
    pub checked_in: Option<bool>,
    pub ready: Option<bool>,
    /// Matches rows carrying any of these codes.
    pub blocker_codes: Option<HashSet<String>>,
    pub q: Option<String>,
}

impl WorklistFilter {
    pub fn matches(&self, row: &WorklistRow) -> bool {
        let rec = &row.record;
        if let Some(allowed) = &self.status {
            match rec.str_field("status") {
                Some(s) if allowed.contains(s) => {}
                _ => return false,
            }
        }
        if self.checked_in.is_some_and(|want| want != row.checked_in) {
            return false;
        }
        if self.ready.is_some_and(|want| want != row.ready) {
            return false;
        }
        if let Some(wanted) = &self.blocker_codes {
            if !row.blocker_codes.iter().any(|c| wanted.contains(c.as_str())) {
                return false;
            }
        }
        if let Some(q) = &self.q {
            let needle = q.to_lowercase();
            let hit = std::iter::once(rec.id.as_str())
                .chain(rec.str_field("name"))
                .chain(rec.str_field("email"))
                .any(|s| s.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Registrations of `event_id` that pass `filter`, at most `req.limit` of them.
pub fn worklist_page(
    store: &ObjectStore,
    tenant_id: &str,
    event_id: &str,
    filter: &WorklistFilter,
    start: Option<ObjectKey>,
    req: PageRequest,
) -> Page<WorklistRow> {
    let prefix = ObjectKey::type_prefix(ObjectType::Registration);
    let fetched: Result<_, Infallible> = collect_filtered(
        start,
        req,
        |after, size| {
            let page = store.query(
                tenant_id,
                &prefix,
                &QueryOptions::new(size).after(after.cloned()),
            );
            Ok(StorePage {
                items: page.items.into_iter().map(WorklistRow::from_record).collect(),
                last_key: page.last_key,
            })
        },
        |row| row.record.str_field("eventId") == Some(event_id) && filter.matches(row),
    );
    match fetched {
        Ok(page) => page,
        Err(never) => match never {},
    }
}
