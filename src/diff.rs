//! Line-diff reconciler producing patch ops for the patch-lines endpoint.

use hashbrown::HashMap;
use serde_json::{Map, Value};

use crate::line::{Line, PatchOp};

/// Fields compared when no explicit list is given.
pub const DEFAULT_TRACKED_FIELDS: [&str; 3] = ["itemId", "qty", "uom"];

/// Computes the ops that turn `original` into `current`.
///
/// Removals come first, then upserts in `current` order. Only lines with a
/// real server id count as known to the backend; everything else is a create
/// and its op carries no `id`. The line's `cid` is not forwarded on creates.
/// Fields are compared by their string coercion, so `3` equals `"3"`.
pub fn compute_line_diff<S: AsRef<str>>(
    original: &[Line],
    current: &[Line],
    tracked_fields: &[S],
) -> Vec<PatchOp> {
    let before = index_by_server_id(original);
    let after = index_by_server_id(current);

    let mut removals = Vec::new();
    for line in original {
        let Some(id) = line.server_id() else {
            continue;
        };
        if !after.contains_key(id) {
            removals.push(PatchOp::Remove { id: id.to_string() });
        }
    }

    let mut upserts = Vec::new();
    for line in current {
        let known = line
            .server_id()
            .and_then(|id| before.get(id).map(|prev| (id, *prev)));

        match known {
            Some((id, prev)) => {
                let patch = changed_fields(prev, line, tracked_fields);
                if !patch.is_empty() {
                    upserts.push(PatchOp::Upsert {
                        id: Some(id.to_string()),
                        cid: None,
                        patch,
                    });
                }
            }
            None => {
                let mut patch = Map::new();
                for name in tracked_fields {
                    if let Some(v) = line.field(name.as_ref()) {
                        patch.insert(name.as_ref().to_string(), v.clone());
                    }
                }
                upserts.push(PatchOp::Upsert {
                    id: None,
                    cid: None,
                    patch,
                });
            }
        }
    }

    removals.extend(upserts);
    removals
}

/// [`compute_line_diff`] over [`DEFAULT_TRACKED_FIELDS`].
pub fn compute_default_line_diff(original: &[Line], current: &[Line]) -> Vec<PatchOp> {
    compute_line_diff(original, current, &DEFAULT_TRACKED_FIELDS)
}

fn index_by_server_id(lines: &[Line]) -> HashMap<&str, &Line> {
    lines
        .iter()
        .filter_map(|line| line.server_id().map(|id| (id, line)))
        .collect()
}

fn changed_fields<S: AsRef<str>>(prev: &Line, next: &Line, tracked: &[S]) -> Map<String, Value> {
    let mut patch = Map::new();
    for name in tracked {
        let name = name.as_ref();
        let a = prev.field(name);
        let b = next.field(name);
        if coerce_str(a) != coerce_str(b) {
            patch.insert(name.to_string(), b.cloned().unwrap_or(Value::Null));
        }
    }
    patch
}

/// String coercion with `null`/absent as the empty string.
pub fn coerce_str(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => number_str(n),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| coerce_str(Some(v)))
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

fn number_str(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    let Some(f) = n.as_f64() else {
        return n.to_string();
    };
    if f == 0.0 {
        return "0".to_string();
    }
    let abs = f.abs();
    if !(1e-6..1e21).contains(&abs) {
        // exponent form with an explicit sign on positive exponents: 1e+21, 1e-7
        let sci = format!("{f:e}");
        return match sci.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => sci,
        };
    }
    if f.fract() == 0.0 {
        format!("{f:.0}")
    } else {
        f.to_string()
    }
}
