//! Server-side application of patch-lines ops to an order's `lines` array.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::line::{Line, PatchOp};

/// Body key holding an order's lines.
pub const LINES_FIELD: &str = "lines";

/// Prefix of server-assigned line ids.
pub const LINE_ID_PREFIX: &str = "L-";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineApplyError {
    #[error("line not found: {0}")]
    UnknownLine(String),
    #[error("malformed lines: {0}")]
    Malformed(String),
}

/// Server id handed out for a line created from a client `cid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAssignment {
    pub cid: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinePatchOutcome {
    pub lines: Vec<Line>,
    pub created: Vec<LineAssignment>,
}

pub fn lines_of(body: &Map<String, Value>) -> Result<Vec<Line>, LineApplyError> {
    match body.get(LINES_FIELD) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| LineApplyError::Malformed(e.to_string())),
    }
}

pub fn store_lines(body: &mut Map<String, Value>, lines: &[Line]) -> Result<(), LineApplyError> {
    let value = serde_json::to_value(lines).map_err(|e| LineApplyError::Malformed(e.to_string()))?;
    body.insert(LINES_FIELD.to_string(), value);
    Ok(())
}

/// Applies `ops` in order. Creates get an id from `new_id`; a create whose
/// `cid` already names a line updates that line instead, so a retried submit
/// does not duplicate it.
pub fn apply_line_ops(
    mut lines: Vec<Line>,
    ops: &[PatchOp],
    mut new_id: impl FnMut() -> String,
) -> Result<LinePatchOutcome, LineApplyError> {
    let mut created = Vec::new();

    for op in ops {
        match op {
            PatchOp::Remove { id } => {
                let pos = position_by_id(&lines, id)
                    .ok_or_else(|| LineApplyError::UnknownLine(id.clone()))?;
                lines.remove(pos);
            }
            PatchOp::Upsert {
                id: Some(id),
                patch,
                ..
            } => {
                let pos = position_by_id(&lines, id)
                    .ok_or_else(|| LineApplyError::UnknownLine(id.clone()))?;
                merge_fields(&mut lines[pos], patch);
            }
            PatchOp::Upsert { id: None, cid, patch } => {
                let retried = cid
                    .as_deref()
                    .and_then(|cid| lines.iter().position(|l| l.cid.as_deref() == Some(cid)));
                if let Some(pos) = retried {
                    merge_fields(&mut lines[pos], patch);
                    continue;
                }

                let id = new_id();
                let mut line = Line::with_id(id.clone());
                line.cid = cid.clone();
                merge_fields(&mut line, patch);
                if let Some(cid) = cid {
                    created.push(LineAssignment {
                        cid: cid.clone(),
                        id,
                    });
                }
                lines.push(line);
            }
        }
    }

    Ok(LinePatchOutcome { lines, created })
}

fn position_by_id(lines: &[Line], id: &str) -> Option<usize> {
    lines.iter().position(|l| l.id.as_deref() == Some(id))
}

fn merge_fields(line: &mut Line, patch: &Map<String, Value>) {
    for (name, value) in patch {
        // identity is never patched
        if name == "id" || name == "cid" {
            continue;
        }
        if value.is_null() {
            line.fields.remove(name);
        } else {
            line.fields.insert(name.clone(), value.clone());
        }
    }
}
