//! Editable view of an order's lines.
//!
//! The editor keeps the lines as loaded from the server untouched and applies
//! edits to a working copy. Lines are addressed by their resolved key (server
//! id, else client id), never by position.

use serde_json::Value;
use tracing::debug;

use crate::{
    diff::{DEFAULT_TRACKED_FIELDS, compute_line_diff},
    line::{Line, PatchOp, resolve_key},
    types::ObjectType,
};

use super::{ClientError, ObjectsClient, PatchLinesResult};

#[derive(Debug, Clone, PartialEq)]
pub struct LineEditor {
    original: Vec<Line>,
    current: Vec<Line>,
    tracked: Vec<String>,
}

impl LineEditor {
    /// Captures `lines` as the saved state.
    pub fn load(lines: Vec<Line>) -> Self {
        let mut editor = Self {
            original: Vec::new(),
            current: Vec::new(),
            tracked: DEFAULT_TRACKED_FIELDS.iter().map(|s| s.to_string()).collect(),
        };
        editor.reload(lines);
        editor
    }

    pub fn with_tracked_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tracked = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces both the saved state and the working copy.
    pub fn reload(&mut self, lines: Vec<Line>) {
        self.current = lines.clone();
        for line in &mut self.current {
            resolve_key(line);
        }
        self.original = lines;
    }

    pub fn original_lines(&self) -> &[Line] {
        &self.original
    }

    pub fn lines(&self) -> &[Line] {
        &self.current
    }

    /// Keys of the working lines, in display order.
    pub fn keys(&self) -> Vec<String> {
        self.current
            .iter()
            .filter_map(|l| l.identity().map(|i| i.key().to_string()))
            .collect()
    }

    /// Appends `line` and returns its key.
    pub fn add_line(&mut self, mut line: Line) -> String {
        let key = resolve_key(&mut line);
        self.current.push(line);
        key
    }

    /// Sets one field on the line with `key`. Returns false if no such line.
    pub fn update_field(&mut self, key: &str, name: &str, value: impl Into<Value>) -> bool {
        match self.position(key) {
            Some(idx) => {
                self.current[idx].fields.insert(name.to_string(), value.into());
                true
            }
            None => false,
        }
    }

    pub fn remove_line(&mut self, key: &str) -> Option<Line> {
        self.position(key).map(|idx| self.current.remove(idx))
    }

    pub fn line(&self, key: &str) -> Option<&Line> {
        self.position(key).map(|idx| &self.current[idx])
    }

    pub fn diff(&self) -> Vec<PatchOp> {
        compute_line_diff(&self.original, &self.current, &self.tracked)
    }

    pub fn is_dirty(&self) -> bool {
        !self.diff().is_empty()
    }

    /// Sends pending edits of order `id`. Nothing is sent when there are no
    /// edits; on success the server's lines become the new saved state.
    pub async fn submit(
        &mut self,
        client: &ObjectsClient,
        object_type: ObjectType,
        id: &str,
    ) -> Result<Option<PatchLinesResult>, ClientError> {
        let ops = self.diff();
        if ops.is_empty() {
            debug!(%object_type, id, "no line changes to submit");
            return Ok(None);
        }
        let result = client.patch_lines(object_type, id, ops).await?;
        if let Some(result) = &result {
            self.reload(result.lines.clone());
        }
        Ok(result)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.current
            .iter()
            .position(|l| l.identity().is_some_and(|i| i.key() == key))
    }
}
