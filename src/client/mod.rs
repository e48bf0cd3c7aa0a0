//! Caller-side pieces: session context, typed API client, and the order line
//! editor that produces patch ops.

pub mod editor;
pub mod objects;
pub mod session;

use thiserror::Error;

pub use editor::LineEditor;
pub use objects::{ListParams, ListResult, ObjectsClient, PatchLinesResult};
pub use session::Session;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not logged in")]
    NotLoggedIn,
    #[error("request failed with status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// HTTP status of a failed call, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
