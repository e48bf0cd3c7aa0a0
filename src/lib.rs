//! Multi-tenant objects backend: CRUD over typed JSON objects, cursor
//! pagination with in-memory filters, and reconciled order-line editing,
//! backed by a single-writer store with an append-only SQLite journal.
//!
//! # Examples
//!
//! Diffing order lines into patch ops:
//! ```
//! use tenant_objects::{
//!     diff::compute_default_line_diff,
//!     line::{Line, PatchOp},
//! };
//!
//! let original = vec![Line::with_id("L1").set("qty", 2)];
//! let current = vec![Line::with_id("L1").set("qty", 3)];
//! let ops = compute_default_line_diff(&original, &current);
//! assert!(matches!(&ops[..], [PatchOp::Upsert { id: Some(id), .. }] if id == "L1"));
//! ```
//!
//! Serving requests from an in-memory service:
//! ```no_run
//! use serde_json::json;
//! use tenant_objects::{
//!     api::{App, ApiRequest, Method},
//!     config::ServiceConfig,
//!     core::store::ObjectStore,
//!     runtime::handle::spawn_service,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = ServiceConfig::default();
//! let handle = spawn_service(ObjectStore::new(), None, config.runtime.clone());
//! let app = App::new(handle, config);
//! let resp = app
//!     .dispatch(
//!         ApiRequest::new(Method::Post, "/objects/product")
//!             .header("x-tenant-id", "T1")
//!             .json_body(json!({ "name": "Widget" })),
//!     )
//!     .await;
//! assert_eq!(resp.status, 201);
//! # }
//! ```

/// Request routing, parameter parsing, and response shaping.
pub mod api;
/// Session, typed client, and order line editor.
pub mod client;
/// Service configuration loading.
pub mod config;
/// Core in-memory store and line application.
pub mod core;
/// Opaque pagination cursors.
pub mod cursor;
/// Line-diff reconciler.
pub mod diff;
/// Order lines, line identity, and patch ops.
pub mod line;
/// Mutation op model and persistence wrapper types.
pub mod op;
/// Filtered pagination loop.
pub mod paginate;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// Object listing filters.
pub mod query;
/// Stored records, keys, drafts, and patches.
pub mod record;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Tracing bootstrap.
pub mod telemetry;
/// Shared primitive types and enums.
pub mod types;
/// Check-in worklist rows and filters.
pub mod worklist;
