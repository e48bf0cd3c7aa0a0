//! In-memory object table and server-side line handling.

/// Server-side application of patch-lines ops.
pub mod lines;
/// Ordered single-table object store.
pub mod store;
