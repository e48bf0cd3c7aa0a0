//! The service actor. One task owns the [`ObjectStore`](crate::core::store::ObjectStore);
//! callers talk to it through a cloneable [`ServiceHandle`] and observe
//! committed writes on an [`ObjectEvent`] broadcast.

pub mod events;
pub mod handle;

pub use events::ObjectEvent;
pub use handle::{RuntimeConfig, RuntimeError, ServiceHandle, spawn_service};
