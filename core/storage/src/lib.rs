//! Local persistent queue for offline submissions.
//!
//! This module provides a trait-based interface over the record store that
//! holds pending network operations, together with an in-memory backend, a
//! SQLite backend and a registry for resolving backends by name.
//!
//! # Design Principles
//! - Enqueue never touches the network
//! - Every call is atomic on its own; there is no multi-call transaction
//! - Mutations of an absent id are logged and ignored
//! - One schema for every queued submission

pub mod memory;
pub mod operation;
pub mod registry;
pub mod sqlite;
pub mod store;

pub use memory::MemoryQueueStore;
pub use operation::{OperationId, OperationKind, OperationStatus, QueuedOperation};
pub use registry::{create_default_registry, StoreFactory, StoreRegistry};
pub use sqlite::SqliteQueueStore;
pub use store::QueueStore;
