//! # QMesh Storage
//!
//! Persistence for learned cost tables.
//!
//! Each node keeps exactly one snapshot, keyed by node name, overwritten as
//! the table changes and reloaded at startup.
//!
//! ## Features
//!
//! - **SnapshotStore trait**: Load/save one snapshot per node
//! - **JsonFileStore**: `q_table_<node>.json` documents written atomically
//! - **InMemorySnapshotStore**: Map-backed store for tests and simulation
//!
//! ## Example
//!
//! ```rust,ignore
//! use qmesh_storage::{JsonFileStore, SnapshotStore};
//!
//! let store = JsonFileStore::new("logs").await?;
//! store.save("h11", &router.table().snapshot()).await?;
//! let restored = store.load("h11").await?.unwrap_or_default();
//! ```

pub mod error;
pub mod json_file;
pub mod memory;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use json_file::{JsonFileStore, validate_node_key};
pub use memory::InMemorySnapshotStore;
pub use traits::SnapshotStore;
