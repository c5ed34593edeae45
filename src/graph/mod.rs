//! Graph storage backends and their system-level wrapper.

pub mod graph;
pub mod store;

pub use graph::{Graph, open_graphs};
pub use store::{GraphStore, MemoryStore, SqliteStore, StoreError, open_store};
