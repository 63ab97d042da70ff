//! Hierarchical Navigable Small World graph index.
//!
//! Layout goals: cache-line aligned hot node metadata, neighbor lists stored
//! apart from node metadata so traversal only touches what it needs, and a
//! thread-local buffer pool so search allocates nothing per query.

mod index;
mod query_buffers;
mod storage;
mod types;

pub use index::{HnswIndex, IndexStats};
pub use storage::NeighborLists;
pub use types::{HnswNode, HnswParams};
