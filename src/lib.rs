//! In-memory approximate nearest neighbor index engine: HNSW, IVF, product
//! quantization, LSH, and Annoy-style random-projection forests over a
//! shared vector store.

pub mod annoy;
pub mod distance;
pub mod error;
pub mod heap;
pub mod hnsw;
pub mod index;
pub mod ivf;
pub mod kmeans;
pub mod logging;
pub mod lsh;
pub mod pq;
pub mod prefetch;
pub mod store;

pub use error::{AnnError, Result};
pub use heap::SearchResult;
pub use index::{AnnIndex, Index};
pub use logging::{init_from_env, init_logging, LogConfig};

pub use annoy::{AnnoyIndex, AnnoyParams};
pub use hnsw::{HnswIndex, HnswParams};
pub use ivf::{IvfIndex, IvfParams};
pub use lsh::{LshIndex, LshParams};
pub use pq::{PqIndex, PqParams};
