//! dxrag-dense
//!
//! Exact inner-product search over L2-normalized passage vectors, plus the
//! on-disk artifacts that keep vectors and passage metadata positionally
//! aligned (lancedb table for vectors, JSON for metadata).

pub mod index;
pub mod schema;
pub mod store;

pub use index::DenseIndex;
pub use store::{load_index, read_metadata, save_index, write_metadata};
