//! Retrieval pipeline: corpus loading, chunking, the persisted vector
//! index, and diversity-aware retrieval over it.

pub mod corpus;
pub mod engine;
pub mod index;
pub mod retriever;
pub mod splitter;
pub mod store;

pub use engine::IndexService;
pub use index::{Chunk, VectorIndex};
pub use retriever::Retriever;
