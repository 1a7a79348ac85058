//! semstore-core
//!
//! Domain types, collaborator traits, configuration and text chunking shared
//! by the embedding pipelines, the vector index and the store coordinator.

pub mod config;
pub mod data_processor;
pub mod error;
pub mod traits;
pub mod types;

pub use error::CoreError;
pub use types::{ChunkHit, ChunkPayload, FileId, FileMatch, FileRecord, Modality, SearchResults, SlotRange};
