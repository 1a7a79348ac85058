//! semstore-vector
//!
//! Slot-addressed vector index used by the embedding pipelines. See `flat` for
//! the exact-search implementation and its on-disk format.

pub mod flat;

pub use flat::{l2_squared, FlatIndex};
