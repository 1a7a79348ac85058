use std::collections::HashSet;
use std::path::Path;

use crate::types::{ChunkHit, Modality, SlotRange};

/// Text embedding model. Vectors are L2-normalised and `dim()` long.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Joint image/caption embedding model: both methods land in the same space.
pub trait ImageEmbedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_image(&self, bytes: &[u8]) -> anyhow::Result<Vec<f32>>;
    fn embed_caption(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Slot-addressed nearest-neighbour index for one modality.
///
/// Slots are handed out from a counter that only grows, so a removed slot is
/// never reassigned. `search` returns `(slot, distance)` ascending by distance.
pub trait VectorIndex: Send {
    fn dim(&self) -> usize;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool { self.len() == 0 }
    fn add(&mut self, vectors: &[Vec<f32>]) -> anyhow::Result<SlotRange>;
    fn remove(&mut self, slots: &[u64]) -> anyhow::Result<usize>;
    fn search(&self, query: &[f32], k: usize, excluded: &HashSet<u64>) -> anyhow::Result<Vec<(u64, f32)>>;
    fn slots(&self) -> Vec<u64>;
    fn persist(&mut self) -> anyhow::Result<()>;
}

/// Per-modality embed + index + chunk-metadata unit driven by the coordinator.
pub trait EmbeddingPipeline {
    fn modality(&self) -> Modality;

    /// Embeds the file at `path`, indexes every chunk under `file_id` and returns
    /// the slots used. `source` is the label stored with each chunk.
    fn insert_file(&mut self, path: &Path, file_id: &str, source: &str) -> anyhow::Result<SlotRange>;

    /// Embeds `query` in this pipeline's space and returns up to `k` ranked hits,
    /// skipping `excluded` slots.
    fn similarity_search(&self, query: &str, k: usize, excluded: &HashSet<u64>) -> anyhow::Result<Vec<ChunkHit>>;

    fn image_to_image_search(&self, path: &Path, k: usize, excluded: &HashSet<u64>) -> anyhow::Result<Vec<ChunkHit>> {
        let _ = (path, k, excluded);
        anyhow::bail!("{} pipeline does not support image queries", self.modality())
    }

    /// Every slot currently present in the index.
    fn indexed_slots(&self) -> anyhow::Result<Vec<u64>>;

    /// Drops vectors and chunk rows for `slots`; returns how many were present.
    fn remove_slots(&mut self, slots: &[u64]) -> anyhow::Result<usize>;

    fn commit(&mut self) -> anyhow::Result<()>;
}
