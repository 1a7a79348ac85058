use anyhow::{ensure, Result};
use std::collections::HashSet;
use std::path::Path;

use semstore_core::traits::{EmbeddingPipeline, VectorIndex};
use semstore_core::{ChunkHit, ChunkPayload, Modality, SlotRange};

use crate::chunk_table::ChunkTable;
use crate::encoder::Encoder;

/// Encoder + vector index + chunk table for one modality.
///
/// Inserts write vectors before chunk rows; a slot whose row is missing is
/// treated as an orphan and left out of search results. Rows whose vector
/// never reached the persisted index are dropped on construction.
pub struct IndexedPipeline<E: Encoder> {
    encoder: E,
    index: Box<dyn VectorIndex>,
    chunks: ChunkTable,
}

impl<E: Encoder> IndexedPipeline<E> {
    pub fn new(encoder: E, index: Box<dyn VectorIndex>, mut chunks: ChunkTable) -> Result<Self> {
        ensure!(
            encoder.dim() == index.dim(),
            "{} encoder dimension {} does not match index dimension {}",
            encoder.modality(),
            encoder.dim(),
            index.dim()
        );
        let live: HashSet<u64> = index.slots().into_iter().collect();
        let stale = chunks.prune_missing(&live)?;
        if !stale.is_empty() {
            tracing::warn!(modality = %encoder.modality(), count = stale.len(), "dropped chunk rows without indexed vectors");
        }
        Ok(Self { encoder, index, chunks })
    }

    pub fn chunk_table(&self) -> &ChunkTable { &self.chunks }

    fn ranked_hits(&self, query: &[f32], k: usize, excluded: &HashSet<u64>) -> Result<Vec<ChunkHit>> {
        let scored = self.index.search(query, k, excluded)?;
        let slots: Vec<u64> = scored.iter().map(|(slot, _)| *slot).collect();
        let mut rows = self.chunks.lookup(&slots)?;
        let mut hits = Vec::with_capacity(scored.len());
        for (slot, distance) in scored {
            match rows.remove(&slot) {
                Some(row) => hits.push(ChunkHit { slot, file_id: row.file_id, source: row.source, payload: row.payload, distance }),
                None => tracing::warn!(modality = %self.encoder.modality(), slot, "indexed slot has no chunk row, skipping"),
            }
        }
        Ok(hits)
    }
}

impl<E: Encoder> EmbeddingPipeline for IndexedPipeline<E> {
    fn modality(&self) -> Modality { self.encoder.modality() }

    fn insert_file(&mut self, path: &Path, file_id: &str, source: &str) -> Result<SlotRange> {
        let encoded = self.encoder.encode_file(path, source)?;
        let (payloads, vectors): (Vec<ChunkPayload>, Vec<Vec<f32>>) = encoded.into_iter().unzip();
        let range = self.index.add(&vectors)?;
        self.chunks.insert_chunks(file_id, source, range.start, &payloads)?;
        tracing::debug!(modality = %self.encoder.modality(), file_id, %range, "indexed file chunks");
        Ok(range)
    }

    fn similarity_search(&self, query: &str, k: usize, excluded: &HashSet<u64>) -> Result<Vec<ChunkHit>> {
        let vector = self.encoder.encode_query(query)?;
        self.ranked_hits(&vector, k, excluded)
    }

    fn image_to_image_search(&self, path: &Path, k: usize, excluded: &HashSet<u64>) -> Result<Vec<ChunkHit>> {
        let vector = self.encoder.encode_query_file(path)?;
        self.ranked_hits(&vector, k, excluded)
    }

    fn indexed_slots(&self) -> Result<Vec<u64>> { Ok(self.index.slots()) }

    fn remove_slots(&mut self, slots: &[u64]) -> Result<usize> {
        let removed = self.index.remove(slots)?;
        self.chunks.remove(slots)?;
        Ok(removed)
    }

    fn commit(&mut self) -> Result<()> {
        self.index.persist()?;
        self.chunks.flush()
    }
}
