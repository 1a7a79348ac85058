use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use semstore_core::error::CoreError;
use semstore_core::traits::VectorIndex;
use semstore_core::SlotRange;

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    dim: usize,
    next_slot: u64,
    entries: Vec<IndexEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexEntry {
    slot: u64,
    vector: Vec<f32>,
}

/// Exact squared-L2 index keyed by slot.
///
/// `next_slot` is persisted with the vectors so removed slots stay retired
/// across restarts.
pub struct FlatIndex {
    path: Option<PathBuf>,
    dim: usize,
    next_slot: u64,
    entries: BTreeMap<u64, Vec<f32>>,
    dirty: bool,
}

impl FlatIndex {
    pub fn in_memory(dim: usize) -> Self {
        Self { path: None, dim, next_slot: 0, entries: BTreeMap::new(), dirty: false }
    }

    /// Opens the index file at `path`, or starts an empty one that `persist` will create.
    pub fn open(path: &Path, dim: usize) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "creating new flat index");
            return Ok(Self { path: Some(path.to_path_buf()), dirty: true, ..Self::in_memory(dim) });
        }
        let reader = BufReader::new(File::open(path).with_context(|| format!("open index {}", path.display()))?);
        let file: IndexFile = serde_json::from_reader(reader).with_context(|| format!("decode index {}", path.display()))?;
        if file.dim != dim {
            bail!("index {} has dimension {}, store expects {}", path.display(), file.dim, dim);
        }
        let entries: BTreeMap<u64, Vec<f32>> = file.entries.into_iter().map(|e| (e.slot, e.vector)).collect();
        if let Some((&last, _)) = entries.last_key_value() {
            if last >= file.next_slot { bail!("index {} is corrupt: slot {} >= next_slot {}", path.display(), last, file.next_slot); }
        }
        tracing::debug!(path = %path.display(), vectors = entries.len(), next_slot = file.next_slot, "loaded flat index");
        Ok(Self { path: Some(path.to_path_buf()), dim, next_slot: file.next_slot, entries, dirty: false })
    }

    pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

    /// Slot the next `add` will start at.
    pub fn next_slot(&self) -> u64 { self.next_slot }

    fn write_to(&self, path: &Path) -> Result<()> {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
        let file = IndexFile {
            dim: self.dim,
            next_slot: self.next_slot,
            entries: self.entries.iter().map(|(&slot, v)| IndexEntry { slot, vector: v.clone() }).collect(),
        };
        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer(&mut writer, &file)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).with_context(|| format!("persist index {}", path.display()))?;
        Ok(())
    }
}

pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl VectorIndex for FlatIndex {
    fn dim(&self) -> usize { self.dim }

    fn len(&self) -> usize { self.entries.len() }

    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<SlotRange> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(CoreError::DimensionMismatch { expected: self.dim, actual: bad.len() }.into());
        }
        let start = self.next_slot;
        for v in vectors {
            self.entries.insert(self.next_slot, v.clone());
            self.next_slot += 1;
        }
        if !vectors.is_empty() { self.dirty = true; }
        Ok(SlotRange::new(start, self.next_slot))
    }

    fn remove(&mut self, slots: &[u64]) -> Result<usize> {
        let removed = slots.iter().filter(|&&s| self.entries.remove(&s).is_some()).count();
        if removed > 0 { self.dirty = true; }
        Ok(removed)
    }

    fn search(&self, query: &[f32], k: usize, excluded: &HashSet<u64>) -> Result<Vec<(u64, f32)>> {
        if query.len() != self.dim {
            return Err(CoreError::DimensionMismatch { expected: self.dim, actual: query.len() }.into());
        }
        if k == 0 { return Ok(Vec::new()); }
        let mut scored: Vec<(u64, f32)> = self
            .entries
            .iter()
            .filter(|(slot, _)| !excluded.contains(*slot))
            .map(|(&slot, v)| (slot, l2_squared(query, v)))
            .collect();
        // stable: equal distances keep slot order
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    fn slots(&self) -> Vec<u64> { self.entries.keys().copied().collect() }

    fn persist(&mut self) -> Result<()> {
        let Some(path) = self.path.clone() else { return Ok(()); };
        if !self.dirty { return Ok(()); }
        self.write_to(&path)?;
        self.dirty = false;
        tracing::debug!(path = %path.display(), vectors = self.entries.len(), "persisted flat index");
        Ok(())
    }
}
