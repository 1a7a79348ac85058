//! Domain types shared by the catalog, the pipelines and the coordinator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::str::FromStr;

use crate::error::CoreError;

pub type FileId = String;

/// The fixed set of data categories the store ingests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Audio,
}

impl Modality {
    pub const ALL: [Modality; 3] = [Modality::Text, Modality::Image, Modality::Audio];

    /// Name persisted in `master_file_record.file_type` and `deleted_ids.table_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Image => "image",
            Modality::Audio => "audio",
        }
    }

    /// Maps a bare extension (no leading dot, any case) to its modality.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" => Some(Modality::Image),
            "txt" | "pdf" => Some(Modality::Text),
            "mp3" | "wav" | "flac" => Some(Modality::Audio),
            _ => None,
        }
    }

    /// Modality of a local path, judged by its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension().and_then(|e| e.to_str()).and_then(Self::from_extension)
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Modality::Text),
            "image" => Ok(Modality::Image),
            "audio" => Ok(Modality::Audio),
            other => Err(CoreError::UnknownModality(other.to_string())),
        }
    }
}

/// Half-open range `[start, end)` of slots inside one modality's vector index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SlotRange {
    pub start: u64,
    pub end: u64,
}

impl SlotRange {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "slot range start must not exceed end");
        Self { start, end }
    }

    pub fn len(&self) -> u64 { self.end.saturating_sub(self.start) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn contains(&self, slot: u64) -> bool { slot >= self.start && slot < self.end }

    pub fn overlaps(&self, other: &SlotRange) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }

    pub fn slots(&self) -> Range<u64> { self.start..self.end }
}

impl fmt::Display for SlotRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Master record for one ingested file.
///
/// - `id`: UUID assigned at insert time
/// - `source`: path or URI exactly as the caller supplied it
/// - `modality`: fixed at insert time
/// - `slot_range`: slots the pipeline produced for this file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    pub id: FileId,
    pub source: String,
    pub modality: Modality,
    pub slot_range: SlotRange,
}

/// The snippet a pipeline stores for each indexed chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChunkPayload {
    Text { content: String },
    Image { reference: String },
    Audio { index: usize, transcript: String },
}

impl ChunkPayload {
    pub fn text(content: impl Into<String>) -> Self { ChunkPayload::Text { content: content.into() } }

    pub fn image(reference: impl Into<String>) -> Self { ChunkPayload::Image { reference: reference.into() } }

    pub fn audio(index: usize, transcript: impl Into<String>) -> Self {
        ChunkPayload::Audio { index, transcript: transcript.into() }
    }

    /// Human readable part of the payload: passage, image reference or transcript.
    pub fn as_str(&self) -> &str {
        match self {
            ChunkPayload::Text { content } => content,
            ChunkPayload::Image { reference } => reference,
            ChunkPayload::Audio { transcript, .. } => transcript,
        }
    }
}

/// One chunk-level nearest-neighbour match, before aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkHit {
    pub slot: u64,
    pub file_id: FileId,
    pub source: String,
    pub payload: ChunkPayload,
    pub distance: f32,
}

/// All matched chunks of one file, in rank order. `distances[i]` belongs to `chunks[i]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileMatch {
    pub file_id: FileId,
    pub source: String,
    pub chunks: Vec<ChunkPayload>,
    pub distances: Vec<f32>,
}

impl FileMatch {
    pub fn best_distance(&self) -> Option<f32> { self.distances.first().copied() }
}

/// Composite search answer, one collection per modality.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchResults {
    pub texts: Vec<FileMatch>,
    pub images: Vec<FileMatch>,
    pub audios: Vec<FileMatch>,
}

impl SearchResults {
    pub fn get(&self, modality: Modality) -> &[FileMatch] {
        match modality {
            Modality::Text => &self.texts,
            Modality::Image => &self.images,
            Modality::Audio => &self.audios,
        }
    }

    pub fn set(&mut self, modality: Modality, matches: Vec<FileMatch>) {
        match modality {
            Modality::Text => self.texts = matches,
            Modality::Image => self.images = matches,
            Modality::Audio => self.audios = matches,
        }
    }

    pub fn is_empty(&self) -> bool { self.texts.is_empty() && self.images.is_empty() && self.audios.is_empty() }
}
