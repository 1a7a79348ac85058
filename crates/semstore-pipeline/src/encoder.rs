//! Modality encoders: turn a file into `(payload, vector)` chunks and a query into a vector.

use anyhow::{bail, ensure, Context, Result};
use std::fs;
use std::path::Path;

use semstore_core::data_processor::TextChunker;
use semstore_core::traits::{Embedder, ImageEmbedder};
use semstore_core::{ChunkPayload, Modality};

use crate::extract::extract_text;
use crate::transcript::Transcriber;

pub type EncodedChunk = (ChunkPayload, Vec<f32>);

pub trait Encoder: Send {
    fn modality(&self) -> Modality;
    fn dim(&self) -> usize;
    /// `source` is the caller-facing label of the file, used in image references.
    fn encode_file(&self, path: &Path, source: &str) -> Result<Vec<EncodedChunk>>;
    fn encode_query(&self, query: &str) -> Result<Vec<f32>>;
    fn encode_query_file(&self, path: &Path) -> Result<Vec<f32>> {
        bail!("{} encoder cannot embed query file {}", self.modality(), path.display())
    }
}

fn embed_one(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    embedder
        .embed_batch(&[text.to_string()])?
        .pop()
        .context("embedder returned no vector")
}

fn zip_checked(payloads: Vec<ChunkPayload>, vectors: Vec<Vec<f32>>) -> Result<Vec<EncodedChunk>> {
    ensure!(payloads.len() == vectors.len(), "embedder returned {} vectors for {} chunks", vectors.len(), payloads.len());
    Ok(payloads.into_iter().zip(vectors).collect())
}

pub struct TextEncoder {
    embedder: Box<dyn Embedder>,
    chunker: TextChunker,
}

impl TextEncoder {
    pub fn new(embedder: Box<dyn Embedder>, chunker: TextChunker) -> Self { Self { embedder, chunker } }
}

impl Encoder for TextEncoder {
    fn modality(&self) -> Modality { Modality::Text }
    fn dim(&self) -> usize { self.embedder.dim() }

    fn encode_file(&self, path: &Path, _source: &str) -> Result<Vec<EncodedChunk>> {
        let content = extract_text(path)?;
        let passages = self.chunker.chunk(&content);
        ensure!(!passages.is_empty(), "no text content in {}", path.display());
        let vectors = self.embedder.embed_batch(&passages)?;
        zip_checked(passages.into_iter().map(ChunkPayload::text).collect(), vectors)
    }

    fn encode_query(&self, query: &str) -> Result<Vec<f32>> { embed_one(self.embedder.as_ref(), query) }
}

/// One chunk per image; captions and images share the embedder's joint space.
pub struct ImageEncoder {
    embedder: Box<dyn ImageEmbedder>,
}

impl ImageEncoder {
    pub fn new(embedder: Box<dyn ImageEmbedder>) -> Self { Self { embedder } }
}

impl Encoder for ImageEncoder {
    fn modality(&self) -> Modality { Modality::Image }
    fn dim(&self) -> usize { self.embedder.dim() }

    fn encode_file(&self, path: &Path, source: &str) -> Result<Vec<EncodedChunk>> {
        let bytes = fs::read(path).with_context(|| format!("read image {}", path.display()))?;
        let vector = self.embedder.embed_image(&bytes)?;
        Ok(vec![(ChunkPayload::image(source), vector)])
    }

    fn encode_query(&self, query: &str) -> Result<Vec<f32>> { self.embedder.embed_caption(query) }

    fn encode_query_file(&self, path: &Path) -> Result<Vec<f32>> {
        let bytes = fs::read(path).with_context(|| format!("read query image {}", path.display()))?;
        self.embedder.embed_image(&bytes)
    }
}

/// Audio is indexed by transcript segment, so text queries land in the transcript space.
pub struct AudioEncoder {
    transcriber: Box<dyn Transcriber>,
    embedder: Box<dyn Embedder>,
}

impl AudioEncoder {
    pub fn new(transcriber: Box<dyn Transcriber>, embedder: Box<dyn Embedder>) -> Self { Self { transcriber, embedder } }
}

impl Encoder for AudioEncoder {
    fn modality(&self) -> Modality { Modality::Audio }
    fn dim(&self) -> usize { self.embedder.dim() }

    fn encode_file(&self, path: &Path, _source: &str) -> Result<Vec<EncodedChunk>> {
        let segments = self.transcriber.transcribe(path)?;
        ensure!(!segments.is_empty(), "empty transcript for {}", path.display());
        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        zip_checked(segments.into_iter().map(|s| ChunkPayload::audio(s.index, s.text)).collect(), vectors)
    }

    fn encode_query(&self, query: &str) -> Result<Vec<f32>> { embed_one(self.embedder.as_ref(), query) }
}
