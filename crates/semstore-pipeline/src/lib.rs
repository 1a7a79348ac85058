//! semstore-pipeline
//!
//! Reference embedding pipelines: text (txt/pdf passages), image (one chunk per
//! file) and audio (transcript segments). Each pairs an encoder with a
//! `FlatIndex` and a pipeline-local chunk table.

pub mod chunk_table;
pub mod encoder;
pub mod extract;
pub mod pipeline;
pub mod transcript;

use anyhow::Result;
use std::path::{Path, PathBuf};

use semstore_core::config::StoreSettings;
use semstore_core::data_processor::{ChunkingConfig, TextChunker};
use semstore_core::traits::EmbeddingPipeline;
use semstore_core::Modality;
use semstore_embed::{get_default_embedder, get_default_image_embedder};
use semstore_vector::FlatIndex;

pub use chunk_table::{ChunkRow, ChunkTable};
pub use encoder::{AudioEncoder, Encoder, ImageEncoder, TextEncoder};
pub use pipeline::IndexedPipeline;
pub use transcript::{SidecarTranscriber, Transcriber, TranscriptSegment};

pub type TextPipeline = IndexedPipeline<TextEncoder>;
pub type ImagePipeline = IndexedPipeline<ImageEncoder>;
pub type AudioPipeline = IndexedPipeline<AudioEncoder>;

/// On-disk artifacts one pipeline is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePaths {
    pub index: PathBuf,
    pub chunk_db: PathBuf,
}

impl PipelinePaths {
    pub fn new(index: impl Into<PathBuf>, chunk_db: impl AsRef<Path>) -> Self {
        Self { index: index.into(), chunk_db: chunk_db.as_ref().to_path_buf() }
    }
}

/// Builds the reference pipeline for `modality` with the hash embedders.
pub fn build_default_pipeline(modality: Modality, paths: &PipelinePaths, settings: &StoreSettings) -> Result<Box<dyn EmbeddingPipeline>> {
    let dim = settings.embedding_dim;
    let index = Box::new(FlatIndex::open(&paths.index, dim)?);
    let chunks = ChunkTable::open(&paths.chunk_db, modality)?;
    let pipeline: Box<dyn EmbeddingPipeline> = match modality {
        Modality::Text => {
            let chunker = TextChunker::new(ChunkingConfig {
                max_tokens: settings.chunk_max_tokens,
                overlap_percent: settings.chunk_overlap_percent,
            });
            Box::new(TextPipeline::new(TextEncoder::new(get_default_embedder(dim), chunker), index, chunks)?)
        }
        Modality::Image => Box::new(ImagePipeline::new(ImageEncoder::new(get_default_image_embedder(dim)), index, chunks)?),
        Modality::Audio => Box::new(AudioPipeline::new(
            AudioEncoder::new(Box::new(SidecarTranscriber), get_default_embedder(dim)),
            index,
            chunks,
        )?),
    };
    tracing::debug!(%modality, index = %paths.index.display(), "built pipeline");
    Ok(pipeline)
}
