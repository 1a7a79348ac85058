//! semstore-embed
//!
//! Deterministic hashing embedders. They implement the same traits a model-backed
//! embedder would, so pipelines and tests run without model weights.

use anyhow::{ensure, Result};
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use semstore_core::traits::{Embedder, ImageEmbedder};

/// Feature-hashing text embedder: each whitespace token lands in one bucket.
pub struct HashEmbedder { dim: usize, max_len: usize }

impl HashEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim, max_len: 512 } }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().take(self.max_len).enumerate() {
            let token = token.to_lowercase();
            let h = hash_with_seed(&token, 0);
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        l2_normalize(&mut v);
        v
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Hashes fixed-size byte blocks for images and tokens for captions into one space.
///
/// Identical files embed identically, which is enough for duplicate lookup;
/// captions only match images through shared buckets.
pub struct HashImageEmbedder { dim: usize, block: usize, captions: HashEmbedder }

impl HashImageEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim, block: 64, captions: HashEmbedder::new(dim) } }
}

impl ImageEmbedder for HashImageEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn embed_image(&self, bytes: &[u8]) -> Result<Vec<f32>> {
        ensure!(!bytes.is_empty(), "cannot embed an empty image");
        let mut v = vec![0f32; self.dim];
        for block in bytes.chunks(self.block) {
            let h = hash_with_seed(block, 1);
            let idx = (h as usize) % self.dim;
            v[idx] += (((h >> 32) as u32) as f32) / (u32::MAX as f32);
        }
        l2_normalize(&mut v);
        Ok(v)
    }

    fn embed_caption(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.captions.embed_one(text))
    }
}

pub fn get_default_embedder(dim: usize) -> Box<dyn Embedder> {
    tracing::debug!(dim, "using hash text embedder");
    Box::new(HashEmbedder::new(dim))
}

pub fn get_default_image_embedder(dim: usize) -> Box<dyn ImageEmbedder> {
    tracing::debug!(dim, "using hash image embedder");
    Box::new(HashImageEmbedder::new(dim))
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
    for x in v.iter_mut() { *x /= norm; }
}

fn hash_with_seed<T: Hash + ?Sized>(value: &T, seed: u64) -> u64 {
    let mut hasher = XxHash64::with_seed(seed);
    value.hash(&mut hasher);
    hasher.finish()
}
