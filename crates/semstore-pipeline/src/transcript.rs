//! Audio transcription seam used by the audio pipeline.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptSegment {
    pub index: usize,
    pub text: String,
}

pub trait Transcriber: Send + Sync {
    fn transcribe(&self, audio: &Path) -> Result<Vec<TranscriptSegment>>;
}

/// Reads a pre-computed transcript stored next to the audio file as
/// `<file>.transcript`; blank lines separate segments.
#[derive(Debug, Default, Clone)]
pub struct SidecarTranscriber;

impl SidecarTranscriber {
    pub fn sidecar_path(audio: &Path) -> PathBuf {
        let mut name = audio.as_os_str().to_owned();
        name.push(".transcript");
        PathBuf::from(name)
    }
}

impl Transcriber for SidecarTranscriber {
    fn transcribe(&self, audio: &Path) -> Result<Vec<TranscriptSegment>> {
        let sidecar = Self::sidecar_path(audio);
        let text = std::fs::read_to_string(&sidecar)
            .with_context(|| format!("no transcript for {} (expected {})", audio.display(), sidecar.display()))?;
        Ok(text
            .split("\n\n")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .enumerate()
            .map(|(index, s)| TranscriptSegment { index, text: s.to_string() })
            .collect())
    }
}
