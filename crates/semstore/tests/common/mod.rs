#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::bail;
use semstore::{
    ChunkHit, ChunkPayload, FetchError, FetchedResource, Fetcher, Modality, PipelineFactory, PipelinePaths, SlotRange,
    Store, StoreSettings,
};
use semstore_core::traits::EmbeddingPipeline;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Scripted state behind one fake pipeline; survives reconnects.
#[derive(Debug)]
pub struct FakeState {
    pub chunks_per_file: u64,
    pub next_slot: u64,
    /// slot -> (file id, source)
    pub owners: BTreeMap<u64, (String, String)>,
    /// When set, returned from every search instead of the generated hits.
    pub scripted_hits: Option<Vec<ChunkHit>>,
    pub fail_inserts: bool,
    pub fail_commits: bool,
    pub fail_slot_listing: bool,
    /// Path handed to `insert_file` and whether it existed at that moment.
    pub seen_paths: Vec<(PathBuf, bool)>,
    pub last_excluded: HashSet<u64>,
    pub searches: usize,
    pub commits: usize,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            chunks_per_file: 1,
            next_slot: 0,
            owners: BTreeMap::new(),
            scripted_hits: None,
            fail_inserts: false,
            fail_commits: false,
            fail_slot_listing: false,
            seen_paths: Vec::new(),
            last_excluded: HashSet::new(),
            searches: 0,
            commits: 0,
        }
    }
}

impl FakeState {
    /// An indexed slot that no catalog record will ever claim.
    pub fn add_orphan(&mut self) -> u64 {
        let slot = self.next_slot;
        self.owners.insert(slot, ("ghost".into(), "ghost.txt".into()));
        self.next_slot += 1;
        slot
    }
}

pub type Handle = Rc<RefCell<FakeState>>;

pub struct FakePipeline {
    modality: Modality,
    state: Handle,
}

impl EmbeddingPipeline for FakePipeline {
    fn modality(&self) -> Modality { self.modality }

    fn insert_file(&mut self, path: &Path, file_id: &str, source: &str) -> anyhow::Result<SlotRange> {
        let mut s = self.state.borrow_mut();
        s.seen_paths.push((path.to_path_buf(), path.exists()));
        if s.fail_inserts {
            bail!("embedding model failed for {}", path.display());
        }
        let start = s.next_slot;
        let end = start + s.chunks_per_file;
        for slot in start..end {
            s.owners.insert(slot, (file_id.to_string(), source.to_string()));
        }
        s.next_slot = end;
        Ok(SlotRange::new(start, end))
    }

    fn similarity_search(&self, query: &str, k: usize, excluded: &HashSet<u64>) -> anyhow::Result<Vec<ChunkHit>> {
        let mut s = self.state.borrow_mut();
        s.searches += 1;
        s.last_excluded = excluded.clone();
        if let Some(hits) = &s.scripted_hits {
            return Ok(hits.clone());
        }
        Ok(s
            .owners
            .iter()
            .filter(|(slot, _)| !excluded.contains(*slot))
            .take(k)
            .map(|(&slot, (file_id, source))| ChunkHit {
                slot,
                file_id: file_id.clone(),
                source: source.clone(),
                payload: ChunkPayload::text(format!("{query} #{slot}")),
                distance: slot as f32,
            })
            .collect())
    }

    fn image_to_image_search(&self, path: &Path, k: usize, excluded: &HashSet<u64>) -> anyhow::Result<Vec<ChunkHit>> {
        self.similarity_search(&path.display().to_string(), k, excluded)
    }

    fn indexed_slots(&self) -> anyhow::Result<Vec<u64>> {
        let s = self.state.borrow();
        if s.fail_slot_listing {
            bail!("index file is unreadable");
        }
        Ok(s.owners.keys().copied().collect())
    }

    fn remove_slots(&mut self, slots: &[u64]) -> anyhow::Result<usize> {
        let mut s = self.state.borrow_mut();
        Ok(slots.iter().filter(|&&slot| s.owners.remove(&slot).is_some()).count())
    }

    fn commit(&mut self) -> anyhow::Result<()> {
        let mut s = self.state.borrow_mut();
        if s.fail_commits {
            bail!("persist index: disk full");
        }
        s.commits += 1;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct FakePipelines {
    pub text: Handle,
    pub image: Handle,
    pub audio: Handle,
}

impl FakePipelines {
    pub fn state(&self, modality: Modality) -> &Handle {
        match modality {
            Modality::Text => &self.text,
            Modality::Image => &self.image,
            Modality::Audio => &self.audio,
        }
    }
}

impl PipelineFactory for FakePipelines {
    fn build(&self, modality: Modality, _paths: &PipelinePaths, _settings: &StoreSettings)
        -> anyhow::Result<Box<dyn EmbeddingPipeline>> {
        Ok(Box::new(FakePipeline { modality, state: Rc::clone(self.state(modality)) }))
    }
}

/// Serves canned responses; unknown URIs fail as transport errors.
#[derive(Default)]
pub struct FakeFetcher {
    responses: HashMap<String, Result<FetchedResource, u16>>,
}

impl FakeFetcher {
    pub fn serve(mut self, uri: &str, bytes: &[u8], content_type: Option<&str>) -> Self {
        let resource = FetchedResource { bytes: bytes.to_vec(), content_type: content_type.map(str::to_string) };
        self.responses.insert(uri.to_string(), Ok(resource));
        self
    }

    pub fn status(mut self, uri: &str, status: u16) -> Self {
        self.responses.insert(uri.to_string(), Err(status));
        self
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(&self, uri: &str) -> Result<FetchedResource, FetchError> {
        match self.responses.get(uri) {
            Some(Ok(resource)) => Ok(resource.clone()),
            Some(Err(status)) => Err(FetchError::Status { uri: uri.to_string(), status: *status }),
            None => Err(FetchError::Transport { uri: uri.to_string(), message: "connection refused".into() }),
        }
    }
}

pub fn fake_store(fakes: &FakePipelines, fetcher: FakeFetcher) -> Store {
    Store::new(StoreSettings::default())
        .unwrap()
        .with_pipeline_factory(fakes.clone())
        .with_fetcher(fetcher)
}

pub fn hit(slot: u64, file_id: &str, source: &str, text: &str, distance: f32) -> ChunkHit {
    ChunkHit { slot, file_id: file_id.into(), source: source.into(), payload: ChunkPayload::text(text), distance }
}
