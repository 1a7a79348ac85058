use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use semstore_core::config::{expand_path, StoreSettings};
use semstore_core::data_processor::word_count;
use semstore_core::traits::EmbeddingPipeline;
use semstore_core::{FileId, FileMatch, FileRecord, Modality, SearchResults};
use semstore_pipeline::{build_default_pipeline, PipelinePaths};

use crate::aggregate::aggregate_hits;
use crate::catalog::Catalog;
use crate::error::{FetchError, Result, StoreError};
use crate::fetch::{Fetcher, RemoteFetcher};
use crate::locator::{remote_extension, Locator};

/// Builds the pipeline for one modality when the store connects.
pub trait PipelineFactory {
    fn build(&self, modality: Modality, paths: &PipelinePaths, settings: &StoreSettings)
        -> anyhow::Result<Box<dyn EmbeddingPipeline>>;
}

/// Reference pipelines: flat index, hash embedders, sqlite chunk table.
pub struct DefaultPipelines;

impl PipelineFactory for DefaultPipelines {
    fn build(&self, modality: Modality, paths: &PipelinePaths, settings: &StoreSettings)
        -> anyhow::Result<Box<dyn EmbeddingPipeline>> {
        build_default_pipeline(modality, paths, settings)
    }
}

/// Artifacts derived from a store URI.
///
/// `data/store.db` and `data/store` both resolve to the catalog `data/store.db`,
/// chunk tables in `data/store_chunks.db` and one `data/store_<modality>.index`
/// per modality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    base: PathBuf,
    pub catalog: PathBuf,
    pub chunk_db: PathBuf,
}

impl StorePaths {
    pub fn from_uri(store_uri: &str) -> Self {
        let expanded = expand_path(store_uri);
        let base = match expanded.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("db") => expanded.with_extension(""),
            _ => expanded,
        };
        Self { catalog: with_suffix(&base, ".db"), chunk_db: with_suffix(&base, "_chunks.db"), base }
    }

    pub fn index(&self, modality: Modality) -> PathBuf { with_suffix(&self.base, &format!("_{modality}.index")) }

    pub fn pipeline(&self, modality: Modality) -> PipelinePaths { PipelinePaths::new(self.index(modality), &self.chunk_db) }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = base.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Indexed slots that no record or ledger entry accounts for, now removed.
    pub orphans: BTreeMap<Modality, Vec<u64>>,
}

impl ReconcileReport {
    pub fn total(&self) -> usize { self.orphans.values().map(Vec::len).sum() }
    pub fn is_clean(&self) -> bool { self.orphans.is_empty() }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionReport {
    /// Slots dropped from each modality's index.
    pub removed: BTreeMap<Modality, usize>,
}

impl CompactionReport {
    pub fn total(&self) -> usize { self.removed.values().sum() }
}

struct Pipelines {
    text: Box<dyn EmbeddingPipeline>,
    image: Box<dyn EmbeddingPipeline>,
    audio: Box<dyn EmbeddingPipeline>,
}

impl Pipelines {
    fn get(&self, modality: Modality) -> &dyn EmbeddingPipeline {
        match modality {
            Modality::Text => self.text.as_ref(),
            Modality::Image => self.image.as_ref(),
            Modality::Audio => self.audio.as_ref(),
        }
    }

    fn get_mut(&mut self, modality: Modality) -> &mut Box<dyn EmbeddingPipeline> {
        match modality {
            Modality::Text => &mut self.text,
            Modality::Image => &mut self.image,
            Modality::Audio => &mut self.audio,
        }
    }
}

struct Connected {
    paths: StorePaths,
    catalog: Catalog,
    pipelines: Pipelines,
}

/// Coordinates the catalog and the per-modality pipelines.
///
/// Inserts write the pipeline (vectors, then chunk rows) before the catalog
/// row, so an interrupted insert can only leave index slots without a record.
/// [`Store::reconcile`] sweeps those away and runs on connect by default.
/// Not synchronised: callers serialise access.
pub struct Store {
    settings: StoreSettings,
    factory: Box<dyn PipelineFactory>,
    fetcher: Option<Box<dyn Fetcher>>,
    state: Option<Connected>,
}

impl Store {
    pub fn new(settings: StoreSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings, factory: Box::new(DefaultPipelines), fetcher: None, state: None })
    }

    pub fn with_pipeline_factory(mut self, factory: impl PipelineFactory + 'static) -> Self {
        self.factory = Box::new(factory);
        self
    }

    /// Replaces the fetcher used for remote locators.
    pub fn with_fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Some(Box::new(fetcher));
        self
    }

    pub fn settings(&self) -> &StoreSettings { &self.settings }

    pub fn is_connected(&self) -> bool { self.state.is_some() }

    /// Artifact paths of the current connection.
    pub fn paths(&self) -> Result<&StorePaths> { Ok(&self.connected()?.paths) }

    fn connected(&self) -> Result<&Connected> { self.state.as_ref().ok_or(StoreError::NotConnected) }

    fn connected_mut(&mut self) -> Result<&mut Connected> { self.state.as_mut().ok_or(StoreError::NotConnected) }

    /// Opens or creates the catalog and builds one pipeline per modality.
    ///
    /// Connecting again drops the previous connection without committing it.
    pub fn connect(&mut self, store_uri: &str) -> Result<()> {
        let paths = StorePaths::from_uri(store_uri);
        let catalog = Catalog::open(&paths.catalog, !self.settings.auto_commit)?;
        let build = |modality| self.factory.build(modality, &paths.pipeline(modality), &self.settings);
        let pipelines = Pipelines { text: build(Modality::Text)?, image: build(Modality::Image)?, audio: build(Modality::Audio)? };
        let mut connected = Connected { paths, catalog, pipelines };

        if self.settings.reconcile_on_connect {
            let report = reconcile_connected(&mut connected, self.settings.auto_commit)?;
            if !report.is_clean() {
                info!(orphans = report.total(), "reconciled store on connect");
            }
        }
        info!(catalog = %connected.paths.catalog.display(), "connected store");
        self.state = Some(connected);
        Ok(())
    }

    /// Ingests a local path or a remote URI and returns the new file id.
    pub fn insert(&mut self, locator: &str) -> Result<FileId> {
        self.connected()?;
        match Locator::parse(locator) {
            Locator::Local(path) => {
                let modality =
                    Modality::from_path(path).ok_or_else(|| StoreError::UnsupportedModality(locator.to_string()))?;
                self.insert_as(modality, path, locator, self.settings.auto_commit)
            }
            Locator::Remote(uri) => {
                let (modality, temp) = self.fetch_to_temp(uri)?;
                // `temp` is deleted when it drops, whichever way the insert ends
                self.insert_as(modality, temp.path(), uri, self.settings.auto_commit)
            }
        }
    }

    /// With `durable` the pipeline and then the catalog are flushed before
    /// returning. A failure after the pipeline accepted the file takes its
    /// slots back out of the live index.
    fn insert_as(&mut self, modality: Modality, path: &Path, source: &str, durable: bool) -> Result<FileId> {
        let state = self.connected_mut()?;
        let id = Uuid::new_v4().to_string();

        let pipeline = state.pipelines.get_mut(modality);
        let slot_range = pipeline.insert_file(path, &id, source)?;
        let record = FileRecord { id: id.clone(), source: source.to_string(), modality, slot_range };

        if let Err(e) = record_insert(pipeline.as_mut(), &mut state.catalog, &record, durable) {
            let slots: Vec<u64> = slot_range.slots().collect();
            match pipeline.remove_slots(&slots) {
                Ok(_) => warn!(file_id = %id, %modality, %slot_range, error = %e, "insert failed, rolled back index slots"),
                Err(undo) => warn!(
                    file_id = %id, %modality, %slot_range, error = %e, rollback_error = %undo,
                    "insert failed and its index slots could not be rolled back"
                ),
            }
            return Err(e);
        }
        info!(file_id = %id, %modality, %slot_range, source, "inserted file");
        Ok(id)
    }

    fn fetch_to_temp(&self, uri: &str) -> Result<(Modality, NamedTempFile)> {
        let fetched = match &self.fetcher {
            Some(fetcher) => fetcher.fetch(uri),
            None => RemoteFetcher::new(Duration::from_secs(self.settings.fetch_timeout_secs))
                .map_err(|e| FetchError::Transport { uri: uri.to_string(), message: e.to_string() })?
                .fetch(uri),
        }
        .inspect_err(|e| warn!(uri, error = %e, "remote fetch failed"))?;

        let ext = remote_extension(fetched.content_type.as_deref(), uri)
            .ok_or_else(|| StoreError::UnsupportedModality(uri.to_string()))?;
        let modality = Modality::from_extension(&ext).ok_or_else(|| StoreError::UnsupportedModality(uri.to_string()))?;

        let mut temp = tempfile::Builder::new().prefix("semstore-").suffix(&format!(".{ext}")).tempfile()?;
        temp.write_all(&fetched.bytes)?;
        temp.flush()?;
        debug!(uri, %modality, bytes = fetched.bytes.len(), temp = %temp.path().display(), "fetched remote file");
        Ok((modality, temp))
    }

    /// Runs `query` against each requested modality and groups hits per file.
    ///
    /// Unknown modality names are ignored. Queries of `image_query_max_tokens`
    /// words or more skip the image branch.
    pub fn search<S: AsRef<str>>(&self, query: &str, k: usize, modalities: &[S]) -> Result<SearchResults> {
        let state = self.connected()?;
        if k == 0 {
            return Err(StoreError::InvalidArgument("k must be greater than zero".into()));
        }
        if modalities.is_empty() {
            return Err(StoreError::InvalidArgument("at least one modality must be requested".into()));
        }

        let mut requested = BTreeSet::new();
        for name in modalities {
            match name.as_ref().parse::<Modality>() {
                Ok(modality) => {
                    requested.insert(modality);
                }
                Err(_) => debug!(modality = name.as_ref(), "ignoring unknown modality"),
            }
        }

        let mut results = SearchResults::default();
        for modality in requested {
            if modality == Modality::Image && word_count(query) >= self.settings.image_query_max_tokens {
                debug!(words = word_count(query), "query too long for an image caption, skipping image search");
                continue;
            }
            let excluded = state.catalog.ledger_set(modality)?;
            let mut hits = state.pipelines.get(modality).similarity_search(query, k, &excluded)?;
            hits.truncate(k);
            debug!(%modality, hits = hits.len(), "searched pipeline");
            results.set(modality, aggregate_hits(hits));
        }
        Ok(results)
    }

    /// Image→image search for a local or remote query image.
    pub fn search_image(&self, locator: &str, k: usize) -> Result<Vec<FileMatch>> {
        let state = self.connected()?;
        if k == 0 {
            return Err(StoreError::InvalidArgument("k must be greater than zero".into()));
        }
        let not_image = || StoreError::UnsupportedModality(locator.to_string());
        let excluded = state.catalog.ledger_set(Modality::Image)?;
        let image = state.pipelines.get(Modality::Image);
        let mut hits = match Locator::parse(locator) {
            Locator::Local(path) => {
                if Modality::from_path(path) != Some(Modality::Image) {
                    return Err(not_image());
                }
                image.image_to_image_search(path, k, &excluded)?
            }
            Locator::Remote(uri) => {
                let (modality, temp) = self.fetch_to_temp(uri)?;
                if modality != Modality::Image {
                    return Err(not_image());
                }
                image.image_to_image_search(temp.path(), k, &excluded)?
            }
        };
        hits.truncate(k);
        Ok(aggregate_hits(hits))
    }

    pub fn get(&self, file_id: &str) -> Result<FileRecord> {
        self.connected()?.catalog.get(file_id)?.ok_or_else(|| StoreError::NotFound(file_id.to_string()))
    }

    /// Soft delete: the record goes, its slots move to the ledger and stay in the index.
    pub fn delete(&mut self, file_id: &str) -> Result<FileRecord> {
        let auto_commit = self.settings.auto_commit;
        let state = self.connected_mut()?;
        let record = state
            .catalog
            .delete_into_ledger(file_id)?
            .ok_or_else(|| StoreError::NotFound(file_id.to_string()))?;
        if auto_commit {
            state.catalog.flush()?;
        }
        info!(file_id, modality = %record.modality, slots = record.slot_range.len(), "deleted file");
        Ok(record)
    }

    /// Flushes every pipeline, then the catalog.
    pub fn commit(&mut self) -> Result<()> {
        let state = self.connected_mut()?;
        for modality in Modality::ALL {
            state.pipelines.get_mut(modality).commit()?;
        }
        state.catalog.flush()
    }

    /// Removes indexed slots that belong to no record and are not ledgered.
    pub fn reconcile(&mut self) -> Result<ReconcileReport> {
        let auto_commit = self.settings.auto_commit;
        reconcile_connected(self.connected_mut()?, auto_commit)
    }

    /// Drops ledgered slots from the indices and clears their ledger entries.
    /// Slot numbers are not handed out again.
    pub fn compact(&mut self) -> Result<CompactionReport> {
        let auto_commit = self.settings.auto_commit;
        let state = self.connected_mut()?;
        let mut report = CompactionReport::default();
        for modality in Modality::ALL {
            let ledger = state.catalog.ledger(modality)?;
            if ledger.is_empty() {
                continue;
            }
            let pipeline = state.pipelines.get_mut(modality);
            let removed = pipeline.remove_slots(&ledger)?;
            if auto_commit {
                pipeline.commit()?;
            }
            state.catalog.clear_ledger(modality, &ledger)?;
            report.removed.insert(modality, removed);
        }
        if auto_commit {
            state.catalog.flush()?;
        }
        info!(removed = report.total(), "compacted store");
        Ok(report)
    }

    /// Inserts every supported file under `dir`, in file name order.
    ///
    /// Per-file failures are reported next to their path instead of aborting
    /// the walk.
    pub fn insert_dir(&mut self, dir: &Path) -> Result<Vec<(PathBuf, Result<FileId>)>> {
        self.connected()?;
        if !dir.is_dir() {
            return Err(StoreError::InvalidArgument(format!("{} is not a directory", dir.display())));
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            match entry {
                Ok(e) if e.file_type().is_file() => {
                    if let Some(modality) = Modality::from_path(e.path()) {
                        files.push((e.into_path(), modality));
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "skipping unreadable directory entry"),
            }
        }

        let pb = ProgressBar::new(files.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        // one flush for the whole walk; the catalog rows wait in a transaction
        self.connected()?.catalog.begin_batch()?;
        let mut outcomes = Vec::with_capacity(files.len());
        for (path, modality) in files {
            pb.set_message(path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default());
            let source = path.to_string_lossy().into_owned();
            let outcome = self.insert_as(modality, &path, &source, false);
            if let Err(e) = &outcome {
                warn!(path = %path.display(), error = %e, "insert failed");
            }
            outcomes.push((path, outcome));
            pb.inc(1);
        }
        pb.finish_with_message("done");
        if self.settings.auto_commit {
            self.commit()?;
        }
        Ok(outcomes)
    }

    pub fn record_count(&self) -> Result<usize> { self.connected()?.catalog.count() }

    pub fn records(&self, modality: Option<Modality>) -> Result<Vec<FileRecord>> { self.connected()?.catalog.records(modality) }

    pub fn deleted_slots(&self, modality: Modality) -> Result<Vec<u64>> { self.connected()?.catalog.ledger(modality) }
}

fn record_insert(
    pipeline: &mut dyn EmbeddingPipeline,
    catalog: &mut Catalog,
    record: &FileRecord,
    durable: bool,
) -> Result<()> {
    if durable {
        pipeline.commit()?;
    }
    catalog.insert_record(record)?;
    if durable {
        catalog.flush()?;
    }
    Ok(())
}

fn reconcile_connected(state: &mut Connected, auto_commit: bool) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();
    for modality in Modality::ALL {
        let covered: HashSet<u64> =
            state.catalog.records(Some(modality))?.iter().flat_map(|r| r.slot_range.slots()).collect();
        let ledger = state.catalog.ledger_set(modality)?;
        let pipeline = state.pipelines.get_mut(modality);
        let orphans: Vec<u64> = pipeline
            .indexed_slots()?
            .into_iter()
            .filter(|slot| !covered.contains(slot) && !ledger.contains(slot))
            .collect();
        if orphans.is_empty() {
            continue;
        }
        warn!(%modality, count = orphans.len(), "removing orphaned index slots");
        pipeline.remove_slots(&orphans)?;
        if auto_commit {
            pipeline.commit()?;
        }
        report.orphans.insert(modality, orphans);
    }
    Ok(report)
}
