//! semstore
//!
//! Multimodal semantic store. The `Store` coordinator assigns file ids and
//! slot ranges, keeps the sqlite catalog in step with the per-modality
//! pipelines, and regroups chunk hits into per-file matches.
//!
//! ```no_run
//! use semstore::{Config, Store};
//!
//! # fn main() -> anyhow::Result<()> {
//! let settings = Config::load()?.settings()?;
//! let mut store = Store::new(settings)?;
//! store.connect("~/data/library.db")?;
//! let id = store.insert("notes/water.txt")?;
//! let results = store.search("boiling water", 5, &["text", "image"])?;
//! println!("{id}: {} text matches", results.texts.len());
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod catalog;
pub mod error;
pub mod fetch;
pub mod locator;
pub mod store;

pub use aggregate::aggregate_hits;
pub use catalog::Catalog;
pub use error::{FetchError, Result, StoreError};
pub use fetch::{FetchedResource, Fetcher, FtpFetcher, HttpFetcher, RemoteFetcher};
pub use locator::Locator;
pub use store::{CompactionReport, DefaultPipelines, PipelineFactory, ReconcileReport, Store, StorePaths};

pub use semstore_core::config::{Config, StoreSettings};
pub use semstore_core::{ChunkHit, ChunkPayload, FileId, FileMatch, FileRecord, Modality, SearchResults, SlotRange};
pub use semstore_pipeline::PipelinePaths;
