use std::path::PathBuf;
use thiserror::Error;

use semstore_core::CoreError;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Fetching {uri} returned status {status}")]
    Status { uri: String, status: u16 },

    #[error("Fetching {uri} failed: {message}")]
    Transport { uri: String, message: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store is not connected, call connect() first")]
    NotConnected,

    #[error("Unsupported modality for {0}")]
    UnsupportedModality(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("No file record with id {0}")]
    NotFound(String),

    #[error("Cannot open catalog at {}", .path.display())]
    Connection {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Config(#[from] CoreError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] rusqlite::Error),

    #[error("Corrupt catalog record: {0}")]
    CorruptRecord(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding or index failure reported by a pipeline, passed through as is.
    #[error(transparent)]
    Pipeline(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
