use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Startup and wiring failures. The request hot path never produces one of
/// these: malformed input degrades to a default-search redirect or a closed
/// connection instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to read bang file {path}: {source}")]
    BangFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid bang data in {origin}: {source}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("bang directory is empty; refusing to start")]
    EmptyDirectory,

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
