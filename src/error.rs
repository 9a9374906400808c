//! Error types for xtu-build.

use std::path::PathBuf;

/// Errors that abort an XTU build run.
///
/// External tool failures are not represented here: those are logged and
/// counted by the pipeline, never propagated.
#[derive(Debug, thiserror::Error)]
pub enum XtuError {
    #[error("Compilation database not found: {0}")]
    DatabaseNotFound(PathBuf),

    #[error("Invalid compilation database {path}: {source}")]
    InvalidDatabase {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("Missing listing: {0}")]
    MissingListing(PathBuf),

    #[error("Failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Architecture detection failed for {source_file}: {message}")]
    ArchDetection { source_file: String, message: String },

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, XtuError>;
