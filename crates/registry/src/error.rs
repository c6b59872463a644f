use std::path::PathBuf;

use thiserror::Error;

/// Per-directory discovery failure. Always recovered locally: the directory
/// is skipped (or its metadata ignored) and discovery moves on.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read activity metadata {path}: {source}")]
    MetadataRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid activity metadata {path}: {source}")]
    MetadataParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
