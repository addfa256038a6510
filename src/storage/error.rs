use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
/// Errors returned by the snapshot store.
pub enum StorageError {
    /// IO error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// No snapshot exists at the configured path.
    #[error("snapshot not found: {path}")]
    NotFound {
        /// Path that was checked.
        path: PathBuf,
    },

    /// File exists but is empty.
    #[error("snapshot file is empty: {path}")]
    EmptyFile {
        /// Path that was read.
        path: PathBuf,
    },

    /// Failed to create the parent directory.
    #[error("failed to create snapshot directory: {path}")]
    DirCreationFailed {
        /// Directory path.
        path: PathBuf,
    },
}

/// Convenience result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
