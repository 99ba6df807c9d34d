use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Collection {0} is time partitioned but has no date extractor")]
    MissingDateExtractor(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, PartitionError>;

/// Wraps an I/O error with the path that produced it.
pub fn io_error_at(path: &Path, error: std::io::Error) -> PartitionError {
    PartitionError::Io(std::io::Error::new(
        error.kind(),
        format!("{}: {error}", path.display()),
    ))
}

/// Fails with `NotADirectory` unless `path` is an existing directory.
pub fn require_directory(path: &Path) -> Result<fs::Metadata> {
    let metadata = fs::metadata(path).map_err(|error| io_error_at(path, error))?;
    if !metadata.is_dir() {
        return Err(PartitionError::NotADirectory(path.to_path_buf()));
    }
    Ok(metadata)
}
