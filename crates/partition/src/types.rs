//! Value types shared across the partition tree and the collection adapters.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{io_error_at, PartitionError, Result};

/// A reference to one file in the archive.
///
/// Only the attributes needed to name, order and age-filter a file are kept;
/// the file's contents are never read by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRef {
    path: PathBuf,
    size: u64,
    /// Milliseconds since the Unix epoch.
    last_modified: u64,
}

impl FileRef {
    pub fn new(path: impl Into<PathBuf>, size: u64, last_modified: u64) -> Self {
        Self {
            path: path.into(),
            size,
            last_modified,
        }
    }

    /// Stats `path` and captures its size and modification time.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let metadata = fs::metadata(&path).map_err(|error| io_error_at(&path, error))?;
        Ok(Self::from_metadata(path, &metadata))
    }

    pub fn from_metadata(path: PathBuf, metadata: &fs::Metadata) -> Self {
        Self {
            path,
            size: metadata.len(),
            last_modified: metadata.modified().map(system_time_millis).unwrap_or(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The final path component, lossily converted.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn last_modified(&self) -> u64 {
        self.last_modified
    }
}

/// Caller policy on whether a cached index may stand in for a filesystem scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpdateMode {
    /// Use an index whenever one exists.
    #[default]
    #[serde(rename = "nocheck")]
    TrustCache,
    /// Use an index only if it is at least as new as its directory.
    #[serde(rename = "test")]
    Verify,
    /// Ignore indexes and rescan.
    #[serde(rename = "always")]
    ForceRescan,
}

impl UpdateMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TrustCache => "nocheck",
            Self::Verify => "test",
            Self::ForceRescan => "always",
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateMode {
    type Err = PartitionError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "nocheck" | "trust" => Ok(Self::TrustCache),
            "test" | "verify" => Ok(Self::Verify),
            "always" | "force" => Ok(Self::ForceRescan),
            other => Err(PartitionError::InvalidInput(format!(
                "unknown update mode: {other}"
            ))),
        }
    }
}

/// Classification of a directory in the partition tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeKind {
    #[default]
    Unknown,
    /// Contains child partitions.
    Branch,
    /// Contains member files directly.
    Leaf,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Branch => "branch",
            Self::Leaf => "leaf",
        }
    }
}

/// Converts a `SystemTime` to milliseconds since the Unix epoch.
pub fn system_time_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|value| value.as_millis() as u64)
        .unwrap_or(0)
}

/// Returns the current time in milliseconds since the Unix epoch.
pub fn unix_now_millis() -> u64 {
    system_time_millis(SystemTime::now())
}
