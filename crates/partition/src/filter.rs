//! Member file filtering.

use std::time::Duration;

use glob::Pattern;

use crate::error::{PartitionError, Result};
use crate::naming::is_index_file;
use crate::types::FileRef;

/// Decides which files in a directory are collection members.
///
/// Index files are never members. Beyond that a file must match the optional
/// wildcard on its name and, when `older_than` is set, must not have been
/// modified within that grace period (it may still be being written).
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    wildcard: Option<Pattern>,
    older_than: Option<Duration>,
}

impl FileFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts members to file names matching a glob such as `*.grib2`.
    pub fn with_wildcard(mut self, wildcard: &str) -> Result<Self> {
        let pattern = Pattern::new(wildcard).map_err(|error| {
            PartitionError::Config(format!("invalid file filter {wildcard}: {error}"))
        })?;
        self.wildcard = Some(pattern);
        Ok(self)
    }

    pub fn with_older_than(mut self, older_than: Duration) -> Self {
        self.older_than = Some(older_than);
        self
    }

    pub fn older_than(&self) -> Option<Duration> {
        self.older_than
    }

    /// Returns true if `file` is a member, judged at `now` (ms since epoch).
    pub fn accepts(&self, file: &FileRef, now: u64) -> bool {
        if is_index_file(file.path()) {
            return false;
        }
        if let Some(pattern) = &self.wildcard {
            if !pattern.matches(&file.name()) {
                return false;
            }
        }
        if let Some(older_than) = self.older_than {
            let age = now.saturating_sub(file.last_modified());
            if u128::from(age) < older_than.as_millis() {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000_000;

    #[test]
    fn default_accepts_data_files() {
        let filter = FileFilter::new();
        assert!(filter.accepts(&FileRef::new("/d/a.grib2", 1, NOW), NOW));
    }

    #[test]
    fn index_files_are_never_members() {
        let filter = FileFilter::new();
        assert!(!filter.accepts(&FileRef::new("/d/top-d.ncx", 1, 0), NOW));
    }

    #[test]
    fn wildcard_matches_file_name() {
        let filter = FileFilter::new().with_wildcard("*.grib2").unwrap();
        assert!(filter.accepts(&FileRef::new("/d/gfs.grib2", 1, 0), NOW));
        assert!(!filter.accepts(&FileRef::new("/d/gfs.nc", 1, 0), NOW));
    }

    #[test]
    fn invalid_wildcard_is_config_error() {
        let result = FileFilter::new().with_wildcard("[");
        assert!(matches!(result, Err(PartitionError::Config(_))));
    }

    #[test]
    fn older_than_skips_recent_files() {
        let filter = FileFilter::new().with_older_than(Duration::from_secs(60));
        let fresh = FileRef::new("/d/a.grib2", 1, NOW - 10_000);
        let settled = FileRef::new("/d/b.grib2", 1, NOW - 61_000);
        assert!(!filter.accepts(&fresh, NOW));
        assert!(filter.accepts(&settled, NOW));
    }
}
