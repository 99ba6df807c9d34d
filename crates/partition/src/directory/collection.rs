//! Member files of a single directory.

use std::fmt;
use std::fs::{self, ReadDir};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::date::DateExtractor;
use crate::error::{io_error_at, require_directory, Result};
use crate::filter::FileFilter;
use crate::naming::{make_collection_index_path, make_collection_name};
use crate::types::{unix_now_millis, FileRef};

/// Number of entries the leaf probe reads before deciding.
pub const LEAF_PROBE_LIMIT: usize = 100;

/// The files directly inside one directory.
///
/// Subdirectories are never members. Files are either materialized and
/// sorted (`files_sorted`) or streamed one entry at a time (`iter`).
#[derive(Clone)]
pub struct DirectoryCollection {
    top_collection: String,
    collection_name: String,
    dir: PathBuf,
    index_path: PathBuf,
    filter: FileFilter,
    date_extractor: Option<Arc<dyn DateExtractor>>,
}

impl fmt::Debug for DirectoryCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryCollection")
            .field("collection_name", &self.collection_name)
            .field("dir", &self.dir)
            .field("filter", &self.filter)
            .field(
                "date_extractor",
                &self.date_extractor.as_ref().map(|_| "<extractor>"),
            )
            .finish()
    }
}

impl DirectoryCollection {
    /// Binds a collection to `dir`, which must be an existing directory.
    pub fn new(top_collection: &str, dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        require_directory(&dir)?;
        Ok(Self {
            top_collection: top_collection.to_string(),
            collection_name: make_collection_name(top_collection, &dir),
            index_path: make_collection_index_path(top_collection, &dir),
            dir,
            filter: FileFilter::default(),
            date_extractor: None,
        })
    }

    pub fn with_filter(mut self, filter: FileFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Sorts `files_sorted` output by extracted date instead of path.
    pub fn with_date_extractor(mut self, extractor: Arc<dyn DateExtractor>) -> Self {
        self.date_extractor = Some(extractor);
        self
    }

    pub fn top_collection(&self) -> &str {
        &self.top_collection
    }

    pub fn name(&self) -> &str {
        &self.collection_name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn filter(&self) -> &FileFilter {
        &self.filter
    }

    /// Answers "is this a leaf?" from a bounded sample of entries.
    ///
    /// Reads at most `LEAF_PROBE_LIMIT` entries and reports a leaf unless one
    /// of them is a subdirectory. A directory with subdirectories beyond the
    /// sample is reported as a leaf.
    pub fn is_leaf_directory(&self) -> Result<bool> {
        let read_dir = fs::read_dir(&self.dir).map_err(|error| io_error_at(&self.dir, error))?;
        for entry in read_dir.take(LEAF_PROBE_LIMIT) {
            let entry = entry.map_err(|error| io_error_at(&self.dir, error))?;
            let path = entry.path();
            let is_dir = match fs::metadata(&path) {
                Ok(metadata) => metadata.is_dir(),
                Err(_) => entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false),
            };
            if is_dir {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Streams the member files.
    ///
    /// The directory handle is owned by the returned iterator and closed when
    /// it is dropped, whether iteration finished or not.
    pub fn iter(&self) -> Result<DirectoryFiles> {
        let read_dir = fs::read_dir(&self.dir).map_err(|error| io_error_at(&self.dir, error))?;
        Ok(DirectoryFiles {
            dir: self.dir.clone(),
            read_dir,
            filter: self.filter.clone(),
            now: unix_now_millis(),
        })
    }

    /// Calls `consume` for each member file, logging and skipping unreadable
    /// entries. Returns the number of files visited.
    pub fn visit(&self, mut consume: impl FnMut(FileRef)) -> Result<usize> {
        let mut count = 0;
        for item in self.iter()? {
            match item {
                Ok(file) => {
                    count += 1;
                    consume(file);
                }
                Err(error) => log::warn!("{}: skipping entry: {error}", self.collection_name),
            }
        }
        Ok(count)
    }

    /// Returns all member files, sorted by path or by extracted date.
    ///
    /// With a date extractor, files whose date cannot be extracted sort first;
    /// equal dates are ordered by path.
    pub fn files_sorted(&self) -> Result<Vec<FileRef>> {
        let mut files = Vec::new();
        self.visit(|file| files.push(file))?;
        match &self.date_extractor {
            Some(extractor) => {
                files.sort_by_cached_key(|file| (extractor.extract(file), file.path().to_path_buf()))
            }
            None => files.sort_by(|a, b| a.path().cmp(b.path())),
        }
        Ok(files)
    }
}

/// Streaming iterator over a directory's member files.
pub struct DirectoryFiles {
    dir: PathBuf,
    read_dir: ReadDir,
    filter: FileFilter,
    now: u64,
}

impl fmt::Debug for DirectoryFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryFiles")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl Iterator for DirectoryFiles {
    type Item = Result<FileRef>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.read_dir.next()? {
                Ok(entry) => entry,
                Err(error) => return Some(Err(io_error_at(&self.dir, error))),
            };
            let path = entry.path();
            // follow symlinks so linked data files count as members
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(error) => return Some(Err(io_error_at(&path, error))),
            };
            if metadata.is_dir() {
                continue;
            }
            let file = FileRef::from_metadata(path, &metadata);
            if self.filter.accepts(&file, self.now) {
                return Some(Ok(file));
            }
        }
    }
}
