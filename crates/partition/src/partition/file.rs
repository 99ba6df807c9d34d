//! Every file is its own partition.

use std::path::{Path, PathBuf};

use super::manager::{retain_visible, MemberCollection, PartitionEntry, PartitionManager};
use crate::directory::DirectoryCollection;
use crate::error::Result;
use crate::filter::FileFilter;
use crate::naming::{index_path_for_name, make_collection_name};
use crate::removed::RemovedSet;
use crate::types::{FileRef, UpdateMode};

/// A collection of exactly one self-contained file.
#[derive(Debug, Clone)]
pub struct SingleFileCollection {
    name: String,
    root: PathBuf,
    index_path: PathBuf,
    file: FileRef,
}

impl SingleFileCollection {
    /// Names the collection after the file, as `make_collection_name` would
    /// name a directory at that path. The index sits next to the file.
    pub fn new(top_collection: &str, file: FileRef) -> Self {
        let name = make_collection_name(top_collection, file.path());
        let root = file
            .path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            index_path: index_path_for_name(&root, &name),
            name,
            root,
            file,
        }
    }

    pub fn file(&self) -> &FileRef {
        &self.file
    }
}

impl MemberCollection for SingleFileCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> &Path {
        &self.index_path
    }

    fn files(&self) -> Result<Vec<FileRef>> {
        Ok(vec![self.file.clone()])
    }
}

/// Partitions a directory into one collection per member file.
#[derive(Debug)]
pub struct FilePartition {
    collection: DirectoryCollection,
}

impl FilePartition {
    pub fn new(top_collection: &str, dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            collection: DirectoryCollection::new(top_collection, dir)?,
        })
    }

    pub fn with_filter(mut self, filter: FileFilter) -> Self {
        self.collection = self.collection.with_filter(filter);
        self
    }
}

impl PartitionManager for FilePartition {
    fn name(&self) -> &str {
        self.collection.name()
    }

    fn root(&self) -> &Path {
        self.collection.dir()
    }

    /// Files are listed fresh on every call; there is no index to trust.
    fn make_partitions(
        &mut self,
        _mode: UpdateMode,
        removed: &RemovedSet,
    ) -> Result<Vec<PartitionEntry>> {
        let top_collection = self.collection.top_collection();
        let mut collections: Vec<SingleFileCollection> = self
            .collection
            .files_sorted()?
            .into_iter()
            .map(|file| SingleFileCollection::new(top_collection, file))
            .collect();
        retain_visible(&mut collections, removed, |collection| collection.name.as_str());
        Ok(collections
            .into_iter()
            .map(|collection| PartitionEntry::Collection(Box::new(collection)))
            .collect())
    }
}
