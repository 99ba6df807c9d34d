//! Partitioning over a list of existing index files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::manager::{retain_visible, MemberCollection, PartitionEntry, PartitionManager};
use crate::error::{io_error_at, require_directory, Result};
use crate::index_store::IndexStore;
use crate::naming::{collection_name_from_index_path, is_index_file, make_collection_index_path};
use crate::removed::RemovedSet;
use crate::types::{FileRef, UpdateMode};

/// A collection whose member list lives in one index file.
#[derive(Debug, Clone)]
pub struct IndexedCollection {
    name: String,
    root: PathBuf,
    index_path: PathBuf,
    store: Arc<dyn IndexStore>,
}

impl IndexedCollection {
    /// `root` is taken from the index file's directory.
    pub fn new(name: impl Into<String>, index_path: PathBuf, store: Arc<dyn IndexStore>) -> Self {
        let root = index_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            name: name.into(),
            root,
            index_path,
            store,
        }
    }
}

impl MemberCollection for IndexedCollection {
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
        self.store.read_member_files(&self.index_path)
    }
}

/// One partition per pre-existing index file.
///
/// Nothing is rescanned here: the index files are the partitions, so the
/// update mode has no effect.
#[derive(Debug)]
pub struct IndexListPartition {
    name: String,
    root: PathBuf,
    index_files: Vec<PathBuf>,
    store: Arc<dyn IndexStore>,
}

impl IndexListPartition {
    pub fn new(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        index_files: Vec<PathBuf>,
        store: Arc<dyn IndexStore>,
    ) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            index_files,
            store,
        }
    }

    /// Lists the index files directly inside `dir`, sorted by path.
    ///
    /// The directory's own canonical index is left out; it describes the
    /// list, not a member of it.
    pub fn from_directory(
        top_collection: &str,
        dir: impl Into<PathBuf>,
        store: Arc<dyn IndexStore>,
    ) -> Result<Self> {
        let dir = dir.into();
        require_directory(&dir)?;
        let own_index = make_collection_index_path(top_collection, &dir);

        let mut index_files = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|error| io_error_at(&dir, error))? {
            let path = entry.map_err(|error| io_error_at(&dir, error))?.path();
            if is_index_file(&path) && path != own_index && path.is_file() {
                index_files.push(path);
            }
        }
        index_files.sort();
        log::debug!(
            "{top_collection}: {} index files in {}",
            index_files.len(),
            dir.display()
        );
        Ok(Self::new(top_collection, dir, index_files, store))
    }

    pub fn index_files(&self) -> &[PathBuf] {
        &self.index_files
    }
}

impl PartitionManager for IndexListPartition {
    fn name(&self) -> &str {
        &self.name
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn make_partitions(
        &mut self,
        _mode: UpdateMode,
        removed: &RemovedSet,
    ) -> Result<Vec<PartitionEntry>> {
        let mut collections = Vec::with_capacity(self.index_files.len());
        for index_path in &self.index_files {
            let Some(name) = collection_name_from_index_path(index_path) else {
                log::warn!("{}: not an index file name: {}", self.name, index_path.display());
                continue;
            };
            collections.push(IndexedCollection::new(
                name,
                index_path.clone(),
                Arc::clone(&self.store),
            ));
        }
        retain_visible(&mut collections, removed, |collection| collection.name.as_str());
        Ok(collections
            .into_iter()
            .map(|collection| PartitionEntry::Collection(Box::new(collection)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_store::testing::{FakeIndex, MemoryIndexStore};
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn one_collection_per_index_file() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryIndexStore::default());
        let files = vec![FileRef::new(temp.path().join("a.grib2"), 3, 3)];
        for name in ["gfs-20210301.ncx", "gfs-20210302.ncx"] {
            File::create(temp.path().join(name)).unwrap();
            store.insert(temp.path().join(name), FakeIndex::Leaf(files.clone()));
        }
        // data files and the list's own index are not members
        File::create(temp.path().join("a.grib2")).unwrap();
        let own = make_collection_index_path("gfs", temp.path());
        File::create(&own).unwrap();

        let mut partition =
            IndexListPartition::from_directory("gfs", temp.path(), store.clone()).unwrap();
        let entries = partition
            .make_partitions(UpdateMode::TrustCache, &RemovedSet::new())
            .unwrap();
        let names: Vec<_> = entries.iter().map(PartitionEntry::name).collect();
        assert_eq!(names, vec!["gfs-20210301", "gfs-20210302"]);

        let collection = entries[0].as_collection().unwrap();
        assert_eq!(collection.root(), temp.path());
        assert_eq!(collection.files().unwrap(), files);
    }

    #[test]
    fn removed_index_partitions_are_omitted() {
        let temp = TempDir::new().unwrap();
        let store: Arc<dyn IndexStore> = Arc::new(MemoryIndexStore::default());
        let index_files = vec![
            temp.path().join("gfs-a.ncx"),
            temp.path().join("gfs-b.ncx"),
        ];
        let mut partition = IndexListPartition::new("gfs", temp.path(), index_files, store);
        let removed = RemovedSet::new();
        removed.remove_partition("gfs-a");

        for _ in 0..2 {
            let entries = partition
                .make_partitions(UpdateMode::TrustCache, &removed)
                .unwrap();
            let names: Vec<_> = entries.iter().map(PartitionEntry::name).collect();
            assert_eq!(names, vec!["gfs-b"]);
        }
    }

    #[test]
    fn from_directory_rejects_missing_dir() {
        let temp = TempDir::new().unwrap();
        let store: Arc<dyn IndexStore> = Arc::new(MemoryIndexStore::default());
        assert!(IndexListPartition::from_directory("gfs", temp.path().join("none"), store).is_err());
    }
}
