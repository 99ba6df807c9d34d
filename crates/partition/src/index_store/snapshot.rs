//! Postcard + zstd index files.
//!
//! An index file holds one `CollectionIndex`: either the member files of a
//! leaf directory or the child index files of a partition. Entry paths are
//! stored relative to `top_dir` where possible.
//!
//! Writes go to a temp file in the destination directory and are renamed into
//! place, so a reader sees either the old index or the new one.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::{ChildEntry, IndexStore};
use crate::error::{io_error_at, PartitionError, Result};
use crate::types::FileRef;

/// Index format version - increment when changing `CollectionIndex`.
pub const INDEX_FORMAT_VERSION: u32 = 1;

const ZSTD_LEVEL: i32 = 6;
const DECODE_SCRATCH_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    /// Lists child index files.
    Partition,
    /// Lists member data files.
    Collection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub path: PathBuf,
    pub last_modified: u64,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionIndex {
    pub version: u32,
    pub kind: IndexKind,
    /// Directory the index was written for.
    pub top_dir: PathBuf,
    pub entries: Vec<IndexEntry>,
}

impl CollectionIndex {
    /// Builds a leaf index listing `files`.
    pub fn collection(top_dir: impl Into<PathBuf>, files: &[FileRef]) -> Self {
        let top_dir = top_dir.into();
        let entries = files
            .iter()
            .map(|file| IndexEntry {
                path: relative_to(&top_dir, file.path()),
                last_modified: file.last_modified(),
                size: file.size(),
            })
            .collect();
        Self {
            version: INDEX_FORMAT_VERSION,
            kind: IndexKind::Collection,
            top_dir,
            entries,
        }
    }

    /// Builds a partition index listing child index files.
    pub fn partition(top_dir: impl Into<PathBuf>, child_indexes: &[FileRef]) -> Self {
        Self {
            kind: IndexKind::Partition,
            ..Self::collection(top_dir, child_indexes)
        }
    }

    fn resolve(&self, entry: &IndexEntry) -> PathBuf {
        if entry.path.is_absolute() {
            entry.path.clone()
        } else {
            self.top_dir.join(&entry.path)
        }
    }
}

fn relative_to(top_dir: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(top_dir)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Writes `index` to `path`, replacing any existing file atomically.
pub fn write_collection_index(path: &Path, index: &CollectionIndex) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        PartitionError::InvalidInput(format!("index path has no parent: {}", path.display()))
    })?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|error| io_error_at(parent, error))?;
    {
        let mut encoder = zstd::Encoder::new(BufWriter::new(tmp.as_file_mut()), ZSTD_LEVEL)
            .map_err(|error| {
                PartitionError::Serialization(format!("failed to create zstd encoder: {error}"))
            })?;
        postcard::to_io(index, &mut encoder).map_err(|error| {
            PartitionError::Serialization(format!(
                "failed to encode index {}: {error}",
                path.display()
            ))
        })?;
        let mut output = encoder.finish()?;
        output.flush()?;
    }
    let file = tmp
        .persist(path)
        .map_err(|error| io_error_at(path, error.error))?;
    // the rename touched the directory; keep the index at least as new
    file.set_modified(SystemTime::now())
        .map_err(|error| io_error_at(path, error))?;

    log::debug!(
        "wrote {:?} index {} ({} entries)",
        index.kind,
        path.display(),
        index.entries.len()
    );
    Ok(())
}

/// Reads and validates the index at `path`.
pub fn load_collection_index(path: &Path) -> Result<CollectionIndex> {
    let input = File::open(path).map_err(|error| io_error_at(path, error))?;
    let decoder = zstd::Decoder::new(input).map_err(|error| {
        PartitionError::Index(format!("index decompress failed for {}: {error}", path.display()))
    })?;

    let mut input = BufReader::new(decoder);
    let mut scratch = vec![0u8; DECODE_SCRATCH_BYTES];
    let index: CollectionIndex = match postcard::from_io((&mut input, &mut scratch)) {
        Ok((index, _)) => index,
        Err(error) => {
            return Err(PartitionError::Index(format!(
                "index decode failed for {}: {error}",
                path.display()
            )))
        }
    };

    if index.version != INDEX_FORMAT_VERSION {
        return Err(PartitionError::Index(format!(
            "index version mismatch for {}: {} != {}",
            path.display(),
            index.version,
            INDEX_FORMAT_VERSION
        )));
    }
    Ok(index)
}

/// `IndexStore` over postcard + zstd index files.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotIndexStore;

impl SnapshotIndexStore {
    pub fn new() -> Self {
        Self
    }
}

impl IndexStore for SnapshotIndexStore {
    fn read_children(
        &self,
        index_path: &Path,
        add_child: &mut dyn FnMut(ChildEntry),
    ) -> Result<bool> {
        let index = load_collection_index(index_path)?;
        if index.kind != IndexKind::Partition {
            return Ok(false);
        }
        for entry in &index.entries {
            add_child(ChildEntry {
                parent_dir: index.top_dir.clone(),
                index_path: index.resolve(entry),
                last_modified: entry.last_modified,
            });
        }
        Ok(true)
    }

    fn is_partition(&self, index_path: &Path) -> Result<bool> {
        Ok(load_collection_index(index_path)?.kind == IndexKind::Partition)
    }

    fn read_member_files(&self, index_path: &Path) -> Result<Vec<FileRef>> {
        let index = load_collection_index(index_path)?;
        if index.kind != IndexKind::Collection {
            return Ok(Vec::new());
        }
        Ok(index
            .entries
            .iter()
            .map(|entry| FileRef::new(index.resolve(entry), entry.size, entry.last_modified))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn leaf_index_lists_member_files() {
        let temp = TempDir::new().unwrap();
        let files = vec![
            FileRef::new(temp.path().join("a.grib2"), 10, 1_000),
            FileRef::new(temp.path().join("b.grib2"), 20, 2_000),
        ];
        let index_path = temp.path().join("top-x.ncx");
        write_collection_index(&index_path, &CollectionIndex::collection(temp.path(), &files))
            .unwrap();

        let store = SnapshotIndexStore::new();
        assert!(!store.is_partition(&index_path).unwrap());
        assert_eq!(store.read_member_files(&index_path).unwrap(), files);

        let mut children = Vec::new();
        assert!(!store
            .read_children(&index_path, &mut |child: ChildEntry| children.push(child))
            .unwrap());
        assert!(children.is_empty());
    }

    #[test]
    fn entries_are_stored_relative_to_top_dir() {
        let temp = TempDir::new().unwrap();
        let files = vec![FileRef::new(temp.path().join("sub/a.grib2"), 1, 1)];
        let index = CollectionIndex::collection(temp.path(), &files);
        assert_eq!(index.entries[0].path, PathBuf::from("sub/a.grib2"));

        let outside = vec![FileRef::new("/elsewhere/b.grib2", 1, 1)];
        let index = CollectionIndex::collection(temp.path(), &outside);
        assert_eq!(index.entries[0].path, PathBuf::from("/elsewhere/b.grib2"));
    }

    #[test]
    fn partition_index_emits_children() {
        let temp = TempDir::new().unwrap();
        let child_index = temp.path().join("2021/top-2021.ncx");
        let index = CollectionIndex::partition(
            temp.path(),
            &[FileRef::new(child_index.clone(), 64, 5_000)],
        );
        let index_path = temp.path().join("top-root.ncx");
        write_collection_index(&index_path, &index).unwrap();

        let store = SnapshotIndexStore::new();
        assert!(store.is_partition(&index_path).unwrap());
        assert!(store.read_member_files(&index_path).unwrap().is_empty());

        let mut children = Vec::new();
        assert!(store
            .read_children(&index_path, &mut |child: ChildEntry| children.push(child))
            .unwrap());
        assert_eq!(
            children,
            vec![ChildEntry {
                parent_dir: temp.path().to_path_buf(),
                index_path: child_index,
                last_modified: 5_000,
            }]
        );
    }

    #[test]
    fn rewrite_replaces_existing_index() {
        let temp = TempDir::new().unwrap();
        let index_path = temp.path().join("top-x.ncx");
        let first = vec![FileRef::new(temp.path().join("a"), 1, 1)];
        let second = vec![
            FileRef::new(temp.path().join("a"), 1, 1),
            FileRef::new(temp.path().join("b"), 2, 2),
        ];
        write_collection_index(&index_path, &CollectionIndex::collection(temp.path(), &first))
            .unwrap();
        write_collection_index(&index_path, &CollectionIndex::collection(temp.path(), &second))
            .unwrap();

        let loaded = load_collection_index(&index_path).unwrap();
        assert_eq!(loaded.entries.len(), 2);

        // no temp files left behind
        let leftovers = fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn corrupt_index_is_an_index_error() {
        let temp = TempDir::new().unwrap();
        let index_path = temp.path().join("top-x.ncx");
        fs::write(&index_path, b"not an index").unwrap();
        let result = load_collection_index(&index_path);
        assert!(matches!(result, Err(PartitionError::Index(_))));
    }

    #[test]
    fn missing_index_is_an_io_error() {
        let temp = TempDir::new().unwrap();
        let result = SnapshotIndexStore::new().is_partition(&temp.path().join("none.ncx"));
        assert!(matches!(result, Err(PartitionError::Io(_))));
    }
}
