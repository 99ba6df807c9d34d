//! One directory in the partition tree.
//!
//! A node answers two questions about its directory, both lazily and at most
//! once: is it a leaf or a branch, and what are its children. Each answer
//! comes from the directory's cached index when the caller trusts it, and
//! from a filesystem scan otherwise. Children are expanded one level per
//! `construct_children` call, never recursively.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use super::collection::DirectoryCollection;
use crate::error::{require_directory, PartitionError, Result};
use crate::index_store::{ChildEntry, IndexStore};
use crate::naming::{make_collection_index_path, make_collection_name};
use crate::types::{system_time_millis, FileRef, NodeKind, UpdateMode};

/// Where a node comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeSource {
    /// A live directory.
    Directory(PathBuf),
    /// A child listed in a parent's partition index.
    IndexEntry {
        index_path: PathBuf,
        last_modified: u64,
    },
}

/// The index file bound to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub path: PathBuf,
    /// Milliseconds since the Unix epoch.
    pub last_modified: u64,
    pub size: u64,
}

impl IndexInfo {
    pub fn to_file_ref(&self) -> FileRef {
        FileRef::new(self.path.clone(), self.size, self.last_modified)
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryNode {
    top_collection: String,
    collection_name: String,
    dir: PathBuf,
    dir_last_modified: u64,
    index: Option<IndexInfo>,
    kind: NodeKind,
    /// `None` until `construct_children` runs.
    children: Option<Vec<DirectoryNode>>,
    /// Set when a scan hit I/O errors and may have missed children.
    partial: bool,
}

impl DirectoryNode {
    /// Builds a node from either source. Both resolve to the same record.
    pub fn open(top_collection: &str, source: NodeSource) -> Result<Self> {
        match source {
            NodeSource::Directory(dir) => Self::from_directory(top_collection, dir),
            NodeSource::IndexEntry {
                index_path,
                last_modified,
            } => Self::from_index_entry(top_collection, index_path, last_modified),
        }
    }

    /// Binds a node to `dir` and probes for its canonical index.
    pub fn from_directory(top_collection: &str, dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let mut node = Self::record(top_collection, dir)?;
        node.find_index();
        Ok(node)
    }

    /// Rebuilds a node from a parent index entry.
    ///
    /// The directory is the index file's parent and its attributes are read
    /// fresh; a directory that no longer exists is an I/O error. If the child
    /// index itself has gone missing the node falls back to scanning.
    pub fn from_index_entry(
        top_collection: &str,
        index_path: impl Into<PathBuf>,
        last_modified: u64,
    ) -> Result<Self> {
        let index_path = index_path.into();
        let dir = index_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                PartitionError::Index(format!(
                    "index entry has no parent directory: {}",
                    index_path.display()
                ))
            })?;
        let mut node = Self::record(top_collection, dir)?;
        match fs::metadata(&index_path) {
            Ok(metadata) if metadata.is_file() => {
                node.index = Some(IndexInfo {
                    path: index_path,
                    last_modified,
                    size: metadata.len(),
                });
            }
            _ => {
                log::warn!(
                    "{}: listed index {} is missing, will scan",
                    node.collection_name(),
                    index_path.display()
                );
                node.find_index();
            }
        }
        Ok(node)
    }

    fn record(top_collection: &str, dir: PathBuf) -> Result<Self> {
        let metadata = require_directory(&dir)?;
        Ok(Self {
            top_collection: top_collection.to_string(),
            collection_name: make_collection_name(top_collection, &dir),
            dir_last_modified: metadata.modified().map(system_time_millis).unwrap_or(0),
            dir,
            index: None,
            kind: NodeKind::Unknown,
            children: None,
            partial: false,
        })
    }

    pub fn top_collection(&self) -> &str {
        &self.top_collection
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn dir_last_modified(&self) -> u64 {
        self.dir_last_modified
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Where this node's index is, or would be.
    pub fn index_path(&self) -> PathBuf {
        make_collection_index_path(&self.top_collection, &self.dir)
    }

    pub fn index(&self) -> Option<&IndexInfo> {
        self.index.as_ref()
    }

    /// The memoized classification; `Unknown` until `classify` or
    /// `construct_children` has run.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn children(&self) -> Option<&[DirectoryNode]> {
        self.children.as_deref()
    }

    /// True if the last scan hit I/O errors, so an empty child list may mean
    /// "unreadable" rather than "empty".
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Looks for an index at the canonical path and records it if found.
    ///
    /// Once an index has been recorded it is trusted and not probed again.
    pub fn find_index(&mut self) -> bool {
        if self.index.is_some() {
            return true;
        }
        let path = self.index_path();
        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => {
                self.index = Some(IndexInfo {
                    last_modified: metadata.modified().map(system_time_millis).unwrap_or(0),
                    size: metadata.len(),
                    path,
                });
                true
            }
            _ => false,
        }
    }

    /// True if the bound index is at least as new as the directory.
    ///
    /// Adding or removing entries updates a directory's modification time, so
    /// an older index may be missing files.
    pub fn is_index_current(&self) -> bool {
        self.index
            .as_ref()
            .map(|index| index.last_modified >= self.dir_last_modified)
            .unwrap_or(false)
    }

    /// Classifies the node from its index if one is bound and readable, else
    /// from a bounded probe of the directory. Same as `classify_in_mode` with
    /// `UpdateMode::TrustCache`.
    pub fn classify(&mut self, store: &dyn IndexStore) -> Result<NodeKind> {
        self.classify_in_mode(store, UpdateMode::TrustCache)
    }

    /// Classifies the node, consulting the bound index only when `mode`
    /// trusts it: always for `TrustCache`, for `Verify` only if the index is
    /// current, never for `ForceRescan`. Otherwise the directory is probed.
    pub fn classify_in_mode(
        &mut self,
        store: &dyn IndexStore,
        mode: UpdateMode,
    ) -> Result<NodeKind> {
        if self.kind != NodeKind::Unknown {
            return Ok(self.kind);
        }
        let trusted_index = match (&self.index, mode) {
            (Some(index), UpdateMode::TrustCache) => Some(index),
            (Some(index), UpdateMode::Verify) if self.is_index_current() => Some(index),
            _ => None,
        };
        let from_index = match trusted_index {
            Some(index) => match store.is_partition(&index.path) {
                Ok(is_partition) => Some(is_partition),
                Err(error) => {
                    log::warn!(
                        "{}: cannot read index {}: {error}",
                        self.collection_name,
                        index.path.display()
                    );
                    None
                }
            },
            None => None,
        };
        let is_partition = match from_index {
            Some(is_partition) => is_partition,
            None => {
                let probe = DirectoryCollection::new(&self.top_collection, &self.dir)?;
                !probe.is_leaf_directory()?
            }
        };
        self.kind = if is_partition {
            NodeKind::Branch
        } else {
            NodeKind::Leaf
        };
        Ok(self.kind)
    }

    /// Returns the node's immediate children, reading them on first call.
    ///
    /// With a bound index and `UpdateMode::TrustCache` the children come from
    /// the index. Otherwise the directory is scanned for subdirectories.
    /// Later calls return the same children without any I/O.
    pub fn construct_children(
        &mut self,
        store: &dyn IndexStore,
        mode: UpdateMode,
    ) -> Result<&[DirectoryNode]> {
        if self.children.is_none() {
            let trusted_index = match (&self.index, mode) {
                (Some(index), UpdateMode::TrustCache) => Some(index.path.clone()),
                _ => None,
            };
            let from_index = match trusted_index {
                Some(index_path) => self.children_from_index(store, &index_path)?,
                None => None,
            };
            let children = match from_index {
                Some(children) => children,
                None => self.scan_children(),
            };
            self.kind = if children.is_empty() {
                NodeKind::Leaf
            } else {
                NodeKind::Branch
            };
            log::debug!(
                "{}: {} children ({})",
                self.collection_name(),
                children.len(),
                self.kind.as_str()
            );
            self.children = Some(children);
        }
        Ok(self.children.as_deref().unwrap_or_default())
    }

    /// Reads children from the index. `None` means the index was unreadable
    /// and the caller should scan instead.
    fn children_from_index(
        &self,
        store: &dyn IndexStore,
        index_path: &Path,
    ) -> Result<Option<Vec<DirectoryNode>>> {
        let mut entries = Vec::new();
        let is_partition =
            match store.read_children(index_path, &mut |child: ChildEntry| entries.push(child)) {
                Ok(is_partition) => is_partition,
                Err(error) => {
                    log::warn!(
                        "{}: cannot read index {}: {error}",
                        self.collection_name(),
                        index_path.display()
                    );
                    return Ok(None);
                }
            };
        if !is_partition {
            return Ok(Some(Vec::new()));
        }
        entries
            .into_iter()
            .map(|entry| {
                Self::from_index_entry(&self.top_collection, entry.index_path, entry.last_modified)
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Scans for immediate subdirectories. I/O errors are logged, mark the
    /// node partial and otherwise count as "no child here".
    fn scan_children(&mut self) -> Vec<DirectoryNode> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(error) => {
                log::error!("cannot scan {}: {error}", self.dir.display());
                self.partial = true;
                return Vec::new();
            }
        };

        let mut children = Vec::new();
        for entry in read_dir {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(error) => {
                    log::error!("cannot read entry in {}: {error}", self.dir.display());
                    self.partial = true;
                    continue;
                }
            };
            match fs::metadata(&path) {
                Ok(metadata) if metadata.is_dir() => {}
                Ok(_) => continue,
                Err(error) => {
                    log::error!("cannot stat {}: {error}", path.display());
                    self.partial = true;
                    continue;
                }
            }
            match Self::from_directory(&self.top_collection, path) {
                Ok(child) => children.push(child),
                Err(error) => {
                    log::error!("{}: skipping child: {error}", self.collection_name());
                    self.partial = true;
                }
            }
        }
        children.sort_by(|a, b| a.dir.cmp(&b.dir));
        children
    }

    /// Returns the member files recorded in the bound index, or nothing if no
    /// index is bound.
    pub fn read_files(&self, store: &dyn IndexStore) -> Result<Vec<FileRef>> {
        match &self.index {
            Some(index) => store.read_member_files(&index.path),
            None => Ok(Vec::new()),
        }
    }
}

impl fmt::Display for DirectoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DirectoryNode{{ dir= {}", self.dir.display())?;
        if let Some(index) = &self.index {
            write!(f, " index= {}", index.path.display())?;
        }
        write!(f, " kind= {} }}", self.kind.as_str())
    }
}
