//! Partitioning that follows the directory tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::index_list::IndexedCollection;
use super::manager::{retain_visible, MemberCollection, PartitionEntry, PartitionManager};
use crate::directory::{DirectoryCollection, DirectoryNode};
use crate::error::Result;
use crate::filter::FileFilter;
use crate::index_store::IndexStore;
use crate::removed::RemovedSet;
use crate::types::{FileRef, NodeKind, UpdateMode};

/// A directory whose subdirectories are its partitions.
///
/// Branch children come back as nested `DirectoryPartition`s, so a caller
/// walks the tree one level per `make_partitions` call. Leaf children come
/// back as collections read from their index or from the directory itself,
/// depending on the update mode. A `ForceRescan` call rebuilds the node, so
/// children found on earlier calls are read again.
#[derive(Debug)]
pub struct DirectoryPartition {
    name: String,
    node: DirectoryNode,
    store: Arc<dyn IndexStore>,
    filter: FileFilter,
}

impl DirectoryPartition {
    pub fn new(
        top_collection: &str,
        dir: impl Into<PathBuf>,
        store: Arc<dyn IndexStore>,
    ) -> Result<Self> {
        let node = DirectoryNode::from_directory(top_collection, dir)?;
        Ok(Self::from_node(node, store))
    }

    pub fn from_node(node: DirectoryNode, store: Arc<dyn IndexStore>) -> Self {
        Self {
            name: node.collection_name().to_string(),
            node,
            store,
            filter: FileFilter::default(),
        }
    }

    /// Filter applied to leaf collections that are scanned rather than read
    /// from an index. Nested partitions inherit it.
    pub fn with_filter(mut self, filter: FileFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn node(&self) -> &DirectoryNode {
        &self.node
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        self.node.dir()
    }

    /// Wraps a leaf node as a collection.
    ///
    /// `TrustCache` uses any bound index, `Verify` only an index that is not
    /// older than the directory, and `ForceRescan` always scans.
    fn leaf_collection(
        &self,
        node: &DirectoryNode,
        mode: UpdateMode,
    ) -> Result<Box<dyn MemberCollection>> {
        let trusted_index = match (node.index(), mode) {
            (Some(index), UpdateMode::TrustCache) => Some(index),
            (Some(index), UpdateMode::Verify) if node.is_index_current() => Some(index),
            _ => None,
        };
        if let Some(index) = trusted_index {
            return Ok(Box::new(IndexedCollection::new(
                node.collection_name().to_string(),
                index.path.clone(),
                Arc::clone(&self.store),
            )));
        }
        if node.index().is_some() {
            log::debug!(
                "{}: index not used in {mode} mode, scanning",
                node.collection_name()
            );
        }
        let collection = DirectoryCollection::new(node.top_collection(), node.dir())?
            .with_filter(self.filter.clone());
        Ok(Box::new(collection))
    }
}

impl PartitionManager for DirectoryPartition {
    fn name(&self) -> &str {
        &self.name
    }

    fn root(&self) -> &Path {
        self.node.dir()
    }

    fn make_partitions(
        &mut self,
        mode: UpdateMode,
        removed: &RemovedSet,
    ) -> Result<Vec<PartitionEntry>> {
        if mode == UpdateMode::ForceRescan {
            let top_collection = self.node.top_collection().to_string();
            self.node = DirectoryNode::from_directory(&top_collection, self.node.dir())?;
        }
        let store = Arc::clone(&self.store);
        let mut children = self.node.construct_children(store.as_ref(), mode)?.to_vec();
        if self.node.is_partial() {
            log::warn!("{}: directory scan was incomplete", self.name);
        }
        retain_visible(&mut children, removed, DirectoryNode::collection_name);

        let mut entries = Vec::with_capacity(children.len());
        for mut child in children {
            let kind = match child.classify_in_mode(store.as_ref(), mode) {
                Ok(kind) => kind,
                Err(error) => {
                    log::warn!(
                        "{}: cannot classify {}: {error}",
                        self.name,
                        child.dir().display()
                    );
                    continue;
                }
            };
            let entry = match kind {
                NodeKind::Branch => PartitionEntry::Partition(
                    DirectoryPartition::from_node(child, Arc::clone(&store))
                        .with_filter(self.filter.clone()),
                ),
                NodeKind::Leaf | NodeKind::Unknown => {
                    PartitionEntry::Collection(self.leaf_collection(&child, mode)?)
                }
            };
            entries.push(entry);
        }
        Ok(entries)
    }
}

impl MemberCollection for DirectoryCollection {
    fn name(&self) -> &str {
        DirectoryCollection::name(self)
    }

    fn root(&self) -> &Path {
        self.dir()
    }

    fn index_path(&self) -> &Path {
        DirectoryCollection::index_path(self)
    }

    fn files(&self) -> Result<Vec<FileRef>> {
        self.files_sorted()
    }
}
