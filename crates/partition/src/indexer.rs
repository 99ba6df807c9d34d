//! Writes leaf and partition indexes at their canonical paths.
//!
//! This is the job that fills the cache the partition tree reads. A leaf
//! directory gets a collection index listing its member files; a branch gets
//! a partition index listing its children's index files, so each index can be
//! rebuilt from the level below it.

use std::path::{Path, PathBuf};

use crate::directory::{DirectoryCollection, DirectoryNode};
use crate::error::Result;
use crate::filter::FileFilter;
use crate::index_store::{write_collection_index, CollectionIndex, IndexStore};
use crate::types::{FileRef, UpdateMode};

/// Counts from one `update_directory_indexes` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexUpdateSummary {
    pub written: usize,
    pub kept: usize,
    /// Directories whose scan hit I/O errors.
    pub partial: usize,
}

/// Writes the collection index for one leaf directory. Returns its path.
pub fn write_leaf_index(collection: &DirectoryCollection) -> Result<PathBuf> {
    let files = collection.files_sorted()?;
    let index = CollectionIndex::collection(collection.dir(), &files);
    write_collection_index(collection.index_path(), &index)?;
    log::debug!("{}: indexed {} files", collection.name(), files.len());
    Ok(collection.index_path().to_path_buf())
}

/// Writes the partition index for `node`, listing `child_indexes`.
pub fn write_partition_index(node: &DirectoryNode, child_indexes: &[FileRef]) -> Result<PathBuf> {
    let index_path = node.index_path();
    let index = CollectionIndex::partition(node.dir(), child_indexes);
    write_collection_index(&index_path, &index)?;
    log::debug!(
        "{}: indexed {} partitions",
        node.collection_name(),
        child_indexes.len()
    );
    Ok(index_path)
}

/// Brings every index under `root` up to date.
///
/// `TrustCache` keeps any existing index and does not descend below it.
/// `Verify` walks the whole tree and rewrites an index when it is older than
/// its directory or when any index below it was rewritten. `ForceRescan`
/// rewrites everything.
pub fn update_directory_indexes(
    top_collection: &str,
    root: &Path,
    filter: &FileFilter,
    store: &dyn IndexStore,
    mode: UpdateMode,
) -> Result<IndexUpdateSummary> {
    let mut node = DirectoryNode::from_directory(top_collection, root)?;
    let mut summary = IndexUpdateSummary::default();
    update_node(&mut node, filter, store, mode, &mut summary)?;
    log::info!(
        "{top_collection}: {} indexes written, {} kept, {} partial",
        summary.written,
        summary.kept,
        summary.partial
    );
    Ok(summary)
}

/// Returns the node's index file and whether it was (re)written.
fn update_node(
    node: &mut DirectoryNode,
    filter: &FileFilter,
    store: &dyn IndexStore,
    mode: UpdateMode,
    summary: &mut IndexUpdateSummary,
) -> Result<(FileRef, bool)> {
    if mode == UpdateMode::TrustCache {
        if let Some(index) = node.index() {
            summary.kept += 1;
            return Ok((index.to_file_ref(), false));
        }
    }

    let mut children = node
        .construct_children(store, UpdateMode::ForceRescan)?
        .to_vec();
    if node.is_partial() {
        log::warn!("{}: indexing an incomplete scan", node.collection_name());
        summary.partial += 1;
    }

    let mut child_indexes = Vec::with_capacity(children.len());
    let mut child_written = false;
    for child in &mut children {
        let (index, written) = update_node(child, filter, store, mode, summary)?;
        child_indexes.push(index);
        child_written |= written;
    }

    if mode == UpdateMode::Verify && !child_written && node.is_index_current() {
        if let Some(index) = node.index() {
            summary.kept += 1;
            return Ok((index.to_file_ref(), false));
        }
    }

    let index_path = if children.is_empty() {
        let collection = DirectoryCollection::new(node.top_collection(), node.dir())?
            .with_filter(filter.clone());
        write_leaf_index(&collection)?
    } else {
        write_partition_index(node, &child_indexes)?
    };
    summary.written += 1;
    Ok((FileRef::from_path(index_path)?, true))
}
