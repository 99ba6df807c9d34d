//! Access to persisted collection indexes.
//!
//! The partition tree never parses index bytes itself. It asks an
//! `IndexStore` three questions about an index file: which child partitions
//! it lists, which member files it lists, and which of the two kinds it is.
//!
//! `SnapshotIndexStore` is the bundled implementation; anything that honors
//! the canonical index path from `naming` can stand in for it.

mod snapshot;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::FileRef;

pub use snapshot::{
    load_collection_index, write_collection_index, CollectionIndex, IndexEntry, IndexKind,
    SnapshotIndexStore, INDEX_FORMAT_VERSION,
};

/// One child partition listed by a partition index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    /// Directory the parent index was written for.
    pub parent_dir: PathBuf,
    /// Path of the child's own index file.
    pub index_path: PathBuf,
    /// Last-modified time of the child index when the parent was written (ms).
    pub last_modified: u64,
}

pub trait IndexStore: fmt::Debug + Send + Sync {
    /// Emits one `ChildEntry` per child partition listed in `index_path`.
    ///
    /// Returns false, emitting nothing, if the index is a leaf collection index.
    fn read_children(
        &self,
        index_path: &Path,
        add_child: &mut dyn FnMut(ChildEntry),
    ) -> Result<bool>;

    /// Returns true if `index_path` is a partition index rather than a leaf index.
    fn is_partition(&self, index_path: &Path) -> Result<bool>;

    /// Returns the member files listed in a leaf index.
    ///
    /// A partition index has no member files and yields an empty list.
    fn read_member_files(&self, index_path: &Path) -> Result<Vec<FileRef>>;
}
