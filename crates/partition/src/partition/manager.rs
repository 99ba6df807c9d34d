//! The partition strategy trait and the entries it yields.

use std::fmt;
use std::path::Path;

use super::DirectoryPartition;
use crate::error::Result;
use crate::removed::RemovedSet;
use crate::types::{FileRef, UpdateMode};

/// A terminal collection of member files.
pub trait MemberCollection: fmt::Debug + Send {
    fn name(&self) -> &str;

    /// Directory the collection lives in.
    fn root(&self) -> &Path;

    /// Where the collection's index is, or would be written.
    fn index_path(&self) -> &Path;

    /// Returns the member files in collection order.
    fn files(&self) -> Result<Vec<FileRef>>;
}

/// One partitioning strategy over a top-level collection.
///
/// Implementations are independent of each other; they only agree on this
/// contract. Every implementation omits entries whose name is in `removed`.
pub trait PartitionManager: fmt::Debug + Send {
    fn name(&self) -> &str;

    fn root(&self) -> &Path;

    /// Returns the immediate children of this partition.
    fn make_partitions(
        &mut self,
        mode: UpdateMode,
        removed: &RemovedSet,
    ) -> Result<Vec<PartitionEntry>>;
}

/// A child of a partition: either a nested partition or a collection.
#[derive(Debug)]
pub enum PartitionEntry {
    Partition(DirectoryPartition),
    Collection(Box<dyn MemberCollection>),
}

impl PartitionEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::Partition(partition) => partition.name(),
            Self::Collection(collection) => collection.name(),
        }
    }

    pub fn root(&self) -> &Path {
        match self {
            Self::Partition(partition) => partition.root(),
            Self::Collection(collection) => collection.root(),
        }
    }

    pub fn is_partition(&self) -> bool {
        matches!(self, Self::Partition(_))
    }

    pub fn as_collection(&self) -> Option<&dyn MemberCollection> {
        match self {
            Self::Partition(_) => None,
            Self::Collection(collection) => Some(collection.as_ref()),
        }
    }

    pub fn into_partition(self) -> Option<DirectoryPartition> {
        match self {
            Self::Partition(partition) => Some(partition),
            Self::Collection(_) => None,
        }
    }
}

/// Drops entries whose name is in `removed`, logging each one.
pub(crate) fn retain_visible<T>(
    entries: &mut Vec<T>,
    removed: &RemovedSet,
    name: impl Fn(&T) -> &str,
) {
    if removed.is_empty() {
        return;
    }
    entries.retain(|entry| {
        let hidden = removed.contains(name(entry));
        if hidden {
            log::debug!("omitting removed partition {}", name(entry));
        }
        !hidden
    });
}
