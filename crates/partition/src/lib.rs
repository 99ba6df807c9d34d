//! Partition and collection indexing for large archives of dated files.
//!
//! This crate organizes an archive into a tree of partitions:
//! - Directory trees whose nodes are classified as leaf or branch
//! - Cached indexes at canonical paths, trusted or rechecked per update mode
//! - Period-aligned time buckets over flat file sets
//! - Index-list and file-per-partition strategies behind one trait

pub mod config;
pub mod date;
pub mod directory;
pub mod error;
pub mod filter;
pub mod index_store;
pub mod indexer;
pub mod naming;
pub mod partition;
pub mod removed;
pub mod types;

// Re-export main types
pub use config::{load_collection_config, CollectionConfig, PartitionType};
pub use date::{CalendarPeriod, DateExtractor, LastModifiedDate};
pub use directory::{DirectoryCollection, DirectoryNode, NodeSource};
pub use error::{PartitionError, Result};
pub use filter::FileFilter;
pub use index_store::{IndexStore, SnapshotIndexStore};
pub use indexer::{update_directory_indexes, IndexUpdateSummary};
pub use naming::{make_collection_index_path, make_collection_name, INDEX_SUFFIX};
pub use partition::{
    open_partition_manager, MemberCollection, PartitionEntry, PartitionManager, TimeBucket,
};
pub use removed::RemovedSet;
pub use types::{FileRef, NodeKind, UpdateMode};
