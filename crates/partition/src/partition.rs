//! Partition managers.
//!
//! Each strategy turns one top-level collection into partitions:
//! - `DirectoryPartition` follows the directory tree
//! - `TimePartition` buckets a flat file set by date
//! - `IndexListPartition` treats existing index files as partitions
//! - `FilePartition` treats every file as its own collection

mod directory;
mod file;
mod index_list;
mod manager;
mod time;

use std::sync::Arc;

pub use directory::DirectoryPartition;
pub use file::{FilePartition, SingleFileCollection};
pub use index_list::{IndexListPartition, IndexedCollection};
pub use manager::{MemberCollection, PartitionEntry, PartitionManager};
pub use time::{bucket_files, TimeBucket, TimePartition};

use crate::config::{CollectionConfig, PartitionType};
use crate::error::{PartitionError, Result};
use crate::index_store::IndexStore;

/// Builds the partition manager a collection config asks for.
pub fn open_partition_manager(
    config: &CollectionConfig,
    store: Arc<dyn IndexStore>,
) -> Result<Box<dyn PartitionManager>> {
    let filter = config.file_filter()?;
    let manager: Box<dyn PartitionManager> = match config.partition_type()? {
        PartitionType::None => {
            return Err(PartitionError::Config(format!(
                "collection {} is not partitioned",
                config.name
            )))
        }
        PartitionType::Directory => Box::new(
            DirectoryPartition::new(&config.name, &config.root, store)?.with_filter(filter),
        ),
        PartitionType::File => {
            Box::new(FilePartition::new(&config.name, &config.root)?.with_filter(filter))
        }
        PartitionType::IndexList => Box::new(IndexListPartition::from_directory(
            &config.name,
            &config.root,
            store,
        )?),
        PartitionType::Time(period) => Box::new(
            TimePartition::new(&config.name, &config.root, config.date_extractor(), period)?
                .with_filter(filter),
        ),
    };
    log::info!(
        "opened {} partitioning for {} at {}",
        config.partition,
        config.name,
        config.root.display()
    );
    Ok(manager)
}
