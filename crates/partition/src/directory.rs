//! Directory-backed partition tree.

mod collection;
mod node;

pub use collection::{DirectoryCollection, DirectoryFiles, LEAF_PROBE_LIMIT};
pub use node::{DirectoryNode, IndexInfo, NodeSource};
