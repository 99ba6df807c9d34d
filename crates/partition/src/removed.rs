//! Names of partitions excluded from future partition listings.

use fnv::FnvHashSet;
use parking_lot::RwLock;

/// Caller-owned set of pruned partition names.
///
/// Passed by reference into every `make_partitions` call. Removing a partition
/// hides it from results without touching the underlying data.
#[derive(Debug, Default)]
pub struct RemovedSet {
    names: RwLock<FnvHashSet<String>>,
}

impl RemovedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Excludes `name` from subsequent partition listings.
    ///
    /// Returns false if the name was already excluded.
    pub fn remove_partition(&self, name: impl Into<String>) -> bool {
        let name = name.into();
        log::debug!("excluding partition {name}");
        self.names.write().insert(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.read().contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }

    /// Returns the excluded names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.read().iter().cloned().collect();
        names.sort();
        names
    }
}

impl<S: Into<String>> FromIterator<S> for RemovedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: RwLock::new(iter.into_iter().map(Into::into).collect()),
        }
    }
}
