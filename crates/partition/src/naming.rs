//! Canonical collection names and index file locations.
//!
//! A directory finds its own cached index without any registry: the index
//! always lives at `<dir>/<top>-<last dir segment><INDEX_SUFFIX>`. Every
//! reader and writer of index files goes through these functions.

use std::path::{Path, PathBuf};

/// File name suffix of collection and partition index files.
pub const INDEX_SUFFIX: &str = ".ncx";

/// Returns the canonical name of the collection rooted at `dir`.
pub fn make_collection_name(top_collection: &str, dir: &Path) -> String {
    format!("{top_collection}-{}", last_segment(dir))
}

/// Returns the path where the index for `dir` is expected.
pub fn make_collection_index_path(top_collection: &str, dir: &Path) -> PathBuf {
    index_path_for_name(dir, &make_collection_name(top_collection, dir))
}

/// Returns `<dir>/<name><INDEX_SUFFIX>`.
pub fn index_path_for_name(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}{INDEX_SUFFIX}"))
}

/// Recovers the collection name from an index file path.
pub fn collection_name_from_index_path(index_path: &Path) -> Option<String> {
    let file_name = index_path.file_name()?.to_string_lossy();
    file_name
        .strip_suffix(INDEX_SUFFIX)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Returns true if the path names an index file.
pub fn is_index_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().ends_with(INDEX_SUFFIX))
        .unwrap_or(false)
}

fn last_segment(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        // "/" or a path ending in ".."
        None => path.to_string_lossy().trim_matches('/').to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_name_uses_last_segment() {
        let name = make_collection_name("top", Path::new("/data/col"));
        assert_eq!(name, "top-col");
    }

    #[test]
    fn collection_name_is_stable() {
        let dir = Path::new("/archive/gfs/2021/03");
        let first = make_collection_name("gfs", dir);
        let second = make_collection_name("gfs", dir);
        assert_eq!(first, second);
        assert_eq!(first, "gfs-03");
    }

    #[test]
    fn index_path_lives_in_directory() {
        let path = make_collection_index_path("top", Path::new("/data/col"));
        assert_eq!(path, PathBuf::from("/data/col/top-col.ncx"));
    }

    #[test]
    fn trailing_separator_does_not_change_identity() {
        let plain = make_collection_index_path("top", Path::new("/data/col"));
        let trailing = make_collection_index_path("top", Path::new("/data/col/"));
        assert_eq!(plain, trailing);
    }

    #[test]
    fn name_from_index_path_strips_suffix() {
        let name = collection_name_from_index_path(Path::new("/data/col/top-col.ncx"));
        assert_eq!(name.as_deref(), Some("top-col"));
        assert_eq!(
            collection_name_from_index_path(Path::new("/data/col/readme.txt")),
            None
        );
        assert_eq!(collection_name_from_index_path(Path::new("/data/.ncx")), None);
    }

    #[test]
    fn detects_index_files() {
        assert!(is_index_file(Path::new("/a/top-a.ncx")));
        assert!(!is_index_file(Path::new("/a/file.grib2")));
    }
}
