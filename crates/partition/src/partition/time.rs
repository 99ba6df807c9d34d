//! Time partitioning: sequential, period-aligned buckets over a flat file set.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::manager::{retain_visible, MemberCollection, PartitionEntry, PartitionManager};
use crate::date::{CalendarPeriod, DateExtractor};
use crate::directory::DirectoryCollection;
use crate::error::{PartitionError, Result};
use crate::filter::FileFilter;
use crate::naming::index_path_for_name;
use crate::removed::RemovedSet;
use crate::types::{FileRef, UpdateMode};

/// One period-aligned sub-collection.
///
/// Every member's date `d` satisfies `start <= d < end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeBucket {
    name: String,
    root: PathBuf,
    index_path: PathBuf,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    files: Vec<FileRef>,
}

impl TimeBucket {
    fn open(
        collection: &str,
        root: &Path,
        period: &CalendarPeriod,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        let name = format!("{collection}-{}", period.format_start(start));
        Self {
            index_path: index_path_for_name(root, &name),
            name,
            root: root.to_path_buf(),
            start,
            end,
            files: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inclusive.
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Exclusive.
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn members(&self) -> &[FileRef] {
        &self.files
    }
}

impl MemberCollection for TimeBucket {
    fn name(&self) -> &str {
        &self.name
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> &Path {
        &self.index_path
    }

    fn files(&self) -> Result<Vec<FileRef>> {
        Ok(self.files.clone())
    }
}

/// Buckets `files` by extracted date.
///
/// Files whose date cannot be extracted are logged and dropped. The rest are
/// sorted by date, ties by path, and walked once: a file at or past the
/// current bucket's end closes it and opens a new bucket starting at the
/// file's date truncated to the period. Buckets come back in ascending start
/// order, minus any whose name is in `removed`.
pub fn bucket_files(
    collection: &str,
    root: &Path,
    files: Vec<FileRef>,
    extractor: &dyn DateExtractor,
    period: &CalendarPeriod,
    removed: &RemovedSet,
) -> Vec<TimeBucket> {
    let mut dated: Vec<(DateTime<Utc>, FileRef)> = files
        .into_iter()
        .filter_map(|file| match extractor.extract(&file) {
            Some(date) => Some((date, file)),
            None => {
                log::error!(
                    "{collection}: cannot extract date from {}",
                    file.path().display()
                );
                None
            }
        })
        .collect();
    dated.sort_by(|(left_date, left), (right_date, right)| {
        left_date
            .cmp(right_date)
            .then_with(|| left.path().cmp(right.path()))
    });

    let mut buckets: Vec<TimeBucket> = Vec::new();
    for (date, file) in dated {
        let needs_bucket = buckets.last().map_or(true, |current| date >= current.end);
        if needs_bucket {
            let bounds = period
                .truncate(date)
                .and_then(|start| period.add_to(start).map(|end| (start, end)));
            let Some((start, end)) = bounds else {
                log::error!(
                    "{collection}: date {date} out of range for {}",
                    file.path().display()
                );
                continue;
            };
            buckets.push(TimeBucket::open(collection, root, period, start, end));
        }
        if let Some(current) = buckets.last_mut() {
            current.files.push(file);
        }
    }

    retain_visible(&mut buckets, removed, TimeBucket::name);
    buckets
}

/// Time partitioning over the files of one directory.
///
/// Buckets are computed on the first `make_partitions` call and reused until
/// a `ForceRescan` call recomputes them. The removed set is applied on every
/// call.
pub struct TimePartition {
    collection: DirectoryCollection,
    extractor: Arc<dyn DateExtractor>,
    period: CalendarPeriod,
    buckets: Option<Vec<TimeBucket>>,
}

impl fmt::Debug for TimePartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimePartition")
            .field("collection", &self.collection)
            .field("period", &self.period)
            .field("buckets", &self.buckets.as_ref().map(Vec::len))
            .finish()
    }
}

impl TimePartition {
    /// Fails with `MissingDateExtractor` when `extractor` is `None`.
    pub fn new(
        top_collection: &str,
        dir: impl Into<PathBuf>,
        extractor: Option<Arc<dyn DateExtractor>>,
        period: CalendarPeriod,
    ) -> Result<Self> {
        let extractor = extractor
            .ok_or_else(|| PartitionError::MissingDateExtractor(top_collection.to_string()))?;
        Ok(Self {
            collection: DirectoryCollection::new(top_collection, dir)?,
            extractor,
            period,
            buckets: None,
        })
    }

    pub fn with_filter(mut self, filter: FileFilter) -> Self {
        self.collection = self.collection.with_filter(filter);
        self.buckets = None;
        self
    }

    pub fn period(&self) -> &CalendarPeriod {
        &self.period
    }

    fn compute_buckets(&self) -> Result<Vec<TimeBucket>> {
        let mut files = Vec::new();
        self.collection.visit(|file| files.push(file))?;
        let buckets = bucket_files(
            self.collection.top_collection(),
            self.collection.dir(),
            files,
            self.extractor.as_ref(),
            &self.period,
            &RemovedSet::new(),
        );
        log::debug!(
            "{}: {} buckets of {}",
            self.collection.name(),
            buckets.len(),
            self.period
        );
        Ok(buckets)
    }
}

impl PartitionManager for TimePartition {
    fn name(&self) -> &str {
        self.collection.name()
    }

    fn root(&self) -> &Path {
        self.collection.dir()
    }

    fn make_partitions(
        &mut self,
        mode: UpdateMode,
        removed: &RemovedSet,
    ) -> Result<Vec<PartitionEntry>> {
        if mode == UpdateMode::ForceRescan {
            self.buckets = None;
        }
        let buckets = match self.buckets.take() {
            Some(buckets) => buckets,
            None => self.compute_buckets()?,
        };
        let mut visible = buckets.clone();
        self.buckets = Some(buckets);
        retain_visible(&mut visible, removed, TimeBucket::name);
        Ok(visible
            .into_iter()
            .map(|bucket| PartitionEntry::Collection(Box::new(bucket)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs::File;
    use tempfile::TempDir;

    fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
    }

    /// Reads the date from names like `gfs_2021030112.grib2`.
    fn name_date(file: &FileRef) -> Option<DateTime<Utc>> {
        let name = file.name();
        let stamp = name.split('_').nth(1)?.get(..10)?;
        let naive =
            chrono::NaiveDateTime::parse_from_str(&format!("{stamp}00"), "%Y%m%d%H%M").ok()?;
        Some(naive.and_utc())
    }

    fn file(name: &str) -> FileRef {
        FileRef::new(format!("/data/gfs/{name}"), 1, 1)
    }

    fn names(buckets: &[TimeBucket]) -> Vec<&str> {
        buckets.iter().map(TimeBucket::name).collect()
    }

    #[test]
    fn monthly_buckets_split_at_month_boundary() {
        let files = vec![
            file("gfs_2021040200.grib2"),
            file("gfs_2021030100.grib2"),
            file("gfs_2021031500.grib2"),
        ];
        let buckets = bucket_files(
            "gfs",
            Path::new("/data/gfs"),
            files,
            &name_date,
            &CalendarPeriod::month(),
            &RemovedSet::new(),
        );

        assert_eq!(names(&buckets), vec!["gfs-2021-03", "gfs-2021-04"]);
        assert_eq!(buckets[0].start(), at(2021, 3, 1, 0));
        assert_eq!(buckets[0].end(), at(2021, 4, 1, 0));
        assert_eq!(buckets[0].members().len(), 2);
        assert_eq!(buckets[0].members()[0].name(), "gfs_2021030100.grib2");
        assert_eq!(buckets[1].start(), at(2021, 4, 1, 0));
        assert_eq!(buckets[1].end(), at(2021, 5, 1, 0));
        assert_eq!(buckets[1].members()[0].name(), "gfs_2021040200.grib2");
        assert_eq!(buckets[1].index_path(), Path::new("/data/gfs/gfs-2021-04.ncx"));
    }

    #[test]
    fn boundary_date_opens_the_next_bucket() {
        let files = vec![file("gfs_2021033123.grib2"), file("gfs_2021040100.grib2")];
        let buckets = bucket_files(
            "gfs",
            Path::new("/data/gfs"),
            files,
            &name_date,
            &CalendarPeriod::month(),
            &RemovedSet::new(),
        );
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[1].start(), at(2021, 4, 1, 0));
        assert_eq!(buckets[1].members()[0].name(), "gfs_2021040100.grib2");
    }

    #[test]
    fn buckets_cover_every_dated_file_without_overlap() {
        let files: Vec<_> = [
            "gfs_2021010106",
            "gfs_2021010100",
            "gfs_2021010312",
            "gfs_2021010318",
            "gfs_2021011000",
            "gfs_2021011023",
            "gfs_2021020100",
            "gfs_2021010200",
        ]
        .iter()
        .map(|stamp| file(&format!("{stamp}.grib2")))
        .collect();
        let total = files.len();
        let buckets = bucket_files(
            "gfs",
            Path::new("/data/gfs"),
            files,
            &name_date,
            &CalendarPeriod::new(2, crate::date::PeriodUnit::Day).unwrap(),
            &RemovedSet::new(),
        );

        let members: usize = buckets.iter().map(|bucket| bucket.members().len()).sum();
        assert_eq!(members, total);
        for pair in buckets.windows(2) {
            assert!(pair[0].end() <= pair[1].start());
        }
        for bucket in &buckets {
            for member in bucket.members() {
                let date = name_date(member).unwrap();
                assert!(bucket.start() <= date && date < bucket.end());
            }
        }
    }

    #[test]
    fn equal_dates_are_ordered_by_path() {
        let files = vec![
            FileRef::new("/data/gfs/b/gfs_2021030100.grib2", 1, 1),
            FileRef::new("/data/gfs/a/gfs_2021030100.grib2", 1, 1),
        ];
        let buckets = bucket_files(
            "gfs",
            Path::new("/data/gfs"),
            files,
            &name_date,
            &CalendarPeriod::day(),
            &RemovedSet::new(),
        );
        let paths: Vec<_> = buckets[0].members().iter().map(FileRef::path).collect();
        assert_eq!(
            paths,
            vec![
                Path::new("/data/gfs/a/gfs_2021030100.grib2"),
                Path::new("/data/gfs/b/gfs_2021030100.grib2"),
            ]
        );
    }

    #[test]
    fn undatable_files_are_dropped() {
        let files = vec![file("gfs_2021030100.grib2"), file("readme.txt")];
        let buckets = bucket_files(
            "gfs",
            Path::new("/data/gfs"),
            files,
            &name_date,
            &CalendarPeriod::day(),
            &RemovedSet::new(),
        );
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].members().len(), 1);
    }

    #[test]
    fn removed_bucket_is_omitted() {
        let files = vec![file("gfs_2021030100.grib2"), file("gfs_2021040100.grib2")];
        let removed = RemovedSet::new();
        removed.remove_partition("gfs-2021-03");
        let buckets = bucket_files(
            "gfs",
            Path::new("/data/gfs"),
            files,
            &name_date,
            &CalendarPeriod::month(),
            &removed,
        );
        assert_eq!(names(&buckets), vec!["gfs-2021-04"]);
    }

    #[test]
    fn missing_extractor_fails_at_construction() {
        let temp = TempDir::new().unwrap();
        let result = TimePartition::new("gfs", temp.path(), None, CalendarPeriod::day());
        assert!(matches!(result, Err(PartitionError::MissingDateExtractor(_))));
    }

    #[test]
    fn partition_buckets_directory_files() {
        let temp = TempDir::new().unwrap();
        for name in ["gfs_2021030100.grib2", "gfs_2021030112.grib2", "gfs_2021030200.grib2"] {
            File::create(temp.path().join(name)).unwrap();
        }
        let extractor: Arc<dyn DateExtractor> = Arc::new(name_date);
        let mut partition =
            TimePartition::new("gfs", temp.path(), Some(extractor), CalendarPeriod::day()).unwrap();

        let removed = RemovedSet::new();
        let entries = partition
            .make_partitions(UpdateMode::TrustCache, &removed)
            .unwrap();
        let names: Vec<_> = entries.iter().map(PartitionEntry::name).collect();
        assert_eq!(names, vec!["gfs-2021-03-01", "gfs-2021-03-02"]);
        assert_eq!(entries[0].as_collection().unwrap().files().unwrap().len(), 2);

        // removal applies to cached buckets too
        removed.remove_partition("gfs-2021-03-01");
        let entries = partition
            .make_partitions(UpdateMode::TrustCache, &removed)
            .unwrap();
        let names: Vec<_> = entries.iter().map(PartitionEntry::name).collect();
        assert_eq!(names, vec!["gfs-2021-03-02"]);
    }

    #[test]
    fn force_rescan_picks_up_new_files() {
        let temp = TempDir::new().unwrap();
        File::create(temp.path().join("gfs_2021030100.grib2")).unwrap();
        let extractor: Arc<dyn DateExtractor> = Arc::new(name_date);
        let mut partition =
            TimePartition::new("gfs", temp.path(), Some(extractor), CalendarPeriod::day()).unwrap();
        let removed = RemovedSet::new();
        assert_eq!(
            partition
                .make_partitions(UpdateMode::TrustCache, &removed)
                .unwrap()
                .len(),
            1
        );

        File::create(temp.path().join("gfs_2021030500.grib2")).unwrap();
        assert_eq!(
            partition
                .make_partitions(UpdateMode::TrustCache, &removed)
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            partition
                .make_partitions(UpdateMode::ForceRescan, &removed)
                .unwrap()
                .len(),
            2
        );
    }
}
