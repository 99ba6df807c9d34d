//! JSON description of one top-level collection.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::date::{CalendarPeriod, DateExtractor, LastModifiedDate};
use crate::error::{PartitionError, Result};
use crate::filter::FileFilter;
use crate::removed::RemovedSet;
use crate::types::UpdateMode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Top collection name; prefixes every partition and index name.
    pub name: String,
    pub root: PathBuf,
    /// `none`, `directory`, `file`, `index-list` or a period such as `1 day`.
    #[serde(default = "default_partition")]
    pub partition: String,
    /// Grace period for files still being written, e.g. `5 min`.
    #[serde(default)]
    pub older_than: Option<String>,
    /// Glob on member file names, e.g. `*.grib2`.
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub date_source: Option<DateSource>,
    #[serde(default)]
    pub update_mode: UpdateMode,
    /// Partitions hidden from results.
    #[serde(default)]
    pub removed: Vec<String>,
}

fn default_partition() -> String {
    "directory".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    LastModified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionType {
    None,
    Directory,
    File,
    IndexList,
    Time(CalendarPeriod),
}

impl fmt::Display for PartitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Directory => f.write_str("directory"),
            Self::File => f.write_str("file"),
            Self::IndexList => f.write_str("index-list"),
            Self::Time(period) => write!(f, "{period}"),
        }
    }
}

impl FromStr for PartitionType {
    type Err = PartitionError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "directory" => Ok(Self::Directory),
            "file" => Ok(Self::File),
            "index-list" | "index_list" => Ok(Self::IndexList),
            other => other.parse::<CalendarPeriod>().map(Self::Time).map_err(|_| {
                PartitionError::Config(format!("unknown partition type: {raw}"))
            }),
        }
    }
}

impl CollectionConfig {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            partition: default_partition(),
            older_than: None,
            filter: None,
            date_source: None,
            update_mode: UpdateMode::default(),
            removed: Vec::new(),
        }
    }

    pub fn partition_type(&self) -> Result<PartitionType> {
        self.partition.parse()
    }

    pub fn older_than(&self) -> Result<Option<Duration>> {
        self.older_than.as_deref().map(parse_duration).transpose()
    }

    pub fn file_filter(&self) -> Result<FileFilter> {
        let mut filter = FileFilter::new();
        if let Some(wildcard) = &self.filter {
            filter = filter.with_wildcard(wildcard)?;
        }
        if let Some(older_than) = self.older_than()? {
            filter = filter.with_older_than(older_than);
        }
        Ok(filter)
    }

    pub fn date_extractor(&self) -> Option<Arc<dyn DateExtractor>> {
        match self.date_source? {
            DateSource::LastModified => Some(Arc::new(LastModifiedDate)),
        }
    }

    pub fn removed_set(&self) -> RemovedSet {
        self.removed.iter().cloned().collect()
    }

    /// Checks every field that can be checked without touching the disk.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PartitionError::Config("collection name is empty".to_string()));
        }
        let partition = self.partition_type()?;
        self.file_filter()?;
        if matches!(partition, PartitionType::Time(_)) && self.date_source.is_none() {
            return Err(PartitionError::MissingDateExtractor(self.name.clone()));
        }
        Ok(())
    }
}

/// Parses durations such as `30 sec`, `5 min`, `2 hours` or `1 day`.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let invalid = || PartitionError::Config(format!("invalid duration: {raw}"));
    let normalized = raw.trim().to_ascii_lowercase();
    let split = normalized
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(normalized.len());
    let (amount, unit) = normalized.split_at(split);
    let amount: u64 = amount.parse().map_err(|_| invalid())?;
    let seconds = match unit.trim() {
        "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hour" | "hours" => 3_600,
        "d" | "day" | "days" => 86_400,
        _ => return Err(invalid()),
    };
    amount
        .checked_mul(seconds)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

pub fn load_collection_config(path: &Path) -> Result<CollectionConfig> {
    let data = std::fs::read_to_string(path).map_err(|error| {
        PartitionError::Config(format!(
            "failed to read collection config {}: {error}",
            path.display()
        ))
    })?;
    let config: CollectionConfig = serde_json::from_str(&data).map_err(|error| {
        PartitionError::Config(format!(
            "failed to parse collection config {}: {error}",
            path.display()
        ))
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::PeriodUnit;
    use tempfile::TempDir;

    #[test]
    fn minimal_config_defaults_to_directory() {
        let config: CollectionConfig =
            serde_json::from_str(r#"{ "name": "gfs", "root": "/data/gfs" }"#).unwrap();
        assert_eq!(config.partition_type().unwrap(), PartitionType::Directory);
        assert_eq!(config.update_mode, UpdateMode::TrustCache);
        assert!(config.date_extractor().is_none());
        assert!(config.older_than().unwrap().is_none());
    }

    #[test]
    fn partition_types_parse() {
        assert_eq!("none".parse::<PartitionType>().unwrap(), PartitionType::None);
        assert_eq!("File".parse::<PartitionType>().unwrap(), PartitionType::File);
        assert_eq!(
            "index-list".parse::<PartitionType>().unwrap(),
            PartitionType::IndexList
        );
        assert_eq!(
            "1 month".parse::<PartitionType>().unwrap(),
            PartitionType::Time(CalendarPeriod::month())
        );
        assert_eq!(
            "6 hours".parse::<PartitionType>().unwrap(),
            PartitionType::Time(CalendarPeriod::new(6, PeriodUnit::Hour).unwrap())
        );
        assert!(matches!(
            "sideways".parse::<PartitionType>(),
            Err(PartitionError::Config(_))
        ));
    }

    #[test]
    fn durations_parse() {
        assert_eq!(parse_duration("30 sec").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5min").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2 hours").unwrap(), Duration::from_secs(7_200));
        assert_eq!(parse_duration("1 day").unwrap(), Duration::from_secs(86_400));
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("5 fortnights").is_err());
    }

    #[test]
    fn time_partition_requires_date_source() {
        let mut config = CollectionConfig::new("gfs", "/data/gfs");
        config.partition = "1 day".to_string();
        assert!(matches!(
            config.validate(),
            Err(PartitionError::MissingDateExtractor(_))
        ));
        config.date_source = Some(DateSource::LastModified);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_reads_json_and_validates() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("gfs.json");
        std::fs::write(
            &path,
            r#"{
                "name": "gfs",
                "root": "/data/gfs",
                "partition": "1 day",
                "older_than": "5 min",
                "filter": "*.grib2",
                "date_source": "last_modified",
                "update_mode": "test",
                "removed": ["gfs-2021-03-01"]
            }"#,
        )
        .unwrap();

        let config = load_collection_config(&path).unwrap();
        assert_eq!(config.older_than().unwrap(), Some(Duration::from_secs(300)));
        assert_eq!(config.update_mode, UpdateMode::Verify);
        assert!(config.removed_set().contains("gfs-2021-03-01"));
        assert!(config.date_extractor().is_some());

        std::fs::write(&path, r#"{ "name": "gfs" }"#).unwrap();
        assert!(matches!(
            load_collection_config(&path),
            Err(PartitionError::Config(_))
        ));
    }
}
