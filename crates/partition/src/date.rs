//! Calendar dates for time partitioning.
//!
//! Two pieces live here:
//! - `DateExtractor`, the collaborator that assigns a date to a file
//! - `CalendarPeriod`, the fixed period that bucket boundaries align to

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Months, NaiveTime, TimeDelta, TimeZone, Timelike, Utc};

use crate::error::{PartitionError, Result};
use crate::types::FileRef;

/// Maps a file to the date it represents.
///
/// Returning `None` means the date could not be determined; callers log the
/// file and leave it out of any time bucket.
pub trait DateExtractor: Send + Sync {
    fn extract(&self, file: &FileRef) -> Option<DateTime<Utc>>;
}

impl<F> DateExtractor for F
where
    F: Fn(&FileRef) -> Option<DateTime<Utc>> + Send + Sync,
{
    fn extract(&self, file: &FileRef) -> Option<DateTime<Utc>> {
        self(file)
    }
}

/// Uses the file's last-modified time as its date.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastModifiedDate;

impl DateExtractor for LastModifiedDate {
    fn extract(&self, file: &FileRef) -> Option<DateTime<Utc>> {
        if file.last_modified() == 0 {
            return None;
        }
        DateTime::from_timestamp_millis(i64::try_from(file.last_modified()).ok()?)
    }
}

/// Calendar unit of a `CalendarPeriod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PeriodUnit {
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

impl PeriodUnit {
    fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "s" | "sec" | "secs" | "second" | "seconds" => Self::Second,
            "min" | "mins" | "minute" | "minutes" => Self::Minute,
            "h" | "hr" | "hrs" | "hour" | "hours" => Self::Hour,
            "d" | "day" | "days" => Self::Day,
            "mon" | "month" | "months" => Self::Month,
            "y" | "yr" | "year" | "years" => Self::Year,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// `strftime` pattern used to name a bucket starting at a boundary of this unit.
    fn name_format(self) -> &'static str {
        match self {
            Self::Second => "%Y-%m-%dT%H%M%S",
            Self::Minute => "%Y-%m-%dT%H%M",
            Self::Hour => "%Y-%m-%dT%H",
            Self::Day => "%Y-%m-%d",
            Self::Month => "%Y-%m",
            Self::Year => "%Y",
        }
    }
}

/// A fixed calendar period such as one day or three months.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarPeriod {
    value: u32,
    unit: PeriodUnit,
}

impl CalendarPeriod {
    pub fn new(value: u32, unit: PeriodUnit) -> Result<Self> {
        if value == 0 {
            return Err(PartitionError::InvalidInput(
                "calendar period must be at least 1".to_string(),
            ));
        }
        Ok(Self { value, unit })
    }

    pub fn day() -> Self {
        Self {
            value: 1,
            unit: PeriodUnit::Day,
        }
    }

    pub fn month() -> Self {
        Self {
            value: 1,
            unit: PeriodUnit::Month,
        }
    }

    pub fn year() -> Self {
        Self {
            value: 1,
            unit: PeriodUnit::Year,
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn unit(&self) -> PeriodUnit {
        self.unit
    }

    /// Truncates `date` down to the start of its enclosing unit.
    ///
    /// Truncation is to the unit only, never to a multiple of `value`: with a
    /// period of "2 days" a date is truncated to midnight of its own day.
    pub fn truncate(&self, date: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let day = date.date_naive();
        let naive = match self.unit {
            PeriodUnit::Second => date.naive_utc().with_nanosecond(0)?,
            PeriodUnit::Minute => day.and_hms_opt(date.hour(), date.minute(), 0)?,
            PeriodUnit::Hour => day.and_hms_opt(date.hour(), 0, 0)?,
            PeriodUnit::Day => day.and_time(NaiveTime::MIN),
            PeriodUnit::Month => day.with_day(1)?.and_time(NaiveTime::MIN),
            PeriodUnit::Year => day.with_day(1)?.with_month(1)?.and_time(NaiveTime::MIN),
        };
        Some(Utc.from_utc_datetime(&naive))
    }

    /// Adds one period to `date`.
    pub fn add_to(&self, date: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let value = i64::from(self.value);
        match self.unit {
            PeriodUnit::Second => date.checked_add_signed(TimeDelta::try_seconds(value)?),
            PeriodUnit::Minute => date.checked_add_signed(TimeDelta::try_minutes(value)?),
            PeriodUnit::Hour => date.checked_add_signed(TimeDelta::try_hours(value)?),
            PeriodUnit::Day => date.checked_add_signed(TimeDelta::try_days(value)?),
            PeriodUnit::Month => date.checked_add_months(Months::new(self.value)),
            PeriodUnit::Year => date.checked_add_months(Months::new(self.value.checked_mul(12)?)),
        }
    }

    /// Formats a bucket start for use in a bucket name.
    pub fn format_start(&self, start: DateTime<Utc>) -> String {
        start.format(self.unit.name_format()).to_string()
    }
}

impl fmt::Display for CalendarPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value == 1 {
            write!(f, "1 {}", self.unit.as_str())
        } else {
            write!(f, "{} {}s", self.value, self.unit.as_str())
        }
    }
}

impl FromStr for CalendarPeriod {
    type Err = PartitionError;

    /// Parses `"<n> <unit>"` or a bare unit such as `"month"`.
    fn from_str(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        let mut parts = normalized.split_whitespace();
        let invalid = || PartitionError::InvalidInput(format!("invalid calendar period: {raw}"));

        let first = parts.next().ok_or_else(invalid)?;
        let (value, unit_raw) = match first.parse::<u32>() {
            Ok(value) => (value, parts.next().ok_or_else(invalid)?),
            Err(_) => (1, first),
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        let unit = PeriodUnit::parse(unit_raw).ok_or_else(invalid)?;
        Self::new(value, unit)
    }
}
