//! Calendar handling for ledger queries
//!
//! Ledger entries are stamped in UTC, but users ask for statements by
//! business calendar day. This module provides:
//! - `Timezone`: the business timezone used to turn calendar days into instants
//! - `DateRange`: an inclusive, optionally open-ended range of calendar days

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use thiserror::Error;

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidRange {
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Local time {0} does not exist in the business timezone")]
    NonexistentLocalTime(String),
}

/// Business timezone wrapper
///
/// Wraps chrono_tz::Tz with string serialization so it can be read from
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for Timezone {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tz::from_str(s.trim())
            .map(Timezone)
            .map_err(|_| TemporalError::UnknownTimezone(s.to_string()))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Returns the IANA name
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// Returns the business calendar day a UTC instant falls on
    pub fn local_date(&self, utc: DateTime<Utc>) -> NaiveDate {
        utc.with_timezone(&self.0).date_naive()
    }

    /// Gets the first instant of a calendar day in this timezone, as UTC
    ///
    /// # Errors
    ///
    /// Returns `TemporalError::NonexistentLocalTime` if midnight is skipped
    /// by a DST transition and no later instant of the day can be found
    pub fn start_of_day(&self, date: NaiveDate) -> Result<DateTime<Utc>, TemporalError> {
        self.resolve(date.and_time(chrono::NaiveTime::MIN))
    }

    /// Gets the first instant of the following calendar day, as UTC
    ///
    /// Used as an exclusive upper bound so the whole of `date` is included.
    pub fn start_of_next_day(&self, date: NaiveDate) -> Result<DateTime<Utc>, TemporalError> {
        let next = date
            .succ_opt()
            .ok_or_else(|| TemporalError::NonexistentLocalTime(date.to_string()))?;
        self.start_of_day(next)
    }

    fn resolve(&self, local: NaiveDateTime) -> Result<DateTime<Utc>, TemporalError> {
        match local.and_local_timezone(self.0) {
            LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
            // Midnight skipped by DST: the day starts one hour later.
            LocalResult::None => match (local + chrono::Duration::hours(1)).and_local_timezone(self.0) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Ok(dt.with_timezone(&Utc)),
                LocalResult::None => Err(TemporalError::NonexistentLocalTime(local.to_string())),
            },
        }
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::Asia::Kolkata)
    }
}

/// An inclusive range of business calendar days
///
/// Either bound may be open. `start` and `end` are both included, so a
/// range of a single day covers that whole day in the business timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    /// First day included, None means from the beginning of the ledger
    pub start: Option<NaiveDate>,
    /// Last day included, None means up to now
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Creates a range, rejecting a start after the end
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self, TemporalError> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(TemporalError::InvalidRange { start, end });
            }
        }
        Ok(Self { start, end })
    }

    /// The unbounded range
    pub fn all() -> Self {
        Self::default()
    }

    /// A closed range of days
    pub fn between(start: NaiveDate, end: NaiveDate) -> Result<Self, TemporalError> {
        Self::new(Some(start), Some(end))
    }

    /// Everything from `start` onwards
    pub fn starting(start: NaiveDate) -> Self {
        Self { start: Some(start), end: None }
    }

    /// Everything up to and including `end`
    pub fn until(end: NaiveDate) -> Self {
        Self { start: None, end: Some(end) }
    }

    /// Resolves the range into UTC bounds `[lower, upper)` for the given timezone
    pub fn to_utc_bounds(&self, tz: &Timezone) -> Result<UtcBounds, TemporalError> {
        let lower = self.start.map(|d| tz.start_of_day(d)).transpose()?;
        let upper = self.end.map(|d| tz.start_of_next_day(d)).transpose()?;
        Ok(UtcBounds { lower, upper })
    }
}

/// Half-open UTC interval produced from a `DateRange`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtcBounds {
    /// Inclusive lower bound
    pub lower: Option<DateTime<Utc>>,
    /// Exclusive upper bound
    pub upper: Option<DateTime<Utc>>,
}

impl UtcBounds {
    /// Returns true if the instant falls inside the bounds
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.lower.map_or(true, |l| at >= l) && self.upper.map_or(true, |u| at < u)
    }

    /// Returns true if the instant falls before the lower bound
    pub fn is_before(&self, at: DateTime<Utc>) -> bool {
        self.lower.map_or(false, |l| at < l)
    }
}
