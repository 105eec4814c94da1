//! Shop clock - the single conversion point between UTC instants and shop wall time.
//!
//! Instants crossing the persistence boundary are UTC. Slot generation, overlap
//! testing and block matching all happen in the shop's fixed local offset, and every
//! conversion goes through [`ShopClock`].

use crate::errors::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};

const WALL_CLOCK_FORMAT: &str = "%H:%M";

/// Fixed-offset clock for the shop's local time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShopClock {
    offset: FixedOffset,
}

impl ShopClock {
    /// Builds a clock from an offset in minutes east of UTC (negative for the Americas).
    pub fn from_offset_minutes(minutes: i32) -> Result<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
            .ok_or_else(|| Error::Config {
                message: format!("UTC offset of {minutes} minutes is out of range"),
            })
    }

    /// The configured offset
    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Converts a UTC instant to shop wall time.
    #[must_use]
    pub fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }

    /// Converts shop wall time to the UTC instant it denotes.
    #[must_use]
    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        (local - TimeDelta::seconds(i64::from(self.offset.local_minus_utc()))).and_utc()
    }

    /// UTC instant of `time` on the local calendar day `date`.
    #[must_use]
    pub fn at(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        self.to_utc(date.and_time(time))
    }

    /// Local calendar day of a UTC instant.
    #[must_use]
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.to_local(instant).date()
    }

    /// UTC bounds `[start, end)` of the local days `first..=last`.
    #[must_use]
    pub fn day_range_utc(&self, first: NaiveDate, last: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.at(first, NaiveTime::MIN);
        let end = self.at(last, NaiveTime::MIN) + TimeDelta::days(1);
        (start, end)
    }
}

/// Parses an `"HH:MM"` wall-clock string.
pub fn parse_wall_clock(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), WALL_CLOCK_FORMAT).map_err(|e| {
        Error::InvalidInterval {
            message: format!("'{value}' is not an HH:MM time: {e}"),
        }
    })
}

/// Formats a time as `"HH:MM"`.
#[must_use]
pub fn format_wall_clock(time: NaiveTime) -> String {
    time.format(WALL_CLOCK_FORMAT).to_string()
}
