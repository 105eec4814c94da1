//! Half-open time intervals in shop wall time.
//!
//! [`Interval::overlaps`] is the one overlap predicate in the crate; slot generation,
//! placement validation and block creation all go through it.

use crate::core::clock::parse_wall_clock;
use crate::errors::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use std::fmt;

/// `[start, end)` in local wall time. `start < end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl Interval {
    /// Builds an interval, rejecting `end <= start`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if end <= start {
            return Err(Error::InvalidInterval {
                message: format!("end {end} is not after start {start}"),
            });
        }
        Ok(Self { start, end })
    }

    /// Interval of `duration_minutes` beginning at `start`.
    pub fn starting_at(start: NaiveDateTime, duration_minutes: i64) -> Result<Self> {
        if duration_minutes <= 0 {
            return Err(Error::InvalidInterval {
                message: format!("duration must be positive, got {duration_minutes} minutes"),
            });
        }
        let end = TimeDelta::try_minutes(duration_minutes)
            .and_then(|duration| start.checked_add_signed(duration))
            .ok_or_else(|| Error::InvalidInterval {
                message: format!("{duration_minutes} minutes after {start} is out of range"),
            })?;
        Self::new(start, end)
    }

    /// Interval between two wall-clock times on `date`.
    pub fn on_day(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Result<Self> {
        Self::new(date.and_time(start), date.and_time(end))
    }

    /// Interval between two `"HH:MM"` strings on `date`.
    pub fn from_wall_clock(date: NaiveDate, start: &str, end: &str) -> Result<Self> {
        Self::on_day(date, parse_wall_clock(start)?, parse_wall_clock(end)?)
    }

    /// Inclusive start
    #[must_use]
    pub const fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// Exclusive end
    #[must_use]
    pub const fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Calendar day the interval starts on
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }

    /// Length in whole minutes
    #[must_use]
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Half-open overlap: back-to-back intervals do not overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && self.end > other.start
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{}",
            self.start.date(),
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}
