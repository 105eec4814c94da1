//! Shop configuration loading from config.toml
//!
//! The shop runs on a fixed UTC offset and a weekly table of business-hour ticks.
//! Each enabled weekday either lists its bookable start times explicitly or gives
//! `opens`/`closes`, in which case ticks are generated every `slot_minutes`.

use crate::core::clock::{ShopClock, parse_wall_clock};
use crate::errors::{Error, Result};
use chrono::{Datelike, NaiveDate, NaiveTime, TimeDelta, Weekday};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

const fn default_utc_offset_minutes() -> i32 {
    -240
}

const fn default_slot_minutes() -> i64 {
    30
}

const fn default_minimum_notice_hours() -> i64 {
    2
}

const fn default_advance_booking_days() -> i64 {
    30
}

const fn default_enabled() -> bool {
    true
}

fn default_subscription_terms() -> Vec<String> {
    vec!["corte".to_string(), "barba".to_string()]
}

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize)]
pub struct ShopConfig {
    /// Offset of shop local time from UTC, in minutes (Manaus is -240)
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    /// Spacing of generated ticks and default duration used for availability display
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: i64,
    /// How far ahead of now a same-day slot must start
    #[serde(default = "default_minimum_notice_hours")]
    pub minimum_notice_hours: i64,
    /// How many days ahead clients may book
    #[serde(default = "default_advance_booking_days")]
    pub advance_booking_days: i64,
    /// Name fragments treated as covered for manually flagged subscribers
    #[serde(default = "default_subscription_terms")]
    pub subscription_terms: Vec<String>,
    /// Business hours per weekday
    #[serde(default)]
    pub week: WeeklySchedule,
}

/// Business hours for each day of the week. Missing days are closed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeeklySchedule {
    /// Monday hours
    pub monday: Option<DaySchedule>,
    /// Tuesday hours
    pub tuesday: Option<DaySchedule>,
    /// Wednesday hours
    pub wednesday: Option<DaySchedule>,
    /// Thursday hours
    pub thursday: Option<DaySchedule>,
    /// Friday hours
    pub friday: Option<DaySchedule>,
    /// Saturday hours
    pub saturday: Option<DaySchedule>,
    /// Sunday hours
    pub sunday: Option<DaySchedule>,
}

impl WeeklySchedule {
    /// Schedule configured for `weekday`, if any
    #[must_use]
    pub const fn for_weekday(&self, weekday: Weekday) -> Option<&DaySchedule> {
        match weekday {
            Weekday::Mon => self.monday.as_ref(),
            Weekday::Tue => self.tuesday.as_ref(),
            Weekday::Wed => self.wednesday.as_ref(),
            Weekday::Thu => self.thursday.as_ref(),
            Weekday::Fri => self.friday.as_ref(),
            Weekday::Sat => self.saturday.as_ref(),
            Weekday::Sun => self.sunday.as_ref(),
        }
    }
}

/// Bookable start times for one weekday
#[derive(Debug, Clone, Deserialize)]
pub struct DaySchedule {
    /// Closed days keep their hours but produce no slots
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Explicit `"HH:MM"` ticks; takes precedence over `opens`/`closes`
    #[serde(default)]
    pub slots: Vec<String>,
    /// First tick, `"HH:MM"`
    pub opens: Option<String>,
    /// Closing time, `"HH:MM"`; the last tick starts one slot before it
    pub closes: Option<String>,
}

impl DaySchedule {
    /// Expands this day into sorted, deduplicated start times.
    pub fn ticks(&self, slot_minutes: i64) -> Result<Vec<NaiveTime>> {
        if !self.enabled {
            return Ok(Vec::new());
        }

        let mut ticks = if self.slots.is_empty() {
            match (&self.opens, &self.closes) {
                (Some(opens), Some(closes)) => {
                    generate_ticks(parse_wall_clock(opens)?, parse_wall_clock(closes)?, slot_minutes)?
                }
                _ => Vec::new(),
            }
        } else {
            self.slots
                .iter()
                .map(|slot| parse_wall_clock(slot))
                .collect::<Result<Vec<_>>>()?
        };

        ticks.sort_unstable();
        ticks.dedup();
        Ok(ticks)
    }
}

fn generate_ticks(opens: NaiveTime, closes: NaiveTime, slot_minutes: i64) -> Result<Vec<NaiveTime>> {
    if slot_minutes <= 0 {
        return Err(Error::Config {
            message: format!("slot_minutes must be positive, got {slot_minutes}"),
        });
    }
    if closes <= opens {
        return Err(Error::Config {
            message: format!("closing time {closes} must be after opening time {opens}"),
        });
    }

    let step = TimeDelta::try_minutes(slot_minutes).ok_or_else(|| Error::Config {
        message: format!("slot_minutes {slot_minutes} is out of range"),
    })?;
    let mut ticks = Vec::new();
    let mut tick = opens;
    loop {
        let (end, wrapped) = tick.overflowing_add_signed(step);
        // A slot running past midnight ends after any closing time
        if wrapped != 0 || end > closes {
            break;
        }
        ticks.push(tick);
        tick = end;
    }
    Ok(ticks)
}

impl ShopConfig {
    /// Clock for the configured UTC offset
    pub fn clock(&self) -> Result<ShopClock> {
        ShopClock::from_offset_minutes(self.utc_offset_minutes)
    }

    /// Catalog of candidate start times for `date`. Closed days yield an empty list.
    pub fn catalog_for(&self, date: NaiveDate) -> Result<Vec<NaiveTime>> {
        self.week
            .for_weekday(date.weekday())
            .map_or_else(|| Ok(Vec::new()), |day| day.ticks(self.slot_minutes))
    }

    fn validate(&self) -> Result<()> {
        self.clock()?;
        if self.slot_minutes <= 0 {
            return Err(Error::Config {
                message: format!("slot_minutes must be positive, got {}", self.slot_minutes),
            });
        }
        if self.minimum_notice_hours < 0 || self.advance_booking_days < 0 {
            return Err(Error::Config {
                message: "booking windows cannot be negative".to_string(),
            });
        }
        Ok(())
    }
}

/// Loads shop configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - The offset or slot length is out of range
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ShopConfig> {
    let path_ref = path.as_ref();
    debug!("Loading shop configuration from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    parse_config(&contents)
}

/// Parses shop configuration from TOML text
pub fn parse_config(contents: &str) -> Result<ShopConfig> {
    let config: ShopConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse shop config: {e}"),
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads shop configuration from `SHOP_CONFIG`, or `./config.toml` when unset
pub fn load_default_config() -> Result<ShopConfig> {
    let path = std::env::var("SHOP_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    load_config(path)
}
