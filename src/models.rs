//! Status enums shared by entities and the engine.
//!
//! Statuses are stored as text columns; these enums give them a typed face.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Lifecycle of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    /// Booked and still movable
    Scheduled,
    /// Service delivered; financial fields are frozen
    Completed,
    /// Cancelled; no longer occupies the agenda
    Canceled,
}

impl AppointmentStatus {
    /// Text representation stored in the database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Completed => "COMPLETED",
            Self::Canceled => "CANCELED",
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SCHEDULED" => Ok(Self::Scheduled),
            "COMPLETED" => Ok(Self::Completed),
            // Older rows used the double-L spelling
            "CANCELED" | "CANCELLED" => Ok(Self::Canceled),
            other => Err(Error::InvalidRequest {
                message: format!("unknown appointment status '{other}'"),
            }),
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a client subscription. Only `Active` affects pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    /// Paid up; covered services are waived
    Active,
    /// Temporarily on hold
    Suspended,
    /// Terminated
    Cancelled,
}

impl SubscriptionStatus {
    /// Text representation stored in the database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Suspended => "SUSPENDED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "SUSPENDED" => Ok(Self::Suspended),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(Error::InvalidRequest {
                message: format!("unknown subscription status '{other}'"),
            }),
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a booking made on the public booking page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnlineBookingStatus {
    /// Awaiting confirmation
    Pending,
    /// Confirmed by the shop
    Confirmed,
    /// Cancelled by client or shop
    Cancelled,
    /// Promoted into an appointment
    Converted,
}

impl OnlineBookingStatus {
    /// Text representation stored in the database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
            Self::Converted => "CONVERTED",
        }
    }

    /// Pending and confirmed bookings still hold their slot
    #[must_use]
    pub const fn occupies_agenda(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl FromStr for OnlineBookingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "CANCELLED" => Ok(Self::Cancelled),
            "CONVERTED" => Ok(Self::Converted),
            other => Err(Error::InvalidRequest {
                message: format!("unknown online booking status '{other}'"),
            }),
        }
    }
}

impl fmt::Display for OnlineBookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
