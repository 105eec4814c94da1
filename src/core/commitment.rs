//! Bookings and blocks as the scheduling engine sees them.
//!
//! Administrative appointments and public online bookings are two variants of
//! [`Booking`]. Both project into a read-only [`Commitment`] that slot generation and
//! placement validation consume; only [`Booking::Admin`] can be moved.
//!
//! A [`ScheduleSnapshot`] bundles the pre-fetched commitments and blocks for the days
//! under consideration. The engine never fetches anything itself.

use crate::core::interval::Interval;
use crate::errors::{Error, Result};
use crate::models::{AppointmentStatus, OnlineBookingStatus};
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;
use tracing::warn;

/// Duration assumed for bookings without usable service lines.
pub const FALLBACK_DURATION_MINUTES: i64 = 30;

/// Identifies which record a commitment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitmentSource {
    /// An administrative appointment
    Appointment(i64),
    /// A booking from the public booking page
    OnlineBooking(i64),
}

impl fmt::Display for CommitmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Appointment(id) => write!(f, "appointment {id}"),
            Self::OnlineBooking(id) => write!(f, "online booking {id}"),
        }
    }
}

/// Busy time on a barber's agenda.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commitment {
    /// Record that holds the time
    pub source: CommitmentSource,
    /// Barber whose time is taken
    pub barber_id: i64,
    /// When, in shop wall time
    pub interval: Interval,
}

fn total_duration(service_minutes: &[i64]) -> i64 {
    let total: i64 = service_minutes.iter().filter(|m| **m > 0).sum();
    if total > 0 {
        total
    } else {
        FALLBACK_DURATION_MINUTES
    }
}

/// An appointment created by the shop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminAppointment {
    /// Appointment id
    pub id: i64,
    /// Assigned barber
    pub barber_id: i64,
    /// Start in shop wall time
    pub starts_at: NaiveDateTime,
    /// Lifecycle status
    pub status: AppointmentStatus,
    /// Frozen durations of the service lines
    pub service_minutes: Vec<i64>,
    /// Online booking it was converted from, if any
    pub online_booking_id: Option<i64>,
}

impl AdminAppointment {
    /// Sum of service durations, or [`FALLBACK_DURATION_MINUTES`] when there are none.
    #[must_use]
    pub fn total_duration_minutes(&self) -> i64 {
        total_duration(&self.service_minutes)
    }
}

/// A booking from the public page that has not been converted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalBooking {
    /// Online booking id
    pub id: i64,
    /// Requested barber
    pub barber_id: i64,
    /// Start in shop wall time
    pub starts_at: NaiveDateTime,
    /// Lifecycle status
    pub status: OnlineBookingStatus,
    /// Frozen durations of the requested services
    pub service_minutes: Vec<i64>,
}

/// Anything that can occupy a barber's agenda.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Booking {
    /// Created by the shop; movable while scheduled
    Admin(AdminAppointment),
    /// Created on the public booking page; must be converted before moving
    External(ExternalBooking),
}

impl Booking {
    /// Record identity
    #[must_use]
    pub const fn source(&self) -> CommitmentSource {
        match self {
            Self::Admin(appointment) => CommitmentSource::Appointment(appointment.id),
            Self::External(booking) => CommitmentSource::OnlineBooking(booking.id),
        }
    }

    /// Barber the booking is assigned to
    #[must_use]
    pub const fn barber_id(&self) -> i64 {
        match self {
            Self::Admin(appointment) => appointment.barber_id,
            Self::External(booking) => booking.barber_id,
        }
    }

    /// Start in shop wall time
    #[must_use]
    pub const fn starts_at(&self) -> NaiveDateTime {
        match self {
            Self::Admin(appointment) => appointment.starts_at,
            Self::External(booking) => booking.starts_at,
        }
    }

    /// Total duration with the 30 minute fallback
    #[must_use]
    pub fn duration_minutes(&self) -> i64 {
        match self {
            Self::Admin(appointment) => appointment.total_duration_minutes(),
            Self::External(booking) => total_duration(&booking.service_minutes),
        }
    }

    /// Whether the booking still holds its time
    #[must_use]
    pub const fn occupies_agenda(&self) -> bool {
        match self {
            Self::Admin(appointment) => !matches!(appointment.status, AppointmentStatus::Canceled),
            Self::External(booking) => booking.status.occupies_agenda(),
        }
    }

    /// Read-only projection used by slot generation and placement validation.
    pub fn commitment(&self) -> Result<Commitment> {
        Ok(Commitment {
            source: self.source(),
            barber_id: self.barber_id(),
            interval: Interval::starting_at(self.starts_at(), self.duration_minutes())?,
        })
    }

    /// The movable appointment behind this booking.
    ///
    /// # Errors
    /// Returns `OnlineBookingImmutable` for unconverted online bookings.
    pub fn as_movable(&self) -> Result<&AdminAppointment> {
        match self {
            Self::Admin(appointment) => Ok(appointment),
            Self::External(booking) => Err(Error::OnlineBookingImmutable {
                booking_id: booking.id,
            }),
        }
    }
}

/// A block of barber unavailability in shop wall time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockWindow {
    /// Block id
    pub id: i64,
    /// Barber who is unavailable
    pub barber_id: i64,
    /// Blocked time
    pub interval: Interval,
    /// Why the barber is unavailable
    pub reason: Option<String>,
}

impl BlockWindow {
    /// Builds a block from its stored `"HH:MM"` strings.
    pub fn from_wall_clock(
        id: i64,
        barber_id: i64,
        date: NaiveDate,
        start_time: &str,
        end_time: &str,
        reason: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            id,
            barber_id,
            interval: Interval::from_wall_clock(date, start_time, end_time)?,
            reason,
        })
    }
}

/// Pre-fetched agenda state for the days being evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleSnapshot {
    /// Appointments and online bookings, any status
    pub bookings: Vec<Booking>,
    /// Schedule blocks
    pub blocks: Vec<BlockWindow>,
}

impl ScheduleSnapshot {
    /// Builds a snapshot from fetched bookings and blocks.
    #[must_use]
    pub const fn new(bookings: Vec<Booking>, blocks: Vec<BlockWindow>) -> Self {
        Self { bookings, blocks }
    }

    /// Commitments of bookings that still occupy the agenda.
    ///
    /// Bookings whose interval cannot be built are skipped with a warning.
    #[must_use]
    pub fn commitments(&self) -> Vec<Commitment> {
        self.bookings
            .iter()
            .filter(|booking| booking.occupies_agenda())
            .filter_map(|booking| match booking.commitment() {
                Ok(commitment) => Some(commitment),
                Err(e) => {
                    warn!("Skipping {} with unusable interval: {}", booking.source(), e);
                    None
                }
            })
            .collect()
    }

    /// Looks up a booking by record identity.
    #[must_use]
    pub fn find(&self, source: CommitmentSource) -> Option<&Booking> {
        self.bookings.iter().find(|booking| booking.source() == source)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn admin(id: i64, minutes: Vec<i64>, status: AppointmentStatus) -> Booking {
        Booking::Admin(AdminAppointment {
            id,
            barber_id: 1,
            starts_at: at(10, 0),
            status,
            service_minutes: minutes,
            online_booking_id: None,
        })
    }

    #[test]
    fn test_duration_sums_service_lines() {
        let booking = admin(1, vec![30, 15], AppointmentStatus::Scheduled);
        assert_eq!(booking.duration_minutes(), 45);
        let commitment = booking.commitment().unwrap();
        assert_eq!(commitment.interval.end(), at(10, 45));
    }

    #[test]
    fn test_duration_falls_back_without_services() {
        assert_eq!(admin(1, vec![], AppointmentStatus::Scheduled).duration_minutes(), 30);
        assert_eq!(admin(1, vec![0], AppointmentStatus::Scheduled).duration_minutes(), 30);
    }

    #[test]
    fn test_cancelled_bookings_free_the_agenda() {
        let snapshot = ScheduleSnapshot::new(
            vec![
                admin(1, vec![30], AppointmentStatus::Scheduled),
                admin(2, vec![30], AppointmentStatus::Canceled),
                admin(3, vec![30], AppointmentStatus::Completed),
                Booking::External(ExternalBooking {
                    id: 4,
                    barber_id: 1,
                    starts_at: at(11, 0),
                    status: OnlineBookingStatus::Converted,
                    service_minutes: vec![30],
                }),
            ],
            Vec::new(),
        );
        let sources: Vec<_> = snapshot.commitments().into_iter().map(|c| c.source).collect();
        assert_eq!(
            sources,
            vec![CommitmentSource::Appointment(1), CommitmentSource::Appointment(3)]
        );
    }

    #[test]
    fn test_only_admin_appointments_are_movable() {
        let online = Booking::External(ExternalBooking {
            id: 7,
            barber_id: 1,
            starts_at: at(9, 0),
            status: OnlineBookingStatus::Pending,
            service_minutes: vec![30],
        });
        assert!(matches!(
            online.as_movable(),
            Err(Error::OnlineBookingImmutable { booking_id: 7 })
        ));
        assert!(admin(1, vec![30], AppointmentStatus::Scheduled).as_movable().is_ok());
    }
}
