//! Placement validation.
//!
//! Given a candidate interval for a barber, decides whether it collides with a
//! schedule block or with another live booking. Blocks are checked first so the
//! caller can tell "ask an admin to unblock" apart from "pick another time".
//!
//! Everything here is pure over the snapshot it receives; fetching current state
//! (and doing so close to the write) is the caller's job.

use crate::core::commitment::{CommitmentSource, ScheduleSnapshot};
use crate::core::interval::Interval;
use crate::errors::{Error, Result};
use chrono::{NaiveDate, NaiveTime};

/// Which kind of commitment a candidate collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    /// A schedule block covers the interval
    Blocked,
    /// Another booking covers the interval
    DoubleBooked,
}

/// A rejected placement, naming what it collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// Overlaps a schedule block
    Blocked {
        /// The overlapping block
        block_id: i64,
    },
    /// Overlaps another live booking
    DoubleBooked {
        /// The overlapping booking
        with: CommitmentSource,
    },
}

impl Conflict {
    /// Kind of the conflict
    #[must_use]
    pub const fn kind(&self) -> ConflictKind {
        match self {
            Self::Blocked { .. } => ConflictKind::Blocked,
            Self::DoubleBooked { .. } => ConflictKind::DoubleBooked,
        }
    }
}

impl From<Conflict> for Error {
    fn from(conflict: Conflict) -> Self {
        match conflict {
            Conflict::Blocked { block_id } => Self::Blocked { block_id },
            Conflict::DoubleBooked { with } => Self::DoubleBooked { with },
        }
    }
}

/// A proposed booking position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementRequest {
    /// Barber to book
    pub barber_id: i64,
    /// Local calendar day
    pub date: NaiveDate,
    /// Local start time
    pub start_time: NaiveTime,
    /// Real duration of the booking
    pub duration_minutes: i64,
    /// Booking being moved, so it does not collide with itself
    pub exclude: Option<CommitmentSource>,
}

impl PlacementRequest {
    /// Candidate interval `start_time + duration_minutes` on `date`.
    pub fn interval(&self) -> Result<Interval> {
        Interval::starting_at(self.date.and_time(self.start_time), self.duration_minutes)
    }

    /// Builds the candidate interval and validates it against `snapshot`.
    ///
    /// # Errors
    /// `InvalidInterval` for a non-positive duration, `Blocked` or `DoubleBooked` for
    /// collisions.
    pub fn validate(&self, snapshot: &ScheduleSnapshot) -> Result<Interval> {
        let candidate = self.interval()?;
        validate_placement(self.barber_id, &candidate, snapshot, self.exclude)?;
        Ok(candidate)
    }
}

/// Checks a candidate interval for `barber_id` against blocks, then bookings.
pub fn validate_placement(
    barber_id: i64,
    candidate: &Interval,
    snapshot: &ScheduleSnapshot,
    exclude: Option<CommitmentSource>,
) -> std::result::Result<(), Conflict> {
    if let Some(block) = snapshot
        .blocks
        .iter()
        .find(|block| block.barber_id == barber_id && block.interval.overlaps(candidate))
    {
        return Err(Conflict::Blocked { block_id: block.id });
    }

    if let Some(commitment) = snapshot.commitments().into_iter().find(|commitment| {
        commitment.barber_id == barber_id
            && Some(commitment.source) != exclude
            && commitment.interval.overlaps(candidate)
    }) {
        return Err(Conflict::DoubleBooked {
            with: commitment.source,
        });
    }

    Ok(())
}

/// Inverse check run before creating a block: the block may not cover a live
/// booking (reported as `DoubleBooked`) nor another block (reported as `Blocked`).
pub fn check_block_placement(
    barber_id: i64,
    candidate: &Interval,
    snapshot: &ScheduleSnapshot,
) -> std::result::Result<(), Conflict> {
    if let Some(commitment) = snapshot.commitments().into_iter().find(|commitment| {
        commitment.barber_id == barber_id && commitment.interval.overlaps(candidate)
    }) {
        return Err(Conflict::DoubleBooked {
            with: commitment.source,
        });
    }

    if let Some(block) = snapshot
        .blocks
        .iter()
        .find(|block| block.barber_id == barber_id && block.interval.overlaps(candidate))
    {
        return Err(Conflict::Blocked { block_id: block.id });
    }

    Ok(())
}
