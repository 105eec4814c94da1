//! Slot generation.
//!
//! Turns a day's catalog of candidate start times into a slot board, marking each
//! tick unavailable when it is in the past, covered by a block or overlapping a live
//! booking.

use crate::core::clock::format_wall_clock;
use crate::core::commitment::ScheduleSnapshot;
use crate::core::interval::Interval;
use crate::errors::Result;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

/// Why a slot cannot be booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotReason {
    /// Overlaps a live booking
    Booked,
    /// Overlaps a schedule block
    Blocked,
    /// Starts before the minimum notice
    Past,
}

/// One candidate start time on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSlot {
    /// `"HH:MM"` in shop wall time
    pub time: String,
    /// Whether the slot can be booked
    pub available: bool,
    /// Set whenever `available` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SlotReason>,
}

/// Inputs for one slot board.
#[derive(Debug, Clone, Copy)]
pub struct SlotRequest<'a> {
    /// Local calendar day
    pub date: NaiveDate,
    /// Restrict to one barber; `None` means every barber must be free
    pub barber_id: Option<i64>,
    /// Candidate start times for the day
    pub catalog: &'a [NaiveTime],
    /// Length tested at each tick
    pub duration_minutes: i64,
    /// Ticks starting before this are reported as past
    pub not_before: Option<NaiveDateTime>,
}

/// Builds the slot board for `request` against `snapshot`.
///
/// Output is sorted by time with duplicate ticks removed. Calling it twice with the
/// same inputs yields the same board.
///
/// # Errors
/// Returns `InvalidInterval` when `duration_minutes` is not positive.
pub fn generate_slots(request: &SlotRequest<'_>, snapshot: &ScheduleSnapshot) -> Result<Vec<TimeSlot>> {
    let mut catalog = request.catalog.to_vec();
    catalog.sort_unstable();
    catalog.dedup();

    let in_scope = |barber_id: i64| request.barber_id.is_none_or(|wanted| wanted == barber_id);

    let blocks: Vec<&Interval> = snapshot
        .blocks
        .iter()
        .filter(|block| in_scope(block.barber_id))
        .map(|block| &block.interval)
        .collect();

    let commitments: Vec<Interval> = snapshot
        .commitments()
        .into_iter()
        .filter(|commitment| in_scope(commitment.barber_id))
        .map(|commitment| commitment.interval)
        .collect();

    catalog
        .into_iter()
        .map(|tick| {
            let candidate = Interval::starting_at(request.date.and_time(tick), request.duration_minutes)?;

            let reason = if blocks.iter().any(|block| block.overlaps(&candidate)) {
                Some(SlotReason::Blocked)
            } else if commitments.iter().any(|busy| busy.overlaps(&candidate)) {
                Some(SlotReason::Booked)
            } else if request
                .not_before
                .is_some_and(|cutoff| candidate.start() < cutoff)
            {
                Some(SlotReason::Past)
            } else {
                None
            };

            Ok(TimeSlot {
                time: format_wall_clock(tick),
                available: reason.is_none(),
                reason,
            })
        })
        .collect()
}
