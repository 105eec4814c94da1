//! Agenda queries - Snapshot loading and the public availability board.

use crate::{
    config::shop::ShopConfig,
    core::{
        appointment::fetch_appointments,
        barber::require_active_barber,
        clock::ShopClock,
        commitment::ScheduleSnapshot,
        online_booking::fetch_online_bookings,
        schedule_block::fetch_schedule_blocks,
        slots::{SlotRequest, TimeSlot, generate_slots},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use tracing::{debug, instrument};

/// Loads every live booking and block on the local days `first..=last`.
///
/// Appointments and online bookings are both included; cancelled ones are left out.
pub async fn load_snapshot<C>(
    conn: &C,
    clock: &ShopClock,
    first: NaiveDate,
    last: NaiveDate,
    barber_id: Option<i64>,
) -> Result<ScheduleSnapshot>
where
    C: ConnectionTrait,
{
    let range = clock.day_range_utc(first, last);
    let mut bookings = fetch_appointments(conn, clock, range, barber_id).await?;
    bookings.extend(fetch_online_bookings(conn, clock, range, barber_id).await?);
    let blocks = fetch_schedule_blocks(conn, first, last, barber_id).await?;

    debug!(
        "Loaded {} bookings and {} blocks for {}..={}",
        bookings.len(),
        blocks.len(),
        first,
        last
    );
    Ok(ScheduleSnapshot::new(bookings, blocks))
}

/// Loads the snapshot a placement on `date` has to be checked against.
///
/// Covers the day before and the day after too, so bookings crossing midnight in
/// either direction are seen.
pub async fn load_snapshot_around<C>(
    conn: &C,
    clock: &ShopClock,
    date: NaiveDate,
    barber_id: Option<i64>,
) -> Result<ScheduleSnapshot>
where
    C: ConnectionTrait,
{
    load_snapshot(
        conn,
        clock,
        date.pred_opt().unwrap_or(date),
        date.succ_opt().unwrap_or(date),
        barber_id,
    )
    .await
}

/// What the availability board is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityQuery {
    /// Local calendar day
    pub date: NaiveDate,
    /// One barber, or `None` for slots where every barber is free
    pub barber_id: Option<i64>,
    /// Length to test; defaults to the configured slot length
    pub duration_minutes: Option<i64>,
}

/// Computes the slot board for a day as seen at instant `now`.
///
/// # Errors
/// Returns an error if:
/// - The date is before today or beyond the advance booking window
/// - The barber does not exist or is inactive
/// - The configured hours for that weekday are malformed
#[instrument(skip(db, config))]
pub async fn available_slots(
    db: &DatabaseConnection,
    config: &ShopConfig,
    query: &AvailabilityQuery,
    now: DateTime<Utc>,
) -> Result<Vec<TimeSlot>> {
    let clock = config.clock()?;
    let now_local = clock.to_local(now);
    let today = now_local.date();

    if query.date < today {
        return Err(Error::InvalidRequest {
            message: format!("{} is in the past", query.date),
        });
    }
    if query.date > today + Duration::days(config.advance_booking_days) {
        return Err(Error::InvalidRequest {
            message: format!(
                "{} is more than {} days ahead",
                query.date, config.advance_booking_days
            ),
        });
    }
    if let Some(barber_id) = query.barber_id {
        require_active_barber(db, barber_id).await?;
    }

    let catalog = config.catalog_for(query.date)?;
    if catalog.is_empty() {
        debug!("Shop is closed on {}", query.date);
        return Ok(Vec::new());
    }

    let not_before =
        (query.date == today).then(|| now_local + Duration::hours(config.minimum_notice_hours));

    let snapshot = load_snapshot_around(db, &clock, query.date, query.barber_id).await?;

    generate_slots(
        &SlotRequest {
            date: query.date,
            barber_id: query.barber_id,
            catalog: &catalog,
            duration_minutes: query.duration_minutes.unwrap_or(config.slot_minutes),
            not_before,
        },
        &snapshot,
    )
}
