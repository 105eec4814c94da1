//! Schedule block business logic - Admin-created barber unavailability.
//!
//! Creating a block runs the inverse of booking validation: a block may not cover a
//! live booking or another block. Blocks are never edited, only created and deleted.

use crate::{
    core::{
        barber::require_active_barber,
        clock::{ShopClock, format_wall_clock},
        commitment::BlockWindow,
        conflict::check_block_placement,
        interval::Interval,
        schedule::load_snapshot_around,
    },
    entities::{ScheduleBlock, schedule_block},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument, warn};

/// A block to create, with times as `"HH:MM"` local wall clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScheduleBlock {
    /// Barber who is unavailable
    pub barber_id: i64,
    /// Local calendar day
    pub date: NaiveDate,
    /// Start, `"HH:MM"`
    pub start_time: String,
    /// End, `"HH:MM"`, after the start
    pub end_time: String,
    /// Why the barber is unavailable
    pub reason: Option<String>,
}

/// Blocks on the local days `first..=last`, optionally for one barber.
///
/// Rows whose times no longer parse are skipped with a warning.
pub async fn fetch_schedule_blocks<C>(
    conn: &C,
    first: NaiveDate,
    last: NaiveDate,
    barber_id: Option<i64>,
) -> Result<Vec<BlockWindow>>
where
    C: ConnectionTrait,
{
    let mut query = ScheduleBlock::find()
        .filter(schedule_block::Column::Date.gte(first))
        .filter(schedule_block::Column::Date.lte(last))
        .order_by_asc(schedule_block::Column::Date)
        .order_by_asc(schedule_block::Column::StartTime);
    if let Some(barber_id) = barber_id {
        query = query.filter(schedule_block::Column::BarberId.eq(barber_id));
    }

    Ok(query
        .all(conn)
        .await?
        .into_iter()
        .filter_map(|block| {
            match BlockWindow::from_wall_clock(
                block.id,
                block.barber_id,
                block.date,
                &block.start_time,
                &block.end_time,
                block.reason,
            ) {
                Ok(window) => Some(window),
                Err(e) => {
                    warn!("Skipping schedule block {}: {}", block.id, e);
                    None
                }
            }
        })
        .collect())
}

/// Creates a block after checking it does not cover a booking or another block.
///
/// # Errors
/// Returns an error if:
/// - The times are malformed or the end is not after the start (checked before any query)
/// - The barber does not exist or is inactive
/// - The block would cover a live booking (`DoubleBooked`) or another block (`Blocked`)
#[instrument(skip(db, clock))]
pub async fn create_schedule_block(
    db: &DatabaseConnection,
    clock: &ShopClock,
    block: &NewScheduleBlock,
) -> Result<schedule_block::Model> {
    let interval = Interval::from_wall_clock(block.date, &block.start_time, &block.end_time)?;

    let txn = db.begin().await?;
    require_active_barber(&txn, block.barber_id).await?;

    let snapshot = load_snapshot_around(&txn, clock, block.date, Some(block.barber_id)).await?;
    check_block_placement(block.barber_id, &interval, &snapshot)?;

    let created = schedule_block::ActiveModel {
        barber_id: Set(block.barber_id),
        date: Set(block.date),
        start_time: Set(format_wall_clock(interval.start().time())),
        end_time: Set(format_wall_clock(interval.end().time())),
        reason: Set(block.reason.clone()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!("Blocked barber {} on {}", created.barber_id, interval);
    Ok(created)
}

/// Deletes a block, freeing its time.
#[instrument(skip(db))]
pub async fn delete_schedule_block(db: &DatabaseConnection, block_id: i64) -> Result<()> {
    let result = ScheduleBlock::delete_by_id(block_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::BlockNotFound { id: block_id });
    }
    info!("Deleted schedule block {}", block_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::{appointment::create_appointment, commitment::CommitmentSource, pricing::PricingPolicy};
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn lunch(barber_id: i64, start: &str, end: &str) -> NewScheduleBlock {
        NewScheduleBlock {
            barber_id,
            date: test_date(),
            start_time: start.to_string(),
            end_time: end.to_string(),
            reason: Some("Almoço".to_string()),
        }
    }

    #[tokio::test]
    async fn test_rejects_bad_times_before_querying() -> Result<()> {
        // No query results are queued, so any query would fail the test
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let clock = test_clock()?;

        let result = create_schedule_block(&db, &clock, &lunch(1, "13:00", "12:00")).await;
        assert!(matches!(result, Err(Error::InvalidInterval { .. })));

        let result = create_schedule_block(&db, &clock, &lunch(1, "12:00", "12:00")).await;
        assert!(matches!(result, Err(Error::InvalidInterval { .. })));

        let result = create_schedule_block(&db, &clock, &lunch(1, "noon", "13:00")).await;
        assert!(matches!(result, Err(Error::InvalidInterval { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_block_cannot_cover_appointment_or_block() -> Result<()> {
        let shop = setup_test_shop().await?;
        let appointment = create_appointment(
            &shop.db,
            &shop.clock,
            &PricingPolicy::default(),
            &new_appointment(shop.barber.id, shop.client.id, "12:00", vec![shop.corte.id]),
        )
        .await?;

        let result = create_schedule_block(&shop.db, &shop.clock, &lunch(shop.barber.id, "11:45", "12:15")).await;
        assert!(matches!(
            result,
            Err(Error::DoubleBooked { with: CommitmentSource::Appointment(id) }) if id == appointment.id
        ));

        let block = create_schedule_block(&shop.db, &shop.clock, &lunch(shop.barber.id, "12:30", "13:30")).await?;
        assert_eq!(block.start_time, "12:30");

        let result = create_schedule_block(&shop.db, &shop.clock, &lunch(shop.barber.id, "13:00", "14:00")).await;
        assert!(matches!(result, Err(Error::Blocked { block_id }) if block_id == block.id));

        // Back-to-back with both is fine
        create_schedule_block(&shop.db, &shop.clock, &lunch(shop.barber.id, "13:30", "14:00")).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_and_delete_blocks() -> Result<()> {
        let shop = setup_test_shop().await?;
        let other = create_test_barber(&shop.db, "Bruno").await?;

        let mine = create_schedule_block(&shop.db, &shop.clock, &lunch(shop.barber.id, "12:00", "13:00")).await?;
        create_schedule_block(&shop.db, &shop.clock, &lunch(other.id, "12:00", "13:00")).await?;

        let blocks = fetch_schedule_blocks(&shop.db, test_date(), test_date(), Some(shop.barber.id)).await?;
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].id, mine.id);
        assert_eq!(blocks[0].reason.as_deref(), Some("Almoço"));

        let all = fetch_schedule_blocks(&shop.db, test_date(), test_date(), None).await?;
        assert_eq!(all.len(), 2);

        delete_schedule_block(&shop.db, mine.id).await?;
        let result = delete_schedule_block(&shop.db, mine.id).await;
        assert!(matches!(result, Err(Error::BlockNotFound { .. })));

        Ok(())
    }
}
