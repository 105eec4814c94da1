//! Rescheduling - Drag-and-drop moves of appointments on the agenda.
//!
//! A move is planned purely against a snapshot ([`plan_move`]) and then persisted with
//! a guarded update ([`persist_appointment_move`]) that only matches the row if it is
//! still where the plan found it. Only placement changes: prices, commission and lines
//! stay as they were.

use crate::{
    core::{
        appointment::{load_booking, slot_taken},
        barber::require_active_barber,
        clock::ShopClock,
        commitment::{Booking, CommitmentSource, ScheduleSnapshot},
        conflict::PlacementRequest,
        interval::Interval,
        schedule::load_snapshot_around,
    },
    entities::{Appointment, appointment},
    errors::{Error, Result},
    models::AppointmentStatus,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sea_orm::{TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{info, instrument};

/// Where a booking is being dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveTarget {
    /// Barber column it was dropped on
    pub barber_id: i64,
    /// Local calendar day
    pub date: NaiveDate,
    /// Local start time
    pub time: NaiveTime,
}

/// A validated move, ready to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePlan {
    /// Appointment being moved
    pub appointment_id: i64,
    /// Barber before the move
    pub from_barber_id: i64,
    /// Start before the move, shop wall time
    pub from_starts_at: NaiveDateTime,
    /// Barber after the move
    pub to_barber_id: i64,
    /// New interval, shop wall time
    pub to: Interval,
}

/// Validates dropping `booking` on `target`.
///
/// # Errors
/// Returns an error if:
/// - The booking is an unconverted online booking (`OnlineBookingImmutable`)
/// - The appointment is not scheduled
/// - The target is blocked or overlaps another booking
pub fn plan_move(booking: &Booking, target: &MoveTarget, snapshot: &ScheduleSnapshot) -> Result<MovePlan> {
    let appointment = booking.as_movable()?;
    if appointment.status != AppointmentStatus::Scheduled {
        return Err(Error::NotScheduled {
            appointment_id: appointment.id,
            status: appointment.status.to_string(),
        });
    }

    let to = PlacementRequest {
        barber_id: target.barber_id,
        date: target.date,
        start_time: target.time,
        duration_minutes: appointment.total_duration_minutes(),
        exclude: Some(booking.source()),
    }
    .validate(snapshot)?;

    Ok(MovePlan {
        appointment_id: appointment.id,
        from_barber_id: appointment.barber_id,
        from_starts_at: appointment.starts_at,
        to_barber_id: target.barber_id,
        to,
    })
}

/// Writes a planned move if the appointment is still scheduled where the plan found it.
///
/// # Errors
/// Returns `StaleState` when the row changed since it was read or the new slot was
/// taken concurrently.
pub async fn persist_appointment_move<C>(conn: &C, clock: &ShopClock, plan: &MovePlan) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Appointment::update_many()
        .col_expr(
            appointment::Column::StartsAt,
            Expr::value(clock.to_utc(plan.to.start())),
        )
        .col_expr(appointment::Column::BarberId, Expr::value(plan.to_barber_id))
        .col_expr(appointment::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(appointment::Column::Id.eq(plan.appointment_id))
        .filter(appointment::Column::Status.eq(AppointmentStatus::Scheduled.as_str()))
        .filter(appointment::Column::BarberId.eq(plan.from_barber_id))
        .filter(appointment::Column::StartsAt.eq(clock.to_utc(plan.from_starts_at)))
        .exec(conn)
        .await
        .map_err(|e| slot_taken(e, plan.to_barber_id))?;

    if result.rows_affected == 0 {
        return Err(Error::StaleState {
            barber_id: plan.to_barber_id,
        });
    }
    Ok(())
}

/// Moves a booking to `target`, all inside one transaction.
///
/// Online bookings are rejected before anything is read.
#[instrument(skip(db, clock))]
pub async fn move_booking(
    db: &DatabaseConnection,
    clock: &ShopClock,
    source: CommitmentSource,
    target: &MoveTarget,
) -> Result<appointment::Model> {
    let appointment_id = match source {
        CommitmentSource::OnlineBooking(booking_id) => {
            return Err(Error::OnlineBookingImmutable { booking_id });
        }
        CommitmentSource::Appointment(id) => id,
    };

    let txn = db.begin().await?;
    let (_, booking) = load_booking(&txn, clock, appointment_id).await?;
    if target.barber_id != booking.barber_id() {
        require_active_barber(&txn, target.barber_id).await?;
    }

    let snapshot = load_snapshot_around(&txn, clock, target.date, Some(target.barber_id)).await?;
    let plan = plan_move(&booking, target, &snapshot)?;
    persist_appointment_move(&txn, clock, &plan).await?;

    let moved = Appointment::find_by_id(appointment_id)
        .one(&txn)
        .await?
        .ok_or(Error::AppointmentNotFound { id: appointment_id })?;
    txn.commit().await?;

    info!(
        "Moved appointment {} from barber {} at {} to barber {} at {}",
        plan.appointment_id, plan.from_barber_id, plan.from_starts_at, plan.to_barber_id, plan.to
    );
    Ok(moved)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::{
        appointment::{cancel_appointment, create_appointment, get_service_lines},
        commitment::{AdminAppointment, BlockWindow, ExternalBooking},
        online_booking::{NewOnlineBooking, create_online_booking},
        pricing::PricingPolicy,
    };
    use crate::models::OnlineBookingStatus;
    use crate::test_utils::*;

    fn scheduled(id: i64, barber_id: i64, start: &str, minutes: i64) -> Booking {
        Booking::Admin(AdminAppointment {
            id,
            barber_id,
            starts_at: test_date().and_time(wall(start)),
            status: AppointmentStatus::Scheduled,
            service_minutes: vec![minutes],
            online_booking_id: None,
        })
    }

    fn target(barber_id: i64, time: &str) -> MoveTarget {
        MoveTarget {
            barber_id,
            date: test_date(),
            time: wall(time),
        }
    }

    #[test]
    fn test_plan_move_excludes_itself() {
        let moving = scheduled(1, 1, "09:00", 60);
        let snapshot = ScheduleSnapshot::new(vec![moving.clone()], Vec::new());

        // Shift by 30 minutes onto its own old interval
        let plan = plan_move(&moving, &target(1, "09:30"), &snapshot).unwrap();
        assert_eq!(plan.to.start(), test_date().and_time(wall("09:30")));
        assert_eq!(plan.to.end(), test_date().and_time(wall("10:30")));
        assert_eq!(plan.from_starts_at, test_date().and_time(wall("09:00")));
    }

    #[test]
    fn test_plan_move_surfaces_conflicts() {
        let moving = scheduled(1, 1, "09:00", 30);
        let snapshot = ScheduleSnapshot::new(
            vec![moving.clone(), scheduled(2, 1, "11:00", 30)],
            vec![BlockWindow::from_wall_clock(7, 1, test_date(), "14:00", "15:00", None).unwrap()],
        );

        assert!(matches!(
            plan_move(&moving, &target(1, "10:45"), &snapshot),
            Err(Error::DoubleBooked { with: CommitmentSource::Appointment(2) })
        ));
        assert!(matches!(
            plan_move(&moving, &target(1, "14:30"), &snapshot),
            Err(Error::Blocked { block_id: 7 })
        ));
        assert!(plan_move(&moving, &target(1, "10:30"), &snapshot).is_ok());
    }

    #[test]
    fn test_plan_move_rejects_online_and_finished_bookings() {
        let online = Booking::External(ExternalBooking {
            id: 4,
            barber_id: 1,
            starts_at: test_date().and_time(wall("09:00")),
            status: OnlineBookingStatus::Confirmed,
            service_minutes: vec![30],
        });
        let snapshot = ScheduleSnapshot::default();
        assert!(matches!(
            plan_move(&online, &target(1, "10:00"), &snapshot),
            Err(Error::OnlineBookingImmutable { booking_id: 4 })
        ));

        let mut done = scheduled(1, 1, "09:00", 30);
        if let Booking::Admin(a) = &mut done {
            a.status = AppointmentStatus::Completed;
        }
        assert!(matches!(
            plan_move(&done, &target(1, "10:00"), &snapshot),
            Err(Error::NotScheduled { .. })
        ));
    }

    #[tokio::test]
    async fn test_move_booking_changes_only_placement() -> Result<()> {
        init_test_tracing();
        let shop = setup_test_shop().await?;
        let bruno = create_test_barber(&shop.db, "Bruno").await?;
        let original = create_appointment(
            &shop.db,
            &shop.clock,
            &PricingPolicy::default(),
            &new_appointment(shop.barber.id, shop.client.id, "09:00", vec![shop.corte.id, shop.barba.id]),
        )
        .await?;

        let moved = move_booking(
            &shop.db,
            &shop.clock,
            CommitmentSource::Appointment(original.id),
            &target(bruno.id, "15:00"),
        )
        .await?;

        assert_eq!(moved.barber_id, bruno.id);
        assert_eq!(moved.starts_at, shop.clock.at(test_date(), wall("15:00")));
        assert_eq!(moved.total_amount, original.total_amount);
        assert_eq!(moved.commission_amount, original.commission_amount);
        assert_eq!(get_service_lines(&shop.db, moved.id).await?.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_move_booking_rejects_online_bookings_and_conflicts() -> Result<()> {
        let shop = setup_test_shop().await?;
        let online = create_online_booking(
            &shop.db,
            &shop.clock,
            &NewOnlineBooking {
                client_name: "Pedro".to_string(),
                client_phone: "92977776666".to_string(),
                barber_id: shop.barber.id,
                date: test_date(),
                time: wall("11:00"),
                service_ids: vec![shop.corte.id],
                is_subscriber: false,
                notes: None,
            },
        )
        .await?;

        let result = move_booking(
            &shop.db,
            &shop.clock,
            CommitmentSource::OnlineBooking(online.id),
            &target(shop.barber.id, "12:00"),
        )
        .await;
        assert!(matches!(result, Err(Error::OnlineBookingImmutable { .. })));

        let appointment = create_appointment(
            &shop.db,
            &shop.clock,
            &PricingPolicy::default(),
            &new_appointment(shop.barber.id, shop.client.id, "09:00", vec![shop.corte.id]),
        )
        .await?;
        let result = move_booking(
            &shop.db,
            &shop.clock,
            CommitmentSource::Appointment(appointment.id),
            &target(shop.barber.id, "10:45"),
        )
        .await;
        assert!(matches!(
            result,
            Err(Error::DoubleBooked { with: CommitmentSource::OnlineBooking(id) }) if id == online.id
        ));

        // Nothing changed
        let unchanged = crate::core::appointment::require_appointment(&shop.db, appointment.id).await?;
        assert_eq!(unchanged.starts_at, appointment.starts_at);

        Ok(())
    }

    #[tokio::test]
    async fn test_stale_plan_is_rejected() -> Result<()> {
        let shop = setup_test_shop().await?;
        let appointment = create_appointment(
            &shop.db,
            &shop.clock,
            &PricingPolicy::default(),
            &new_appointment(shop.barber.id, shop.client.id, "09:00", vec![shop.corte.id]),
        )
        .await?;

        let (_, booking) = load_booking(&shop.db, &shop.clock, appointment.id).await?;
        let plan = plan_move(&booking, &target(shop.barber.id, "13:00"), &ScheduleSnapshot::default())?;

        // Someone cancels it between planning and persisting
        cancel_appointment(&shop.db, appointment.id).await?;
        let result = persist_appointment_move(&shop.db, &shop.clock, &plan).await;
        assert!(matches!(result, Err(Error::StaleState { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_unique_index_catches_unseen_collision() -> Result<()> {
        let shop = setup_test_shop().await?;
        let policy = PricingPolicy::default();
        let first = create_appointment(
            &shop.db,
            &shop.clock,
            &policy,
            &new_appointment(shop.barber.id, shop.client.id, "09:00", vec![shop.corte.id]),
        )
        .await?;
        let second = create_appointment(
            &shop.db,
            &shop.clock,
            &policy,
            &new_appointment(shop.barber.id, shop.client.id, "13:00", vec![shop.corte.id]),
        )
        .await?;

        // Planned against an empty snapshot, as if the 09:00 booking had not been seen
        let (_, booking) = load_booking(&shop.db, &shop.clock, second.id).await?;
        let plan = plan_move(&booking, &target(shop.barber.id, "09:00"), &ScheduleSnapshot::default())?;
        let result = persist_appointment_move(&shop.db, &shop.clock, &plan).await;
        assert!(matches!(result, Err(Error::StaleState { barber_id }) if barber_id == shop.barber.id));
        assert_ne!(first.id, second.id);

        Ok(())
    }
}
