//! Online booking business logic - Requests from the public booking page.
//!
//! A pending or confirmed online booking holds its slot like any appointment but is
//! not movable. Admins promote it with [`convert_online_booking`], which books a real
//! appointment in its place and marks the booking converted.

use crate::{
    core::{
        appointment::{NewAppointment, insert_appointment},
        barber::require_active_barber,
        client::{find_client_by_phone, find_or_create_client_by_phone, require_client},
        clock::ShopClock,
        commitment::{Booking, ExternalBooking, FALLBACK_DURATION_MINUTES},
        conflict::PlacementRequest,
        pricing::PricingPolicy,
        schedule::load_snapshot_around,
        service::fetch_services_by_ids,
    },
    entities::{
        Appointment, OnlineBooking, OnlineBookingService, appointment, online_booking,
        online_booking_service,
    },
    errors::{Error, Result},
    models::OnlineBookingStatus,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

/// A booking request as submitted on the public page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOnlineBooking {
    /// Name typed by the client
    pub client_name: String,
    /// Phone typed by the client
    pub client_phone: String,
    /// Requested barber
    pub barber_id: i64,
    /// Local calendar day
    pub date: NaiveDate,
    /// Local start time
    pub time: NaiveTime,
    /// Requested services, at least one
    pub service_ids: Vec<i64>,
    /// Client declared themselves a subscriber
    pub is_subscriber: bool,
    /// Free-form notes
    pub notes: Option<String>,
}

fn parse_status(booking: &online_booking::Model) -> Result<OnlineBookingStatus> {
    booking.status.parse()
}

/// Retrieves an online booking by id.
pub async fn get_online_booking_by_id<C>(conn: &C, booking_id: i64) -> Result<Option<online_booking::Model>>
where
    C: ConnectionTrait,
{
    OnlineBooking::find_by_id(booking_id)
        .one(conn)
        .await
        .map_err(Into::into)
}

async fn require_online_booking<C>(conn: &C, booking_id: i64) -> Result<online_booking::Model>
where
    C: ConnectionTrait,
{
    get_online_booking_by_id(conn, booking_id)
        .await?
        .ok_or(Error::OnlineBookingNotFound { id: booking_id })
}

/// Requested service lines of an online booking in insertion order.
pub async fn get_online_booking_services<C>(
    conn: &C,
    booking_id: i64,
) -> Result<Vec<online_booking_service::Model>>
where
    C: ConnectionTrait,
{
    OnlineBookingService::find()
        .filter(online_booking_service::Column::OnlineBookingId.eq(booking_id))
        .order_by_asc(online_booking_service::Column::Id)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Records a booking from the public page after validating its placement.
///
/// The booking is linked to an existing client when the phone matches one.
///
/// # Errors
/// Returns an error if:
/// - The name, phone or service list is empty
/// - The barber or a service does not exist
/// - The slot is blocked or already booked
#[instrument(skip(db, clock), fields(barber_id = new.barber_id))]
pub async fn create_online_booking(
    db: &DatabaseConnection,
    clock: &ShopClock,
    new: &NewOnlineBooking,
) -> Result<online_booking::Model> {
    if new.client_name.trim().is_empty() || new.client_phone.trim().is_empty() {
        return Err(Error::InvalidRequest {
            message: "Name and phone are required".to_string(),
        });
    }
    if new.service_ids.is_empty() {
        return Err(Error::InvalidRequest {
            message: "Choose at least one service".to_string(),
        });
    }

    let txn = db.begin().await?;
    require_active_barber(&txn, new.barber_id).await?;
    let services = fetch_services_by_ids(&txn, &new.service_ids).await?;
    let client = find_client_by_phone(&txn, &new.client_phone).await?;

    let booked: i64 = services
        .iter()
        .map(|service| i64::from(service.duration_minutes))
        .filter(|m| *m > 0)
        .sum();
    let duration_minutes = if booked > 0 {
        booked
    } else {
        FALLBACK_DURATION_MINUTES
    };

    let snapshot = load_snapshot_around(&txn, clock, new.date, Some(new.barber_id)).await?;
    PlacementRequest {
        barber_id: new.barber_id,
        date: new.date,
        start_time: new.time,
        duration_minutes,
        exclude: None,
    }
    .validate(&snapshot)?;

    let booking = online_booking::ActiveModel {
        client_id: Set(client.map(|c| c.id)),
        client_name: Set(new.client_name.trim().to_string()),
        client_phone: Set(new.client_phone.trim().to_string()),
        barber_id: Set(new.barber_id),
        scheduled_at: Set(clock.at(new.date, new.time)),
        status: Set(OnlineBookingStatus::Pending.as_str().to_string()),
        is_subscriber: Set(new.is_subscriber),
        notes: Set(new.notes.clone()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    for service in &services {
        online_booking_service::ActiveModel {
            online_booking_id: Set(booking.id),
            service_id: Set(service.id),
            duration_minutes: Set(service.duration_minutes),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;
    info!(
        "Received online booking {} for barber {} at {}",
        booking.id, booking.barber_id, booking.scheduled_at
    );
    Ok(booking)
}

/// Pending and confirmed online bookings starting within `[start, end)`.
///
/// Rows with an unreadable status are skipped with a warning.
pub async fn fetch_online_bookings<C>(
    conn: &C,
    clock: &ShopClock,
    range: (DateTime<Utc>, DateTime<Utc>),
    barber_id: Option<i64>,
) -> Result<Vec<Booking>>
where
    C: ConnectionTrait,
{
    let (start, end) = range;
    let mut query = OnlineBooking::find()
        .filter(online_booking::Column::ScheduledAt.gte(start))
        .filter(online_booking::Column::ScheduledAt.lt(end))
        .filter(online_booking::Column::Status.is_in([
            OnlineBookingStatus::Pending.as_str(),
            OnlineBookingStatus::Confirmed.as_str(),
        ]))
        .order_by_asc(online_booking::Column::ScheduledAt);
    if let Some(barber_id) = barber_id {
        query = query.filter(online_booking::Column::BarberId.eq(barber_id));
    }
    let bookings = query.all(conn).await?;
    if bookings.is_empty() {
        return Ok(Vec::new());
    }

    let mut minutes: HashMap<i64, Vec<i64>> = HashMap::new();
    for line in OnlineBookingService::find()
        .filter(
            online_booking_service::Column::OnlineBookingId
                .is_in(bookings.iter().map(|b| b.id)),
        )
        .all(conn)
        .await?
    {
        minutes
            .entry(line.online_booking_id)
            .or_default()
            .push(i64::from(line.duration_minutes));
    }

    Ok(bookings
        .into_iter()
        .filter_map(|booking| match parse_status(&booking) {
            Ok(status) => Some(Booking::External(ExternalBooking {
                id: booking.id,
                barber_id: booking.barber_id,
                starts_at: clock.to_local(booking.scheduled_at),
                status,
                service_minutes: minutes.remove(&booking.id).unwrap_or_default(),
            })),
            Err(e) => {
                warn!("Skipping online booking {}: {}", booking.id, e);
                None
            }
        })
        .collect())
}

async fn set_status(
    db: &DatabaseConnection,
    booking: online_booking::Model,
    status: OnlineBookingStatus,
) -> Result<online_booking::Model> {
    let mut active: online_booking::ActiveModel = booking.into();
    active.status = Set(status.as_str().to_string());
    active.update(db).await.map_err(Into::into)
}

/// Confirms a pending online booking.
#[instrument(skip(db))]
pub async fn confirm_online_booking(
    db: &DatabaseConnection,
    booking_id: i64,
) -> Result<online_booking::Model> {
    let booking = require_online_booking(db, booking_id).await?;
    match parse_status(&booking)? {
        OnlineBookingStatus::Pending => set_status(db, booking, OnlineBookingStatus::Confirmed).await,
        OnlineBookingStatus::Confirmed => Ok(booking),
        other => Err(Error::InvalidRequest {
            message: format!("Online booking {booking_id} is {other} and cannot be confirmed"),
        }),
    }
}

/// Cancels an online booking, freeing its slot. Converted bookings cannot be cancelled
/// here; cancel the appointment instead.
#[instrument(skip(db))]
pub async fn cancel_online_booking(
    db: &DatabaseConnection,
    booking_id: i64,
) -> Result<online_booking::Model> {
    let booking = require_online_booking(db, booking_id).await?;
    match parse_status(&booking)? {
        OnlineBookingStatus::Pending | OnlineBookingStatus::Confirmed => {
            let cancelled = set_status(db, booking, OnlineBookingStatus::Cancelled).await?;
            info!("Cancelled online booking {}", cancelled.id);
            Ok(cancelled)
        }
        OnlineBookingStatus::Cancelled => Ok(booking),
        OnlineBookingStatus::Converted => Err(Error::InvalidRequest {
            message: format!("Online booking {booking_id} was already converted"),
        }),
    }
}

/// Promotes an online booking into an appointment.
///
/// The client is found by phone or created. The booking's own subscriber flag is
/// honoured even if no subscription is on record. Converting an already converted
/// booking returns the appointment created the first time.
///
/// # Errors
/// Returns an error if the booking does not exist or was cancelled, or if booking the
/// appointment fails (see [`crate::core::appointment::create_appointment`]).
#[instrument(skip(db, clock, policy))]
pub async fn convert_online_booking(
    db: &DatabaseConnection,
    clock: &ShopClock,
    policy: &PricingPolicy,
    booking_id: i64,
    payment_method: Option<String>,
) -> Result<appointment::Model> {
    let txn = db.begin().await?;
    let booking = require_online_booking(&txn, booking_id).await?;

    match parse_status(&booking)? {
        OnlineBookingStatus::Converted => {
            debug!("Online booking {} already converted", booking_id);
            return Appointment::find()
                .filter(appointment::Column::OnlineBookingId.eq(booking_id))
                .one(&txn)
                .await?
                .ok_or_else(|| Error::InvalidRequest {
                    message: format!(
                        "Online booking {booking_id} is marked converted but has no appointment"
                    ),
                });
        }
        OnlineBookingStatus::Cancelled => {
            return Err(Error::InvalidRequest {
                message: format!("Online booking {booking_id} was cancelled"),
            });
        }
        OnlineBookingStatus::Pending | OnlineBookingStatus::Confirmed => {}
    }

    let client = match booking.client_id {
        Some(client_id) => require_client(&txn, client_id).await?,
        None => {
            find_or_create_client_by_phone(
                &txn,
                &booking.client_name,
                &booking.client_phone,
                booking.is_subscriber,
            )
            .await?
        }
    };

    let service_ids = get_online_booking_services(&txn, booking.id)
        .await?
        .into_iter()
        .map(|line| line.service_id)
        .collect();
    let local = clock.to_local(booking.scheduled_at);

    let appointment = insert_appointment(
        &txn,
        clock,
        policy,
        &NewAppointment {
            client_id: client.id,
            barber_id: booking.barber_id,
            date: local.date(),
            time: local.time(),
            service_ids,
            products: Vec::new(),
            payment_method,
            notes: booking.notes.clone(),
            online_booking_id: Some(booking.id),
            force_subscriber: booking.is_subscriber,
        },
    )
    .await?;

    let mut active: online_booking::ActiveModel = booking.into();
    active.status = Set(OnlineBookingStatus::Converted.as_str().to_string());
    active.client_id = Set(Some(client.id));
    active.update(&txn).await?;

    txn.commit().await?;
    info!(
        "Converted online booking {} into appointment {}",
        booking_id, appointment.id
    );
    Ok(appointment)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::{appointment::create_appointment, commitment::CommitmentSource};
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn request(barber_id: i64, time: &str, service_ids: Vec<i64>) -> NewOnlineBooking {
        NewOnlineBooking {
            client_name: "Pedro".to_string(),
            client_phone: "92977776666".to_string(),
            barber_id,
            date: test_date(),
            time: wall(time),
            service_ids,
            is_subscriber: false,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_create_online_booking_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let clock = test_clock()?;

        let mut missing_phone = request(1, "09:00", vec![1]);
        missing_phone.client_phone = " ".to_string();
        let result = create_online_booking(&db, &clock, &missing_phone).await;
        assert!(matches!(result, Err(Error::InvalidRequest { .. })));

        let result = create_online_booking(&db, &clock, &request(1, "09:00", vec![])).await;
        assert!(matches!(result, Err(Error::InvalidRequest { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_online_booking_occupies_the_agenda() -> Result<()> {
        let shop = setup_test_shop().await?;
        let booking =
            create_online_booking(&shop.db, &shop.clock, &request(shop.barber.id, "15:00", vec![shop.corte.id])).await?;
        assert_eq!(booking.status, "PENDING");
        assert!(booking.client_id.is_none());

        let result = create_appointment(
            &shop.db,
            &shop.clock,
            &PricingPolicy::default(),
            &new_appointment(shop.barber.id, shop.client.id, "15:15", vec![shop.barba.id]),
        )
        .await;
        assert!(matches!(
            result,
            Err(Error::DoubleBooked { with: CommitmentSource::OnlineBooking(id) }) if id == booking.id
        ));

        let range = shop.clock.day_range_utc(test_date(), test_date());
        let bookings = fetch_online_bookings(&shop.db, &shop.clock, range, Some(shop.barber.id)).await?;
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].duration_minutes(), 30);

        // Cancelling frees the slot
        cancel_online_booking(&shop.db, booking.id).await?;
        assert!(fetch_online_bookings(&shop.db, &shop.clock, range, None).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_conversion_is_idempotent_and_honours_subscriber_flag() -> Result<()> {
        let shop = setup_test_shop().await?;
        let mut new = request(shop.barber.id, "16:00", vec![shop.corte.id, shop.barba.id]);
        new.is_subscriber = true;
        let booking = create_online_booking(&shop.db, &shop.clock, &new).await?;
        confirm_online_booking(&shop.db, booking.id).await?;

        let policy = PricingPolicy::default();
        let appointment =
            convert_online_booking(&shop.db, &shop.clock, &policy, booking.id, Some("CASH".to_string())).await?;

        assert_eq!(appointment.online_booking_id, Some(booking.id));
        assert_eq!(appointment.starts_at, booking.scheduled_at);
        assert!(appointment.is_subscription_appointment);
        // Flagged subscriber: "Corte" and "Barba" both match the default terms
        assert_eq!(appointment.total_amount, 0.0);

        let client = find_client_by_phone(&shop.db, "92977776666").await?.unwrap();
        assert_eq!(appointment.client_id, client.id);
        assert!(client.subscriber_flag);

        let converted = get_online_booking_by_id(&shop.db, booking.id).await?.unwrap();
        assert_eq!(converted.status, "CONVERTED");
        assert_eq!(converted.client_id, Some(client.id));

        let again = convert_online_booking(&shop.db, &shop.clock, &policy, booking.id, None).await?;
        assert_eq!(again.id, appointment.id);

        let result = cancel_online_booking(&shop.db, booking.id).await;
        assert!(matches!(result, Err(Error::InvalidRequest { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_cancelled_booking_cannot_be_converted() -> Result<()> {
        let shop = setup_test_shop().await?;
        let booking =
            create_online_booking(&shop.db, &shop.clock, &request(shop.barber.id, "09:00", vec![shop.corte.id])).await?;
        cancel_online_booking(&shop.db, booking.id).await?;

        let result =
            convert_online_booking(&shop.db, &shop.clock, &PricingPolicy::default(), booking.id, None).await;
        assert!(matches!(result, Err(Error::InvalidRequest { .. })));

        let result = convert_online_booking(&shop.db, &shop.clock, &PricingPolicy::default(), 999, None).await;
        assert!(matches!(result, Err(Error::OnlineBookingNotFound { id: 999 })));

        Ok(())
    }
}
