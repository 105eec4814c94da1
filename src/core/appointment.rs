//! Appointment business logic - Booking, re-pricing, completing and cancelling.
//!
//! Every mutation runs inside one database transaction: the agenda is read, the
//! placement validated and the rows written before commit. The partial unique index on
//! `(barber_id, starts_at)` catches the races in-memory validation cannot, and those
//! surface as `StaleState`.
//!
//! Service and product lines copy their price (and duration) when they are written.
//! Later catalog changes never reach an existing appointment.

use crate::{
    core::{
        barber::{get_barber_by_id, require_active_barber},
        client::require_client,
        clock::ShopClock,
        commitment::{AdminAppointment, Booking, CommitmentSource},
        conflict::PlacementRequest,
        pricing::{self, BarberRates, PricingPolicy, ProductLine, Quote, ServiceLine, SubscriberStatus},
        product::{
            ProductRequest, load_products_for_sale, merge_product_requests, restore_stock,
            withdraw_stock,
        },
        schedule::load_snapshot_around,
        service::fetch_services_by_ids,
        subscription::subscriber_status_for,
    },
    entities::{
        Appointment, AppointmentProduct, AppointmentService, Commission, appointment,
        appointment_product, appointment_service, commission, product, service,
    },
    errors::{Error, Result},
    models::AppointmentStatus,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sea_orm::{QueryOrder, Set, SqlErr, TransactionTrait, prelude::*};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

/// Status written on commission records when an appointment is completed.
const COMMISSION_PENDING: &str = "PENDING";

/// Everything needed to book an appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    /// Client being served
    pub client_id: i64,
    /// Barber to book
    pub barber_id: i64,
    /// Local calendar day
    pub date: NaiveDate,
    /// Local start time
    pub time: NaiveTime,
    /// Services, at least one
    pub service_ids: Vec<i64>,
    /// Products sold with the appointment
    pub products: Vec<ProductRequest>,
    /// Payment method, if already known
    pub payment_method: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Online booking being converted, if any
    pub online_booking_id: Option<i64>,
    /// Treat the client as a subscriber even without a subscription on record
    pub force_subscriber: bool,
}

/// Maps a unique-index violation on the agenda to `StaleState`.
pub(crate) fn slot_taken(err: DbErr, barber_id: i64) -> Error {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        warn!("Agenda for barber {} changed underneath the write", barber_id);
        Error::StaleState { barber_id }
    } else {
        Error::Database(err)
    }
}

fn service_line(service: &service::Model) -> ServiceLine {
    ServiceLine {
        service_id: service.id,
        name: service.name.clone(),
        price: service.price,
        duration_minutes: i64::from(service.duration_minutes),
    }
}

fn product_line(product: &product::Model, quantity: i32) -> ProductLine {
    ProductLine {
        product_id: product.id,
        quantity,
        unit_price: product.price,
    }
}

fn ensure_scheduled(appointment: &appointment::Model) -> Result<()> {
    let status: AppointmentStatus = appointment.status.parse()?;
    if status != AppointmentStatus::Scheduled {
        return Err(Error::NotScheduled {
            appointment_id: appointment.id,
            status: appointment.status.clone(),
        });
    }
    Ok(())
}

/// Retrieves an appointment by id.
pub async fn get_appointment_by_id<C>(conn: &C, appointment_id: i64) -> Result<Option<appointment::Model>>
where
    C: ConnectionTrait,
{
    Appointment::find_by_id(appointment_id)
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Loads an appointment or fails with `AppointmentNotFound`.
pub async fn require_appointment<C>(conn: &C, appointment_id: i64) -> Result<appointment::Model>
where
    C: ConnectionTrait,
{
    get_appointment_by_id(conn, appointment_id)
        .await?
        .ok_or(Error::AppointmentNotFound { id: appointment_id })
}

/// Service lines of an appointment in insertion order.
pub async fn get_service_lines<C>(conn: &C, appointment_id: i64) -> Result<Vec<appointment_service::Model>>
where
    C: ConnectionTrait,
{
    AppointmentService::find()
        .filter(appointment_service::Column::AppointmentId.eq(appointment_id))
        .order_by_asc(appointment_service::Column::Id)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Product lines of an appointment in insertion order.
pub async fn get_product_lines<C>(conn: &C, appointment_id: i64) -> Result<Vec<appointment_product::Model>>
where
    C: ConnectionTrait,
{
    AppointmentProduct::find()
        .filter(appointment_product::Column::AppointmentId.eq(appointment_id))
        .order_by_asc(appointment_product::Column::Id)
        .all(conn)
        .await
        .map_err(Into::into)
}

async fn service_minutes_by_appointment<C>(conn: &C, ids: Vec<i64>) -> Result<HashMap<i64, Vec<i64>>>
where
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let lines = AppointmentService::find()
        .filter(appointment_service::Column::AppointmentId.is_in(ids))
        .order_by_asc(appointment_service::Column::Id)
        .all(conn)
        .await?;

    let mut minutes: HashMap<i64, Vec<i64>> = HashMap::new();
    for line in lines {
        minutes
            .entry(line.appointment_id)
            .or_default()
            .push(i64::from(line.duration_minutes));
    }
    Ok(minutes)
}

/// Projects a stored appointment into the engine's booking type.
pub fn to_booking(
    clock: &ShopClock,
    appointment: &appointment::Model,
    service_minutes: Vec<i64>,
) -> Result<Booking> {
    Ok(Booking::Admin(AdminAppointment {
        id: appointment.id,
        barber_id: appointment.barber_id,
        starts_at: clock.to_local(appointment.starts_at),
        status: appointment.status.parse()?,
        service_minutes,
        online_booking_id: appointment.online_booking_id,
    }))
}

/// Loads one appointment together with its engine projection.
pub async fn load_booking<C>(
    conn: &C,
    clock: &ShopClock,
    appointment_id: i64,
) -> Result<(appointment::Model, Booking)>
where
    C: ConnectionTrait,
{
    let appointment = require_appointment(conn, appointment_id).await?;
    let minutes = get_service_lines(conn, appointment_id)
        .await?
        .into_iter()
        .map(|line| i64::from(line.duration_minutes))
        .collect();
    let booking = to_booking(clock, &appointment, minutes)?;
    Ok((appointment, booking))
}

/// Non-cancelled appointments starting within `[start, end)`, optionally for one barber.
///
/// Rows with an unreadable status are skipped with a warning.
pub async fn fetch_appointments<C>(
    conn: &C,
    clock: &ShopClock,
    range: (DateTime<Utc>, DateTime<Utc>),
    barber_id: Option<i64>,
) -> Result<Vec<Booking>>
where
    C: ConnectionTrait,
{
    let (start, end) = range;
    let mut query = Appointment::find()
        .filter(appointment::Column::StartsAt.gte(start))
        .filter(appointment::Column::StartsAt.lt(end))
        .filter(appointment::Column::Status.ne(AppointmentStatus::Canceled.as_str()))
        .order_by_asc(appointment::Column::StartsAt);
    if let Some(barber_id) = barber_id {
        query = query.filter(appointment::Column::BarberId.eq(barber_id));
    }
    let appointments = query.all(conn).await?;

    let mut minutes =
        service_minutes_by_appointment(conn, appointments.iter().map(|a| a.id).collect()).await?;

    Ok(appointments
        .iter()
        .filter_map(|appointment| {
            let lines = minutes.remove(&appointment.id).unwrap_or_default();
            match to_booking(clock, appointment, lines) {
                Ok(booking) => Some(booking),
                Err(e) => {
                    warn!("Skipping appointment {}: {}", appointment.id, e);
                    None
                }
            }
        })
        .filter(Booking::occupies_agenda)
        .collect())
}

async fn priced_lines<C>(
    conn: &C,
    service_ids: &[i64],
    products: &[ProductRequest],
) -> Result<(Vec<service::Model>, Vec<(product::Model, i32)>)>
where
    C: ConnectionTrait,
{
    let services = fetch_services_by_ids(conn, service_ids).await?;
    let sold = load_products_for_sale(conn, products).await?;
    Ok((services, sold))
}

fn quote_for(
    services: &[service::Model],
    sold: &[(product::Model, i32)],
    rates: BarberRates,
    status: &SubscriberStatus,
    policy: &PricingPolicy,
) -> Result<Quote> {
    let service_lines: Vec<ServiceLine> = services.iter().map(service_line).collect();
    let product_lines: Vec<ProductLine> = sold
        .iter()
        .map(|(product, quantity)| product_line(product, *quantity))
        .collect();
    Ok(pricing::resolve(&service_lines, &product_lines, rates, status, policy)?.rounded())
}

async fn write_lines<C>(
    conn: &C,
    appointment_id: i64,
    services: &[service::Model],
    quote: &Quote,
    sold: &[(product::Model, i32)],
) -> Result<()>
where
    C: ConnectionTrait,
{
    for (service, priced) in services.iter().zip(&quote.lines) {
        appointment_service::ActiveModel {
            appointment_id: Set(appointment_id),
            service_id: Set(service.id),
            price: Set(priced.charged_price),
            duration_minutes: Set(service.duration_minutes),
            ..Default::default()
        }
        .insert(conn)
        .await?;
    }

    for (product, quantity) in sold {
        withdraw_stock(conn, product, *quantity).await?;
        appointment_product::ActiveModel {
            appointment_id: Set(appointment_id),
            product_id: Set(product.id),
            quantity: Set(*quantity),
            unit_price: Set(product.price),
            ..Default::default()
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

async fn release_products<C>(conn: &C, appointment_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    for line in get_product_lines(conn, appointment_id).await? {
        restore_stock(conn, line.product_id, line.quantity).await?;
    }
    AppointmentProduct::delete_many()
        .filter(appointment_product::Column::AppointmentId.eq(appointment_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Books an appointment on an open connection or transaction.
///
/// Used directly by online booking conversion, which needs the insert to share its
/// transaction. Everyone else should call [`create_appointment`].
pub async fn insert_appointment<C>(
    conn: &C,
    clock: &ShopClock,
    policy: &PricingPolicy,
    new: &NewAppointment,
) -> Result<appointment::Model>
where
    C: ConnectionTrait,
{
    if new.service_ids.is_empty() {
        return Err(Error::InvalidRequest {
            message: "An appointment needs at least one service".to_string(),
        });
    }
    let products = merge_product_requests(&new.products)?;

    let barber = require_active_barber(conn, new.barber_id).await?;
    let client = require_client(conn, new.client_id).await?;
    let (services, sold) = priced_lines(conn, &new.service_ids, &products).await?;

    let mut status = subscriber_status_for(conn, &client).await?;
    if new.force_subscriber && !status.is_subscriber() {
        status = SubscriberStatus::Flagged;
    }
    let quote = quote_for(&services, &sold, BarberRates::from(&barber), &status, policy)?;

    let snapshot = load_snapshot_around(conn, clock, new.date, Some(barber.id)).await?;
    PlacementRequest {
        barber_id: barber.id,
        date: new.date,
        start_time: new.time,
        duration_minutes: quote.duration_minutes,
        exclude: new.online_booking_id.map(CommitmentSource::OnlineBooking),
    }
    .validate(&snapshot)?;

    let now = Utc::now();
    let appointment = appointment::ActiveModel {
        starts_at: Set(clock.at(new.date, new.time)),
        client_id: Set(client.id),
        barber_id: Set(barber.id),
        payment_method: Set(new.payment_method.clone()),
        status: Set(AppointmentStatus::Scheduled.as_str().to_string()),
        total_amount: Set(quote.total_amount),
        commission_amount: Set(quote.commission_amount),
        is_subscription_appointment: Set(quote.is_subscriber),
        notes: Set(new.notes.clone()),
        online_booking_id: Set(new.online_booking_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(|e| slot_taken(e, barber.id))?;

    write_lines(conn, appointment.id, &services, &quote, &sold).await?;

    debug!(
        "Priced appointment {}: total {} commission {} ({:?})",
        appointment.id, quote.total_amount, quote.commission_amount, quote.model
    );
    Ok(appointment)
}

/// Books an appointment after validating its placement and resolving its price.
///
/// # Errors
/// Returns an error if:
/// - No services were given, or a product quantity is not positive
/// - The barber, client, a service or a product does not exist
/// - A product does not have enough stock
/// - The slot is blocked or already booked
/// - Another booking took the slot concurrently (`StaleState`)
#[instrument(skip_all, fields(barber_id = new.barber_id, date = %new.date, time = %new.time))]
pub async fn create_appointment(
    db: &DatabaseConnection,
    clock: &ShopClock,
    policy: &PricingPolicy,
    new: &NewAppointment,
) -> Result<appointment::Model> {
    if new.service_ids.is_empty() {
        return Err(Error::InvalidRequest {
            message: "An appointment needs at least one service".to_string(),
        });
    }

    let txn = db.begin().await?;
    let appointment = insert_appointment(&txn, clock, policy, new).await?;
    txn.commit().await?;

    info!(
        "Booked appointment {} for barber {} at {}",
        appointment.id, appointment.barber_id, appointment.starts_at
    );
    Ok(appointment)
}

/// Replaces the service and product lines of a scheduled appointment and re-prices it.
///
/// New lines copy current catalog prices. Placement is re-validated only when the new
/// lines make the appointment longer.
#[instrument(skip(db, clock, policy))]
pub async fn update_appointment_lines(
    db: &DatabaseConnection,
    clock: &ShopClock,
    policy: &PricingPolicy,
    appointment_id: i64,
    service_ids: &[i64],
    products: &[ProductRequest],
) -> Result<appointment::Model> {
    if service_ids.is_empty() {
        return Err(Error::InvalidRequest {
            message: "An appointment needs at least one service".to_string(),
        });
    }
    let products = merge_product_requests(products)?;

    let txn = db.begin().await?;
    let (appointment, booking) = load_booking(&txn, clock, appointment_id).await?;
    ensure_scheduled(&appointment)?;

    let barber = get_barber_by_id(&txn, appointment.barber_id)
        .await?
        .ok_or(Error::BarberNotFound {
            id: appointment.barber_id,
        })?;
    let client = require_client(&txn, appointment.client_id).await?;

    release_products(&txn, appointment.id).await?;
    AppointmentService::delete_many()
        .filter(appointment_service::Column::AppointmentId.eq(appointment.id))
        .exec(&txn)
        .await?;

    let (services, sold) = priced_lines(&txn, service_ids, &products).await?;
    let mut status = subscriber_status_for(&txn, &client).await?;
    if appointment.is_subscription_appointment && !status.is_subscriber() {
        status = SubscriberStatus::Flagged;
    }
    let quote = quote_for(&services, &sold, BarberRates::from(&barber), &status, policy)?;

    if quote.duration_minutes > booking.duration_minutes() {
        let start = booking.starts_at();
        let snapshot = load_snapshot_around(&txn, clock, start.date(), Some(barber.id)).await?;
        PlacementRequest {
            barber_id: barber.id,
            date: start.date(),
            start_time: start.time(),
            duration_minutes: quote.duration_minutes,
            exclude: Some(booking.source()),
        }
        .validate(&snapshot)?;
    }

    write_lines(&txn, appointment.id, &services, &quote, &sold).await?;

    let mut active: appointment::ActiveModel = appointment.into();
    active.total_amount = Set(quote.total_amount);
    active.commission_amount = Set(quote.commission_amount);
    active.is_subscription_appointment = Set(quote.is_subscriber);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    info!("Updated lines of appointment {}", updated.id);
    Ok(updated)
}

/// Completes a scheduled appointment and records the barber's commission.
///
/// No commission record is written when nothing is owed. Financial fields are frozen
/// from here on.
#[instrument(skip(db))]
pub async fn complete_appointment(
    db: &DatabaseConnection,
    appointment_id: i64,
    payment_method: Option<String>,
) -> Result<appointment::Model> {
    let txn = db.begin().await?;
    let appointment = require_appointment(&txn, appointment_id).await?;
    ensure_scheduled(&appointment)?;

    let now = Utc::now();
    if appointment.commission_amount > 0.0 {
        commission::ActiveModel {
            appointment_id: Set(appointment.id),
            barber_id: Set(appointment.barber_id),
            amount: Set(appointment.commission_amount),
            status: Set(COMMISSION_PENDING.to_string()),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    } else {
        debug!("No commission owed for appointment {}", appointment.id);
    }

    let mut active: appointment::ActiveModel = appointment.into();
    active.status = Set(AppointmentStatus::Completed.as_str().to_string());
    if payment_method.is_some() {
        active.payment_method = Set(payment_method);
    }
    active.updated_at = Set(now);
    let completed = active.update(&txn).await?;

    txn.commit().await?;
    info!(
        "Completed appointment {} with commission {}",
        completed.id, completed.commission_amount
    );
    Ok(completed)
}

/// Cancels a scheduled appointment, freeing its slot and returning sold products to stock.
#[instrument(skip(db))]
pub async fn cancel_appointment(
    db: &DatabaseConnection,
    appointment_id: i64,
) -> Result<appointment::Model> {
    let txn = db.begin().await?;
    let appointment = require_appointment(&txn, appointment_id).await?;
    ensure_scheduled(&appointment)?;

    for line in get_product_lines(&txn, appointment.id).await? {
        restore_stock(&txn, line.product_id, line.quantity).await?;
    }

    let mut active: appointment::ActiveModel = appointment.into();
    active.status = Set(AppointmentStatus::Canceled.as_str().to_string());
    active.updated_at = Set(Utc::now());
    let cancelled = active.update(&txn).await?;

    txn.commit().await?;
    info!("Cancelled appointment {}", cancelled.id);
    Ok(cancelled)
}

/// Deletes an appointment in any status, along with its lines and commission.
///
/// Products of a still-scheduled appointment go back to stock.
#[instrument(skip(db))]
pub async fn delete_appointment(db: &DatabaseConnection, appointment_id: i64) -> Result<()> {
    let txn = db.begin().await?;
    let appointment = require_appointment(&txn, appointment_id).await?;

    if ensure_scheduled(&appointment).is_ok() {
        release_products(&txn, appointment.id).await?;
    } else {
        AppointmentProduct::delete_many()
            .filter(appointment_product::Column::AppointmentId.eq(appointment.id))
            .exec(&txn)
            .await?;
    }
    AppointmentService::delete_many()
        .filter(appointment_service::Column::AppointmentId.eq(appointment.id))
        .exec(&txn)
        .await?;
    Commission::delete_many()
        .filter(commission::Column::AppointmentId.eq(appointment.id))
        .exec(&txn)
        .await?;
    Appointment::delete_by_id(appointment.id).exec(&txn).await?;

    txn.commit().await?;
    info!("Deleted appointment {}", appointment_id);
    Ok(())
}

/// Appointments of a barber on one local day, in start order. Includes cancelled ones.
pub async fn get_appointments_for_day(
    db: &DatabaseConnection,
    clock: &ShopClock,
    barber_id: i64,
    date: NaiveDate,
) -> Result<Vec<appointment::Model>> {
    let start = clock.at(date, NaiveTime::MIN);
    Appointment::find()
        .filter(appointment::Column::BarberId.eq(barber_id))
        .filter(appointment::Column::StartsAt.gte(start))
        .filter(appointment::Column::StartsAt.lt(start + Duration::days(1)))
        .order_by_asc(appointment::Column::StartsAt)
        .all(db)
        .await
        .map_err(Into::into)
}
