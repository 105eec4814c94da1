//! Shared test utilities for the scheduling engine.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    config::shop::{ShopConfig, parse_config},
    core::{
        appointment::NewAppointment, barber, client, clock::ShopClock, clock::parse_wall_clock,
        service,
    },
    entities,
    errors::Result,
};
use chrono::{NaiveDate, NaiveTime};
use sea_orm::DatabaseConnection;
use tracing_subscriber::EnvFilter;

/// Shop configuration used by tests: Manaus offset, Monday to Saturday 09:00-19:00
/// in 30 minute ticks, Sunday closed.
const TEST_CONFIG: &str = r#"
utc_offset_minutes = -240
slot_minutes = 30
minimum_notice_hours = 2
advance_booking_days = 30

[week.monday]
opens = "09:00"
closes = "19:00"

[week.tuesday]
opens = "09:00"
closes = "19:00"

[week.wednesday]
opens = "09:00"
closes = "19:00"

[week.thursday]
opens = "09:00"
closes = "19:00"

[week.friday]
opens = "09:00"
closes = "19:00"

[week.saturday]
opens = "09:00"
closes = "19:00"
"#;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Installs a test subscriber so `tracing` output shows up with `--nocapture`.
/// Safe to call from several tests.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace")))
        .with_test_writer()
        .try_init();
}

/// Parsed test shop configuration.
pub fn test_config() -> Result<ShopConfig> {
    parse_config(TEST_CONFIG)
}

/// Clock for the test shop (UTC-4).
pub fn test_clock() -> Result<ShopClock> {
    ShopClock::from_offset_minutes(-240)
}

/// Monday 2024-06-10, the day most tests book on.
pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).unwrap_or_default()
}

/// Parses `"HH:MM"` for tests. Panics on malformed input.
#[allow(clippy::unwrap_used)]
pub fn wall(value: &str) -> NaiveTime {
    parse_wall_clock(value).unwrap()
}

/// Creates a test barber with sensible defaults.
///
/// # Defaults
/// * `commission_rate`: 50%
/// * `hourly_rate`: None
/// * `subscription_commission_rate`: None
pub async fn create_test_barber(db: &DatabaseConnection, name: &str) -> Result<entities::barber::Model> {
    barber::create_barber(db, name.to_string(), 50.0, None, None).await
}

/// Creates a test barber with custom pay rates.
pub async fn create_custom_barber(
    db: &DatabaseConnection,
    name: &str,
    commission_rate: f64,
    hourly_rate: Option<f64>,
    subscription_commission_rate: Option<f64>,
) -> Result<entities::barber::Model> {
    barber::create_barber(
        db,
        name.to_string(),
        commission_rate,
        hourly_rate,
        subscription_commission_rate,
    )
    .await
}

/// Creates a test client that is not flagged as a subscriber.
pub async fn create_test_client(
    db: &DatabaseConnection,
    name: &str,
    phone: &str,
) -> Result<entities::client::Model> {
    client::create_client(db, name.to_string(), phone.to_string(), false).await
}

/// Creates a test service.
pub async fn create_test_service(
    db: &DatabaseConnection,
    name: &str,
    price: f64,
    duration_minutes: i32,
) -> Result<entities::service::Model> {
    service::create_service(db, name.to_string(), price, duration_minutes).await
}

/// A ready-to-book shop: one barber, one client and two services.
pub struct TestShop {
    /// In-memory database
    pub db: DatabaseConnection,
    /// UTC-4 shop clock
    pub clock: ShopClock,
    /// "Ana", 50% commission
    pub barber: entities::barber::Model,
    /// "João", not a subscriber
    pub client: entities::client::Model,
    /// "Corte", 40.00, 30 minutes
    pub corte: entities::service::Model,
    /// "Barba", 25.00, 20 minutes
    pub barba: entities::service::Model,
}

/// Sets up a complete test environment for booking tests.
pub async fn setup_test_shop() -> Result<TestShop> {
    let db = setup_test_db().await?;
    let barber = create_test_barber(&db, "Ana").await?;
    let client = create_test_client(&db, "João", "92999990000").await?;
    let corte = create_test_service(&db, "Corte", 40.0, 30).await?;
    let barba = create_test_service(&db, "Barba", 25.0, 20).await?;
    Ok(TestShop {
        db,
        clock: test_clock()?,
        barber,
        client,
        corte,
        barba,
    })
}

/// Appointment on [`test_date`] at `time` with no products, notes or payment.
pub fn new_appointment(barber_id: i64, client_id: i64, time: &str, service_ids: Vec<i64>) -> NewAppointment {
    NewAppointment {
        client_id,
        barber_id,
        date: test_date(),
        time: wall(time),
        service_ids,
        products: Vec::new(),
        payment_method: None,
        notes: None,
        online_booking_id: None,
        force_subscriber: false,
    }
}
