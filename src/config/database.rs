//! Database configuration module for the scheduling engine.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust structs.
//! On top of that it installs the partial unique index that backs the double-booking
//! defense at the persistence layer.

use crate::entities::{
    Appointment, AppointmentProduct, AppointmentService, Barber, Client, Commission,
    OnlineBooking, OnlineBookingService, Product, ScheduleBlock, Service, Subscription,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/barbershop.sqlite?mode=rwc";

/// At most one live appointment may start at a given instant for a barber.
const APPOINTMENT_SLOT_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS \
     idx_appointments_barber_start ON appointments (barber_id, starts_at) \
     WHERE status <> 'CANCELED'";

/// Gets the database URL from environment variable or returns default `SQLite` path.
///
/// This function looks for `DATABASE_URL` in the environment and falls back to
/// a default local `SQLite` file if not found.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
///
/// Falls back to a default local `SQLite` file if no environment variable is set.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to database at {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

async fn create_table_for<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all necessary database tables and indexes.
///
/// Parents are created before the tables that reference them. Safe to call on an
/// existing database.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table_for(db, &schema, Barber).await?;
    create_table_for(db, &schema, Client).await?;
    create_table_for(db, &schema, Service).await?;
    create_table_for(db, &schema, Product).await?;
    create_table_for(db, &schema, Subscription).await?;
    create_table_for(db, &schema, OnlineBooking).await?;
    create_table_for(db, &schema, OnlineBookingService).await?;
    create_table_for(db, &schema, Appointment).await?;
    create_table_for(db, &schema, AppointmentService).await?;
    create_table_for(db, &schema, AppointmentProduct).await?;
    create_table_for(db, &schema, ScheduleBlock).await?;
    create_table_for(db, &schema, Commission).await?;

    db.execute_unprepared(APPOINTMENT_SLOT_INDEX).await?;

    info!("Database tables ensured");
    Ok(())
}
