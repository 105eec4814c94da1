//! Barber business logic - Reference data for the professionals being scheduled.
//!
//! Barbers are never hard-deleted; deactivating one hides them from the agenda while
//! keeping their appointment history intact.

use crate::{
    entities::{Barber, barber},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{info, instrument};

fn check_rate(rate: f64) -> Result<f64> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(Error::InvalidAmount { amount: rate });
    }
    Ok(rate)
}

/// Creates a new barber with their compensation settings.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or whitespace-only
/// - A rate is negative or not finite, or a percentage exceeds 100
/// - The database insert fails
#[instrument(skip(db))]
pub async fn create_barber(
    db: &DatabaseConnection,
    name: String,
    commission_rate: f64,
    hourly_rate: Option<f64>,
    subscription_commission_rate: Option<f64>,
) -> Result<barber::Model> {
    if name.trim().is_empty() {
        return Err(Error::InvalidRequest {
            message: "Barber name cannot be empty".to_string(),
        });
    }

    for rate in std::iter::once(commission_rate).chain(subscription_commission_rate) {
        if check_rate(rate)? > 100.0 {
            return Err(Error::InvalidAmount { amount: rate });
        }
    }
    if let Some(rate) = hourly_rate {
        check_rate(rate)?;
    }

    let barber = barber::ActiveModel {
        name: Set(name.trim().to_string()),
        commission_rate: Set(commission_rate),
        hourly_rate: Set(hourly_rate),
        subscription_commission_rate: Set(subscription_commission_rate),
        is_active: Set(true),
        created_at: Set(chrono::Utc::now().naive_utc()),
        ..Default::default()
    };
    let barber = barber.insert(db).await?;
    info!("Created barber {} ({})", barber.name, barber.id);
    Ok(barber)
}

/// Retrieves a barber by id, active or not.
pub async fn get_barber_by_id<C>(conn: &C, barber_id: i64) -> Result<Option<barber::Model>>
where
    C: ConnectionTrait,
{
    Barber::find_by_id(barber_id)
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Loads a barber that can take bookings.
///
/// # Errors
/// Returns `BarberNotFound` if the barber does not exist or is inactive.
pub async fn require_active_barber<C>(conn: &C, barber_id: i64) -> Result<barber::Model>
where
    C: ConnectionTrait,
{
    get_barber_by_id(conn, barber_id)
        .await?
        .filter(|barber| barber.is_active)
        .ok_or(Error::BarberNotFound { id: barber_id })
}

/// Retrieves all active barbers, ordered alphabetically by name.
pub async fn fetch_barbers<C>(conn: &C) -> Result<Vec<barber::Model>>
where
    C: ConnectionTrait,
{
    Barber::find()
        .filter(barber::Column::IsActive.eq(true))
        .order_by_asc(barber::Column::Name)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Marks a barber inactive so they no longer appear on the agenda.
#[instrument(skip(db))]
pub async fn deactivate_barber(db: &DatabaseConnection, barber_id: i64) -> Result<barber::Model> {
    let mut barber: barber::ActiveModel = require_active_barber(db, barber_id).await?.into();
    barber.is_active = Set(false);
    let barber = barber.update(db).await?;
    info!("Deactivated barber {}", barber.id);
    Ok(barber)
}
