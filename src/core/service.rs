//! Service catalog business logic.
//!
//! Changing a service's price never touches existing appointments: appointment lines
//! carry their own frozen copy of price and duration.

use crate::{
    entities::{Service, service},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use std::collections::HashMap;
use tracing::{info, instrument};

fn check_price(price: f64) -> Result<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(Error::InvalidAmount { amount: price });
    }
    Ok(())
}

/// Creates a new active service.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or whitespace-only
/// - The price is negative or not finite
/// - The duration is not positive
/// - The database insert fails
#[instrument(skip(db))]
pub async fn create_service(
    db: &DatabaseConnection,
    name: String,
    price: f64,
    duration_minutes: i32,
) -> Result<service::Model> {
    if name.trim().is_empty() {
        return Err(Error::InvalidRequest {
            message: "Service name cannot be empty".to_string(),
        });
    }
    check_price(price)?;
    if duration_minutes <= 0 {
        return Err(Error::InvalidInterval {
            message: format!("service duration must be positive, got {duration_minutes} minutes"),
        });
    }

    let service = service::ActiveModel {
        name: Set(name.trim().to_string()),
        price: Set(price),
        duration_minutes: Set(duration_minutes),
        is_active: Set(true),
        ..Default::default()
    };
    let service = service.insert(db).await?;
    info!("Created service {} ({})", service.name, service.id);
    Ok(service)
}

/// Retrieves all active services, ordered by name.
pub async fn fetch_active_services(db: &DatabaseConnection) -> Result<Vec<service::Model>> {
    Service::find()
        .filter(service::Column::IsActive.eq(true))
        .order_by_asc(service::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Loads the services named by `service_ids`, in the order given.
///
/// Repeated ids yield repeated entries.
///
/// # Errors
/// Returns `ServiceNotFound` for the first id that does not exist or is inactive.
pub async fn fetch_services_by_ids<C>(conn: &C, service_ids: &[i64]) -> Result<Vec<service::Model>>
where
    C: ConnectionTrait,
{
    let found: HashMap<i64, service::Model> = Service::find()
        .filter(service::Column::Id.is_in(service_ids.iter().copied()))
        .filter(service::Column::IsActive.eq(true))
        .all(conn)
        .await?
        .into_iter()
        .map(|service| (service.id, service))
        .collect();

    service_ids
        .iter()
        .map(|id| {
            found
                .get(id)
                .cloned()
                .ok_or(Error::ServiceNotFound { id: *id })
        })
        .collect()
}

/// Changes a service's list price for future bookings.
#[instrument(skip(db))]
pub async fn update_service_price(
    db: &DatabaseConnection,
    service_id: i64,
    new_price: f64,
) -> Result<service::Model> {
    check_price(new_price)?;

    let mut service: service::ActiveModel = Service::find_by_id(service_id)
        .one(db)
        .await?
        .ok_or(Error::ServiceNotFound { id: service_id })?
        .into();
    service.price = Set(new_price);
    service.update(db).await.map_err(Into::into)
}
