//! Client business logic.
//!
//! Clients are identified by phone number when bookings arrive from the public page,
//! so phone lookups are exact matches on the trimmed value.

use crate::{
    entities::{Client, client},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{debug, info, instrument};

/// Creates a new client.
///
/// # Errors
/// Returns an error if the name or phone is blank, or the insert fails.
#[instrument(skip(conn))]
pub async fn create_client<C>(
    conn: &C,
    name: String,
    phone: String,
    subscriber_flag: bool,
) -> Result<client::Model>
where
    C: ConnectionTrait,
{
    if name.trim().is_empty() {
        return Err(Error::InvalidRequest {
            message: "Client name cannot be empty".to_string(),
        });
    }
    if phone.trim().is_empty() {
        return Err(Error::InvalidRequest {
            message: "Client phone cannot be empty".to_string(),
        });
    }

    let client = client::ActiveModel {
        name: Set(name.trim().to_string()),
        phone: Set(phone.trim().to_string()),
        subscriber_flag: Set(subscriber_flag),
        created_at: Set(chrono::Utc::now().naive_utc()),
        ..Default::default()
    };
    let client = client.insert(conn).await?;
    info!("Created client {} ({})", client.name, client.id);
    Ok(client)
}

/// Retrieves a client by id.
pub async fn get_client_by_id<C>(conn: &C, client_id: i64) -> Result<Option<client::Model>>
where
    C: ConnectionTrait,
{
    Client::find_by_id(client_id)
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Loads a client or fails with `ClientNotFound`.
pub async fn require_client<C>(conn: &C, client_id: i64) -> Result<client::Model>
where
    C: ConnectionTrait,
{
    get_client_by_id(conn, client_id)
        .await?
        .ok_or(Error::ClientNotFound { id: client_id })
}

/// Finds the oldest client registered with `phone`.
pub async fn find_client_by_phone<C>(conn: &C, phone: &str) -> Result<Option<client::Model>>
where
    C: ConnectionTrait,
{
    Client::find()
        .filter(client::Column::Phone.eq(phone.trim()))
        .order_by_asc(client::Column::Id)
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Returns the client registered with `phone`, creating one when none exists.
///
/// A newly created client takes `subscriber_flag` as given; an existing client is
/// returned unchanged.
pub async fn find_or_create_client_by_phone<C>(
    conn: &C,
    name: &str,
    phone: &str,
    subscriber_flag: bool,
) -> Result<client::Model>
where
    C: ConnectionTrait,
{
    if let Some(client) = find_client_by_phone(conn, phone).await? {
        debug!("Matched client {} by phone", client.id);
        return Ok(client);
    }
    create_client(conn, name.to_string(), phone.to_string(), subscriber_flag).await
}

/// Sets or clears the manual subscriber flag.
#[instrument(skip(db))]
pub async fn set_subscriber_flag(
    db: &DatabaseConnection,
    client_id: i64,
    subscriber_flag: bool,
) -> Result<client::Model> {
    let mut client: client::ActiveModel = require_client(db, client_id).await?.into();
    client.subscriber_flag = Set(subscriber_flag);
    client.update(db).await.map_err(Into::into)
}
