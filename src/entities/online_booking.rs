//! Online booking entity - A booking made on the public booking page.
//!
//! Pending and confirmed bookings occupy the agenda but cannot be moved until they
//! are converted into an appointment.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Online booking database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "online_bookings")]
pub struct Model {
    /// Unique identifier for the booking
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Known client, if the phone matched one at booking time
    pub client_id: Option<i64>,
    /// Name typed on the booking page
    pub client_name: String,
    /// Phone typed on the booking page
    pub client_phone: String,
    /// Requested barber
    pub barber_id: i64,
    /// Requested start instant (UTC)
    pub scheduled_at: DateTimeUtc,
    /// `"PENDING"`, `"CONFIRMED"`, `"CANCELLED"` or `"CONVERTED"`
    pub status: String,
    /// Client declared themselves a subscriber
    pub is_subscriber: bool,
    /// Free-form notes from the client
    pub notes: Option<String>,
    /// When the booking was received
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `OnlineBooking` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One booking has many requested services
    #[sea_orm(has_many = "super::online_booking_service::Entity")]
    Services,
}

impl Related<super::online_booking_service::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Services.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
