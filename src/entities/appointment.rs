//! Appointment entity - A booking on a barber's agenda.
//!
//! `starts_at` is stored in UTC; all wall-clock reasoning goes through
//! [`crate::core::clock::ShopClock`]. Financial fields are resolved at creation and
//! frozen once the appointment is completed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Appointment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "appointments")]
pub struct Model {
    /// Unique identifier for the appointment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Start instant (UTC)
    pub starts_at: DateTimeUtc,
    /// Client being served
    pub client_id: i64,
    /// Barber serving the client
    pub barber_id: i64,
    /// How the client pays (e.g., `"PIX"`, `"CASH"`), if known yet
    pub payment_method: Option<String>,
    /// `"SCHEDULED"`, `"COMPLETED"` or `"CANCELED"`
    pub status: String,
    /// Sum of waived service prices and product subtotals
    pub total_amount: f64,
    /// Commission owed to the barber
    pub commission_amount: f64,
    /// Whether the client counted as a subscriber when priced
    pub is_subscription_appointment: bool,
    /// Free-form notes
    pub notes: Option<String>,
    /// Online booking this appointment was converted from
    pub online_booking_id: Option<i64>,
    /// When the appointment was created
    pub created_at: DateTimeUtc,
    /// When the appointment was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Appointment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each appointment belongs to one barber
    #[sea_orm(
        belongs_to = "super::barber::Entity",
        from = "Column::BarberId",
        to = "super::barber::Column::Id"
    )]
    Barber,
    /// One appointment has many service lines
    #[sea_orm(has_many = "super::appointment_service::Entity")]
    Services,
    /// One appointment has many product lines
    #[sea_orm(has_many = "super::appointment_product::Entity")]
    Products,
}

impl Related<super::barber::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Barber.def()
    }
}

impl Related<super::appointment_service::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Services.def()
    }
}

impl Related<super::appointment_product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
