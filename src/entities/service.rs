//! Service entity - Reference data for what a barber can do.
//!
//! Price and duration are copied onto appointment lines when they are created, so
//! changing a service never alters existing appointments.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Service database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "services")]
pub struct Model {
    /// Unique identifier for the service
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name of the service (e.g., "Corte", "Barba")
    pub name: String,
    /// Current list price
    pub price: f64,
    /// How long the service takes, in minutes
    pub duration_minutes: i32,
    /// Inactive services cannot be booked
    pub is_active: bool,
}

/// `Service` is referenced by line tables only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
