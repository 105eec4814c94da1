//! Barber entity - A professional whose agenda is scheduled.
//!
//! Carries the compensation model used by the commission resolver: a percentage of
//! revenue for standard clients and an optional hourly rate for subscribers.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Barber database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "barbers")]
pub struct Model {
    /// Unique identifier for the barber
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Percentage of revenue paid for standard clients (0-100)
    pub commission_rate: f64,
    /// Hourly pay for subscriber appointments, if configured
    pub hourly_rate: Option<f64>,
    /// Percentage override for subscriber appointments without an hourly rate
    pub subscription_commission_rate: Option<f64>,
    /// Inactive barbers are hidden from the agenda
    pub is_active: bool,
    /// When the barber was registered
    pub created_at: DateTime,
}

/// Defines relationships between Barber and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One barber has many appointments
    #[sea_orm(has_many = "super::appointment::Entity")]
    Appointments,
    /// One barber has many schedule blocks
    #[sea_orm(has_many = "super::schedule_block::Entity")]
    ScheduleBlocks,
}

impl Related<super::appointment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Appointments.def()
    }
}

impl Related<super::schedule_block::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScheduleBlocks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
