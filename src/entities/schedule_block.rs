//! Schedule block entity - Barber-initiated unavailability.
//!
//! Start and end are local wall-clock strings (`"HH:MM"`) on `date`. A block never
//! has a client or a price.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Schedule block database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "schedule_blocks")]
pub struct Model {
    /// Unique identifier for the block
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Barber who is unavailable
    pub barber_id: i64,
    /// Local calendar day
    pub date: Date,
    /// Local start time, `"HH:MM"`
    pub start_time: String,
    /// Local end time, `"HH:MM"`
    pub end_time: String,
    /// Why the barber is unavailable
    pub reason: Option<String>,
    /// When the block was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `ScheduleBlock` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each block belongs to one barber
    #[sea_orm(
        belongs_to = "super::barber::Entity",
        from = "Column::BarberId",
        to = "super::barber::Column::Id"
    )]
    Barber,
}

impl Related<super::barber::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Barber.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
