//! Online booking service line - A requested service with its duration frozen.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Requested service database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "online_booking_services")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub online_booking_id: i64,
    pub service_id: i64,
    pub duration_minutes: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::online_booking::Entity",
        from = "Column::OnlineBookingId",
        to = "super::online_booking::Column::Id",
        on_delete = "Cascade"
    )]
    OnlineBooking,
}

impl Related<super::online_booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OnlineBooking.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
