//! Subscription entity - A client's recurring plan.
//!
//! `services_included` is a serialized set: a JSON array (`["Corte", "Barba"]`) or an
//! object with a `services` array. Anything else is treated as a plain label.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Subscription database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub client_id: i64,
    /// `"ACTIVE"`, `"SUSPENDED"` or `"CANCELLED"`
    pub status: String,
    /// Serialized set of covered service ids or names
    pub services_included: String,
    /// Day of month the plan is billed
    pub billing_day: i32,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::client::Entity",
        from = "Column::ClientId",
        to = "super::client::Column::Id"
    )]
    Client,
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Client.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
