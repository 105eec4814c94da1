//! Commission entity - Amount owed to a barber for a completed appointment.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Commission database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "commissions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub appointment_id: i64,
    pub barber_id: i64,
    pub amount: f64,
    /// `"PENDING"` until paid out by the cash register
    pub status: String,
    pub created_at: DateTimeUtc,
}

/// `Commission` has no navigable relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
