//! Product entity - Retail items sold alongside appointments.
//!
//! Unit prices are frozen onto appointment product lines; product lines are never
//! waived by subscriptions.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name of the product (e.g., "Pomada", "Shampoo")
    pub name: String,
    /// Current unit price
    pub price: f64,
    /// Units on hand
    pub stock: i32,
    /// Soft delete flag - if true, product is hidden but sales history is preserved
    pub is_deleted: bool,
    /// When the product was created
    pub created_at: DateTime,
    /// When the product was last modified
    pub updated_at: DateTime,
}

/// `Product` is referenced by appointment product lines only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
