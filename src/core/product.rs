//! Product business logic - Retail items sold alongside appointments.
//!
//! Products carry a price that is frozen onto appointment product lines and a stock
//! count that bookings draw from. Deleting a product only hides it, so appointment
//! history keeps its references.

use crate::{
    entities::{Product, product},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// A requested product line before prices are frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductRequest {
    /// Product to sell
    pub product_id: i64,
    /// Units to sell
    pub quantity: i32,
}

fn validate_product_fields(name: &str, price: f64) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidRequest {
            message: "Product name cannot be empty".to_string(),
        });
    }

    if !price.is_finite() || price < 0.0 {
        return Err(Error::InvalidAmount { amount: price });
    }

    Ok(())
}

/// Retrieves all active (non-deleted) products, ordered alphabetically by name.
pub async fn get_all_active_products(db: &DatabaseConnection) -> Result<Vec<product::Model>> {
    Product::find()
        .filter(product::Column::IsDeleted.eq(false))
        .order_by_asc(product::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a product by id, including deleted ones.
pub async fn get_product_by_id<C>(conn: &C, product_id: i64) -> Result<Option<product::Model>>
where
    C: ConnectionTrait,
{
    Product::find_by_id(product_id)
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Creates a new product with an initial stock count.
///
/// # Errors
/// Returns an error if:
/// - The product name is empty or whitespace-only
/// - The price is negative or not finite (NaN, infinity)
/// - The stock is negative
/// - The database insert operation fails
#[instrument(skip(db))]
pub async fn create_product(
    db: &DatabaseConnection,
    name: String,
    price: f64,
    stock: i32,
) -> Result<product::Model> {
    validate_product_fields(&name, price)?;
    if stock < 0 {
        return Err(Error::InvalidRequest {
            message: format!("Stock cannot be negative, got {stock}"),
        });
    }

    let now = chrono::Utc::now().naive_utc();

    let product = product::ActiveModel {
        name: Set(name.trim().to_string()),
        price: Set(price),
        stock: Set(stock),
        is_deleted: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    product.insert(db).await.map_err(Into::into)
}

/// Updates an existing product's name and price. Existing appointment lines keep
/// the price they were sold at.
///
/// # Errors
/// Returns an error if:
/// - The product name is empty or whitespace-only
/// - The price is negative or not finite (NaN, infinity)
/// - The product does not exist or is already deleted
/// - The database update operation fails
#[instrument(skip(db))]
pub async fn update_product(
    db: &DatabaseConnection,
    product_id: i64,
    new_name: String,
    new_price: f64,
) -> Result<product::Model> {
    validate_product_fields(&new_name, new_price)?;

    let mut product: product::ActiveModel = require_product(db, product_id).await?.into();

    product.name = Set(new_name.trim().to_string());
    product.price = Set(new_price);
    product.updated_at = Set(chrono::Utc::now().naive_utc());

    product.update(db).await.map_err(Into::into)
}

/// Soft deletes a product by marking it as deleted, preserving appointment history.
///
/// # Errors
/// Returns an error if:
/// - The product does not exist or is already deleted
/// - The database update operation fails
#[instrument(skip(db))]
pub async fn delete_product(db: &DatabaseConnection, product_id: i64) -> Result<product::Model> {
    let mut product: product::ActiveModel = require_product(db, product_id).await?.into();

    product.is_deleted = Set(true);
    product.updated_at = Set(chrono::Utc::now().naive_utc());

    product.update(db).await.map_err(Into::into)
}

async fn require_product<C>(conn: &C, product_id: i64) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    get_product_by_id(conn, product_id)
        .await?
        .filter(|product| !product.is_deleted)
        .ok_or(Error::ProductNotFound { id: product_id })
}

/// Merges repeated product ids into one line per product, keeping first-seen order.
///
/// # Errors
/// Returns `InvalidRequest` for non-positive quantities.
pub fn merge_product_requests(requests: &[ProductRequest]) -> Result<Vec<ProductRequest>> {
    let mut merged: Vec<ProductRequest> = Vec::with_capacity(requests.len());
    for request in requests {
        if request.quantity <= 0 {
            return Err(Error::InvalidRequest {
                message: format!(
                    "quantity for product {} must be positive, got {}",
                    request.product_id, request.quantity
                ),
            });
        }
        match merged
            .iter_mut()
            .find(|line| line.product_id == request.product_id)
        {
            Some(line) => line.quantity += request.quantity,
            None => merged.push(*request),
        }
    }
    Ok(merged)
}

/// Loads the products for merged `requests` and checks there is enough stock.
///
/// # Errors
/// Returns `ProductNotFound` for missing or deleted products and `InsufficientStock`
/// when a line asks for more units than are on hand.
pub async fn load_products_for_sale<C>(
    conn: &C,
    requests: &[ProductRequest],
) -> Result<Vec<(product::Model, i32)>>
where
    C: ConnectionTrait,
{
    if requests.is_empty() {
        return Ok(Vec::new());
    }

    let found: HashMap<i64, product::Model> = Product::find()
        .filter(product::Column::Id.is_in(requests.iter().map(|r| r.product_id)))
        .filter(product::Column::IsDeleted.eq(false))
        .all(conn)
        .await?
        .into_iter()
        .map(|product| (product.id, product))
        .collect();

    requests
        .iter()
        .map(|request| {
            let product = found
                .get(&request.product_id)
                .cloned()
                .ok_or(Error::ProductNotFound {
                    id: request.product_id,
                })?;
            if product.stock < request.quantity {
                return Err(Error::InsufficientStock {
                    name: product.name,
                    available: product.stock,
                    requested: request.quantity,
                });
            }
            Ok((product, request.quantity))
        })
        .collect()
}

/// Takes `quantity` units out of stock, failing if another booking got there first.
pub async fn withdraw_stock<C>(conn: &C, product: &product::Model, quantity: i32) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).sub(quantity),
        )
        .col_expr(
            product::Column::UpdatedAt,
            Expr::value(chrono::Utc::now().naive_utc()),
        )
        .filter(product::Column::Id.eq(product.id))
        .filter(product::Column::Stock.gte(quantity))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        let available = get_product_by_id(conn, product.id)
            .await?
            .map_or(0, |current| current.stock);
        return Err(Error::InsufficientStock {
            name: product.name.clone(),
            available,
            requested: quantity,
        });
    }

    debug!("Withdrew {} x {} from stock", quantity, product.name);
    Ok(())
}

/// Puts `quantity` units back into stock, e.g. when an appointment is cancelled.
pub async fn restore_stock<C>(conn: &C, product_id: i64, quantity: i32) -> Result<()>
where
    C: ConnectionTrait,
{
    Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).add(quantity),
        )
        .filter(product::Column::Id.eq(product_id))
        .exec(conn)
        .await?;
    debug!("Restored {} units of product {}", quantity, product_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_product_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        // Test empty name validation
        let result = create_product(&db, String::new(), 10.0, 1).await;
        assert!(matches!(result.unwrap_err(), Error::InvalidRequest { .. }));

        // Test negative price validation
        let result = create_product(&db, "Pomada".to_string(), -10.0, 1).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidAmount { amount: -10.0 }
        ));

        // Test NaN price validation
        let result = create_product(&db, "Pomada".to_string(), f64::NAN, 1).await;
        assert!(matches!(result.unwrap_err(), Error::InvalidAmount { .. }));

        // Test negative stock validation
        let result = create_product(&db, "Pomada".to_string(), 10.0, -1).await;
        assert!(matches!(result.unwrap_err(), Error::InvalidRequest { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_product_lifecycle() -> Result<()> {
        let db = setup_test_db().await?;

        let pomada = create_product(&db, "Pomada".to_string(), 35.0, 4).await?;
        let oleo = create_product(&db, "Óleo de barba".to_string(), 28.0, 2).await?;

        let found = get_product_by_id(&db, pomada.id).await?;
        assert_eq!(found.unwrap().name, "Pomada");

        let updated = update_product(&db, pomada.id, "Pomada Matte".to_string(), 38.0).await?;
        assert_eq!(updated.name, "Pomada Matte");
        assert_eq!(updated.price, 38.0);
        assert_eq!(updated.stock, 4);

        let deleted = delete_product(&db, oleo.id).await?;
        assert!(deleted.is_deleted);

        let active = get_all_active_products(&db).await?;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, pomada.id);

        // Deleting twice is an error
        let result = delete_product(&db, oleo.id).await;
        assert!(matches!(result, Err(Error::ProductNotFound { .. })));

        Ok(())
    }

    #[test]
    fn test_merge_product_requests() {
        let merged = merge_product_requests(&[
            ProductRequest {
                product_id: 2,
                quantity: 1,
            },
            ProductRequest {
                product_id: 1,
                quantity: 1,
            },
            ProductRequest {
                product_id: 2,
                quantity: 2,
            },
        ])
        .unwrap();
        assert_eq!(
            merged,
            vec![
                ProductRequest {
                    product_id: 2,
                    quantity: 3
                },
                ProductRequest {
                    product_id: 1,
                    quantity: 1
                },
            ]
        );

        let result = merge_product_requests(&[ProductRequest {
            product_id: 1,
            quantity: 0,
        }]);
        assert!(matches!(result, Err(Error::InvalidRequest { .. })));
    }

    #[tokio::test]
    async fn test_stock_checks_and_withdrawal() -> Result<()> {
        let db = setup_test_db().await?;
        let pomada = create_product(&db, "Pomada".to_string(), 35.0, 3).await?;

        let result = load_products_for_sale(
            &db,
            &[ProductRequest {
                product_id: pomada.id,
                quantity: 5,
            }],
        )
        .await;
        assert!(matches!(
            result,
            Err(Error::InsufficientStock {
                available: 3,
                requested: 5,
                ..
            })
        ));

        withdraw_stock(&db, &pomada, 2).await?;
        let result = withdraw_stock(&db, &pomada, 2).await;
        assert!(matches!(
            result,
            Err(Error::InsufficientStock { available: 1, .. })
        ));

        restore_stock(&db, pomada.id, 2).await?;
        let current = get_product_by_id(&db, pomada.id).await?.unwrap();
        assert_eq!(current.stock, 3);

        Ok(())
    }
}
