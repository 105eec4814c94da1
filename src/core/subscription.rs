//! Subscription business logic.
//!
//! A client counts as a subscriber when they hold an ACTIVE subscription, or failing
//! that, when an admin has set their manual subscriber flag. Only the first case has a
//! service set to match against; the flag falls back to name heuristics in pricing.

use crate::{
    core::{
        client::require_client,
        pricing::{Coverage, SubscriberStatus, parse_services_included},
    },
    entities::{Subscription, client, subscription},
    errors::{Error, Result},
    models::SubscriptionStatus,
};
use sea_orm::{QueryOrder, Set, prelude::*};
use std::collections::HashMap;
use tracing::{info, instrument, warn};

/// Creates an ACTIVE subscription for a client.
///
/// `services_included` is stored as given; see [`parse_services_included`] for the
/// accepted shapes.
///
/// # Errors
/// Returns an error if the client does not exist, the billing day is outside
/// `1..=31`, or the insert fails.
#[instrument(skip(db))]
pub async fn create_subscription(
    db: &DatabaseConnection,
    client_id: i64,
    services_included: String,
    billing_day: i32,
) -> Result<subscription::Model> {
    if !(1..=31).contains(&billing_day) {
        return Err(Error::InvalidRequest {
            message: format!("billing day must be between 1 and 31, got {billing_day}"),
        });
    }
    require_client(db, client_id).await?;

    let subscription = subscription::ActiveModel {
        client_id: Set(client_id),
        status: Set(SubscriptionStatus::Active.as_str().to_string()),
        services_included: Set(services_included),
        billing_day: Set(billing_day),
        created_at: Set(chrono::Utc::now().naive_utc()),
        ..Default::default()
    };
    let subscription = subscription.insert(db).await?;
    info!(
        "Created subscription {} for client {}",
        subscription.id, client_id
    );
    Ok(subscription)
}

/// Moves a subscription to `status`.
#[instrument(skip(db))]
pub async fn set_subscription_status(
    db: &DatabaseConnection,
    subscription_id: i64,
    status: SubscriptionStatus,
) -> Result<subscription::Model> {
    let mut subscription: subscription::ActiveModel = Subscription::find_by_id(subscription_id)
        .one(db)
        .await?
        .ok_or(Error::SubscriptionNotFound {
            id: subscription_id,
        })?
        .into();
    subscription.status = Set(status.as_str().to_string());
    subscription.update(db).await.map_err(Into::into)
}

/// Active subscriptions keyed by client id. When a client has several, the newest wins.
pub async fn fetch_active_subscriptions<C>(conn: &C) -> Result<HashMap<i64, subscription::Model>>
where
    C: ConnectionTrait,
{
    let subscriptions = Subscription::find()
        .filter(subscription::Column::Status.eq(SubscriptionStatus::Active.as_str()))
        .order_by_asc(subscription::Column::Id)
        .all(conn)
        .await?;

    Ok(subscriptions
        .into_iter()
        .map(|subscription| (subscription.client_id, subscription))
        .collect())
}

/// Derives a client's subscriber status from their active subscription, if any.
#[must_use]
pub fn subscriber_status(
    client: &client::Model,
    active: Option<&subscription::Model>,
) -> SubscriberStatus {
    match active {
        Some(subscription) => {
            let coverage = parse_services_included(&subscription.services_included);
            if let Coverage::Label(label) = &coverage {
                warn!(
                    "Subscription {} has unstructured services '{}'; nothing is waived",
                    subscription.id, label
                );
            }
            SubscriberStatus::Subscribed(coverage)
        }
        None if client.subscriber_flag => SubscriberStatus::Flagged,
        None => SubscriberStatus::None,
    }
}

/// Looks up a client's newest active subscription and derives their status.
pub async fn subscriber_status_for<C>(conn: &C, client: &client::Model) -> Result<SubscriberStatus>
where
    C: ConnectionTrait,
{
    let active = Subscription::find()
        .filter(subscription::Column::ClientId.eq(client.id))
        .filter(subscription::Column::Status.eq(SubscriptionStatus::Active.as_str()))
        .order_by_desc(subscription::Column::Id)
        .one(conn)
        .await?;
    Ok(subscriber_status(client, active.as_ref()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_create_subscription_validation() -> Result<()> {
        let db = setup_test_db().await?;

        let result = create_subscription(&db, 1, "[]".to_string(), 0).await;
        assert!(matches!(result, Err(Error::InvalidRequest { .. })));

        let result = create_subscription(&db, 999, "[]".to_string(), 10).await;
        assert!(matches!(result, Err(Error::ClientNotFound { id: 999 })));

        Ok(())
    }

    #[tokio::test]
    async fn test_subscriber_status_follows_subscription_lifecycle() -> Result<()> {
        let db = setup_test_db().await?;
        let client = create_test_client(&db, "João", "92999990000").await?;

        assert_eq!(
            subscriber_status_for(&db, &client).await?,
            SubscriberStatus::None
        );

        let subscription =
            create_subscription(&db, client.id, r#"["Corte"]"#.to_string(), 5).await?;
        assert_eq!(
            subscriber_status_for(&db, &client).await?,
            SubscriberStatus::Subscribed(Coverage::Included(vec!["Corte".to_string()]))
        );

        let active = fetch_active_subscriptions(&db).await?;
        assert_eq!(active.get(&client.id).map(|s| s.id), Some(subscription.id));

        set_subscription_status(&db, subscription.id, SubscriptionStatus::Suspended).await?;
        assert_eq!(
            subscriber_status_for(&db, &client).await?,
            SubscriberStatus::None
        );
        assert!(fetch_active_subscriptions(&db).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_manual_flag_without_subscription() -> Result<()> {
        let db = setup_test_db().await?;
        let client = crate::core::client::create_client(
            &db,
            "Maria".to_string(),
            "92988887777".to_string(),
            true,
        )
        .await?;

        assert_eq!(
            subscriber_status_for(&db, &client).await?,
            SubscriberStatus::Flagged
        );

        Ok(())
    }
}
