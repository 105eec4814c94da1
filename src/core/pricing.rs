//! Pricing and commission resolution.
//!
//! Decides what a client pays for each service line (subscribers have covered
//! services waived) and what the barber earns for the appointment. Everything here is
//! pure; callers supply the frozen line prices, the barber's rates and the client's
//! subscriber status.

use crate::config::shop::ShopConfig;
use crate::core::commitment::FALLBACK_DURATION_MINUTES;
use crate::entities::barber;
use crate::errors::{Error, Result};
use serde::Serialize;
use serde_json::Value;

/// What a subscription's `services_included` column resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coverage {
    /// Service ids or names covered by the plan
    Included(Vec<String>),
    /// Free text that is not a service set; covers nothing
    Label(String),
}

/// Parses a serialized `services_included` value.
///
/// Accepts a JSON array or an object with a `services` array. Entries may be strings
/// or numbers. Anything else becomes a [`Coverage::Label`] and never an error.
#[must_use]
pub fn parse_services_included(raw: &str) -> Coverage {
    let items = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => Some(items),
        Ok(Value::Object(mut map)) => match map.remove("services") {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    };

    items.map_or_else(
        || Coverage::Label(raw.trim().to_string()),
        |items| {
            Coverage::Included(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.trim().to_string()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .filter(|s| !s.is_empty())
                    .collect(),
            )
        },
    )
}

/// Effective subscriber status of a client at pricing time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriberStatus {
    /// Regular client
    None,
    /// Has an active subscription
    Subscribed(Coverage),
    /// Manually flagged as subscriber with no active subscription on record
    Flagged,
}

impl SubscriberStatus {
    /// Whether the client counts as a subscriber
    #[must_use]
    pub const fn is_subscriber(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Decides whether a service is waived for this subscriber status.
///
/// An active subscription covers services listed by id or by case-insensitive name.
/// A manual flag falls back to matching `terms` as substrings of the service name.
#[must_use]
pub fn is_service_covered_by_subscription(
    status: &SubscriberStatus,
    service_id: i64,
    service_name: &str,
    terms: &[String],
) -> bool {
    let name = service_name.trim().to_lowercase();
    match status {
        SubscriberStatus::None | SubscriberStatus::Subscribed(Coverage::Label(_)) => false,
        SubscriberStatus::Subscribed(Coverage::Included(items)) => {
            let id = service_id.to_string();
            items
                .iter()
                .any(|item| *item == id || item.to_lowercase() == name)
        }
        SubscriberStatus::Flagged => terms
            .iter()
            .map(|term| term.trim().to_lowercase())
            .any(|term| !term.is_empty() && name.contains(&term)),
    }
}

/// A service line with its price and duration frozen.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceLine {
    /// Service id
    pub service_id: i64,
    /// Service name, used for coverage matching
    pub name: String,
    /// Frozen list price
    pub price: f64,
    /// Frozen duration
    pub duration_minutes: i64,
}

/// A product line with its unit price frozen.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductLine {
    /// Product id
    pub product_id: i64,
    /// Units sold
    pub quantity: i32,
    /// Frozen unit price
    pub unit_price: f64,
}

/// Barber compensation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarberRates {
    /// Percent of revenue for standard clients
    pub commission_rate: f64,
    /// Hourly pay for subscriber appointments
    pub hourly_rate: Option<f64>,
    /// Percent override for subscriber appointments without hourly pay
    pub subscription_commission_rate: Option<f64>,
}

impl From<&barber::Model> for BarberRates {
    fn from(barber: &barber::Model) -> Self {
        Self {
            commission_rate: barber.commission_rate,
            hourly_rate: barber.hourly_rate,
            subscription_commission_rate: barber.subscription_commission_rate,
        }
    }
}

/// Settings that shape pricing beyond the barber and client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingPolicy {
    /// Name fragments waived for manually flagged subscribers
    pub subscription_terms: Vec<String>,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            subscription_terms: vec!["corte".to_string(), "barba".to_string()],
        }
    }
}

impl From<&ShopConfig> for PricingPolicy {
    fn from(config: &ShopConfig) -> Self {
        Self {
            subscription_terms: config.subscription_terms.clone(),
        }
    }
}

/// How the commission was computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum CommissionModel {
    /// Percent of the total
    Percentage {
        /// Percent applied
        rate: f64,
    },
    /// Hourly pay for the booked minutes
    Hourly {
        /// Pay per hour
        rate: f64,
    },
}

/// A service line after waiver resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedLine {
    /// Service id
    pub service_id: i64,
    /// Frozen list price
    pub list_price: f64,
    /// What the client pays for this line
    pub charged_price: f64,
    /// Frozen duration
    pub duration_minutes: i64,
    /// Covered by a subscription
    pub waived: bool,
}

/// Monetary outcome of an appointment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    /// Service lines with charged prices
    pub lines: Vec<PricedLine>,
    /// Sum of product subtotals
    pub product_total: f64,
    /// Service charges plus product subtotals
    pub total_amount: f64,
    /// Owed to the barber
    pub commission_amount: f64,
    /// Rule used for the commission
    pub model: CommissionModel,
    /// Whether the client counted as a subscriber
    pub is_subscriber: bool,
    /// Booked minutes, with the fallback applied
    pub duration_minutes: i64,
}

impl Quote {
    /// Copy with every monetary field rounded to cents.
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self {
            lines: self
                .lines
                .iter()
                .map(|line| PricedLine {
                    list_price: round_money(line.list_price),
                    charged_price: round_money(line.charged_price),
                    ..line.clone()
                })
                .collect(),
            product_total: round_money(self.product_total),
            total_amount: round_money(self.total_amount),
            commission_amount: round_money(self.commission_amount),
            ..self.clone()
        }
    }
}

/// Rounds half-up to two decimals.
#[must_use]
pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn check_amount(amount: f64) -> Result<f64> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(amount)
}

fn clamp_rate(rate: f64) -> f64 {
    if rate.is_finite() { rate.clamp(0.0, 100.0) } else { 0.0 }
}

/// Resolves charged prices, total and commission for an appointment.
///
/// # Errors
/// Returns `InvalidAmount` for negative or non-finite prices or rates, and
/// `InvalidRequest` for non-positive product quantities.
pub fn resolve(
    services: &[ServiceLine],
    products: &[ProductLine],
    rates: BarberRates,
    status: &SubscriberStatus,
    policy: &PricingPolicy,
) -> Result<Quote> {
    let is_subscriber = status.is_subscriber();

    let lines = services
        .iter()
        .map(|line| {
            let list_price = check_amount(line.price)?;
            let waived = is_subscriber
                && is_service_covered_by_subscription(
                    status,
                    line.service_id,
                    &line.name,
                    &policy.subscription_terms,
                );
            Ok(PricedLine {
                service_id: line.service_id,
                list_price,
                charged_price: if waived { 0.0 } else { list_price },
                duration_minutes: line.duration_minutes,
                waived,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let product_total = products.iter().try_fold(0.0, |acc, line| {
        if line.quantity <= 0 {
            return Err(Error::InvalidRequest {
                message: format!(
                    "quantity for product {} must be positive, got {}",
                    line.product_id, line.quantity
                ),
            });
        }
        Ok(acc + check_amount(line.unit_price)? * f64::from(line.quantity))
    })?;

    let service_total: f64 = lines.iter().map(|line| line.charged_price).sum();
    let total_amount = service_total + product_total;

    let booked: i64 = lines
        .iter()
        .map(|line| line.duration_minutes)
        .filter(|m| *m > 0)
        .sum();
    let duration_minutes = if booked > 0 {
        booked
    } else {
        FALLBACK_DURATION_MINUTES
    };

    let hourly = rates
        .hourly_rate
        .map(check_amount)
        .transpose()?
        .filter(|rate| *rate > 0.0);

    let (model, commission_amount) = match hourly {
        Some(rate) if is_subscriber => (
            CommissionModel::Hourly { rate },
            rate * duration_minutes as f64 / 60.0,
        ),
        _ => {
            let rate = match rates.subscription_commission_rate {
                Some(rate) if is_subscriber => rate,
                _ => rates.commission_rate,
            };
            let rate = clamp_rate(rate);
            (
                CommissionModel::Percentage { rate },
                total_amount * rate / 100.0,
            )
        }
    };

    Ok(Quote {
        lines,
        product_total,
        total_amount,
        commission_amount,
        model,
        is_subscriber,
        duration_minutes,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;

    fn corte() -> ServiceLine {
        ServiceLine {
            service_id: 1,
            name: "Corte".to_string(),
            price: 40.0,
            duration_minutes: 30,
        }
    }

    fn barba() -> ServiceLine {
        ServiceLine {
            service_id: 2,
            name: "Barba".to_string(),
            price: 25.0,
            duration_minutes: 20,
        }
    }

    fn rates(commission_rate: f64) -> BarberRates {
        BarberRates {
            commission_rate,
            hourly_rate: None,
            subscription_commission_rate: None,
        }
    }

    #[test]
    fn test_parse_services_included_shapes() {
        assert_eq!(
            parse_services_included(r#"["Corte", 3]"#),
            Coverage::Included(vec!["Corte".to_string(), "3".to_string()])
        );
        assert_eq!(
            parse_services_included(r#"{"services": ["Barba"]}"#),
            Coverage::Included(vec!["Barba".to_string()])
        );
        assert_eq!(
            parse_services_included("Plano Premium"),
            Coverage::Label("Plano Premium".to_string())
        );
        assert_eq!(
            parse_services_included(r#"{"plan": "gold"}"#),
            Coverage::Label(r#"{"plan": "gold"}"#.to_string())
        );
    }

    #[test]
    fn test_subscription_waives_only_covered_services() {
        let status = SubscriberStatus::Subscribed(parse_services_included(r#"["corte"]"#));
        let quote = resolve(
            &[corte(), barba()],
            &[],
            rates(40.0),
            &status,
            &PricingPolicy::default(),
        )
        .unwrap();

        assert!(quote.lines[0].waived);
        assert_eq!(quote.lines[0].charged_price, 0.0);
        assert_eq!(quote.lines[1].charged_price, 25.0);
        assert_eq!(quote.total_amount, 25.0);
        assert_eq!(quote.commission_amount, 10.0);
        assert_eq!(quote.model, CommissionModel::Percentage { rate: 40.0 });
        assert!(quote.is_subscriber);
    }

    #[test]
    fn test_subscription_matches_by_id() {
        let status = SubscriberStatus::Subscribed(Coverage::Included(vec!["2".to_string()]));
        assert!(is_service_covered_by_subscription(&status, 2, "Barba", &[]));
        assert!(!is_service_covered_by_subscription(&status, 1, "Corte", &[]));
    }

    #[test]
    fn test_malformed_coverage_never_waives() {
        let status = SubscriberStatus::Subscribed(parse_services_included("not json"));
        let quote = resolve(&[corte()], &[], rates(50.0), &status, &PricingPolicy::default()).unwrap();
        assert_eq!(quote.total_amount, 40.0);
    }

    #[test]
    fn test_flagged_subscriber_uses_name_terms() {
        let policy = PricingPolicy::default();
        let status = SubscriberStatus::Flagged;
        let hidratacao = ServiceLine {
            service_id: 3,
            name: "Hidratação".to_string(),
            price: 30.0,
            duration_minutes: 30,
        };
        let degrade = ServiceLine {
            service_id: 4,
            name: "Corte Degradê".to_string(),
            price: 45.0,
            duration_minutes: 40,
        };
        let quote = resolve(&[degrade, hidratacao], &[], rates(50.0), &status, &policy).unwrap();
        assert!(quote.lines[0].waived);
        assert!(!quote.lines[1].waived);
        assert_eq!(quote.total_amount, 30.0);
    }

    #[test]
    fn test_regular_client_pays_list_price_and_products() {
        let products = [ProductLine {
            product_id: 9,
            quantity: 2,
            unit_price: 12.5,
        }];
        let quote = resolve(
            &[corte()],
            &products,
            rates(50.0),
            &SubscriberStatus::None,
            &PricingPolicy::default(),
        )
        .unwrap();
        assert_eq!(quote.product_total, 25.0);
        assert_eq!(quote.total_amount, 65.0);
        assert_eq!(quote.commission_amount, 32.5);
        assert!(!quote.is_subscriber);
    }

    #[test]
    fn test_hourly_commission_ignores_total() {
        let barber_rates = BarberRates {
            commission_rate: 40.0,
            hourly_rate: Some(50.0),
            subscription_commission_rate: None,
        };
        let long_service = ServiceLine {
            service_id: 1,
            name: "Corte".to_string(),
            price: 40.0,
            duration_minutes: 90,
        };
        let status = SubscriberStatus::Subscribed(Coverage::Included(vec!["Corte".to_string()]));
        let quote = resolve(
            &[long_service],
            &[],
            barber_rates,
            &status,
            &PricingPolicy::default(),
        )
        .unwrap();
        assert_eq!(quote.total_amount, 0.0);
        assert_eq!(quote.commission_amount, 75.0);
        assert_eq!(quote.model, CommissionModel::Hourly { rate: 50.0 });
    }

    #[test]
    fn test_hourly_rate_only_applies_to_subscribers() {
        let barber_rates = BarberRates {
            commission_rate: 40.0,
            hourly_rate: Some(50.0),
            subscription_commission_rate: None,
        };
        let quote = resolve(
            &[corte()],
            &[],
            barber_rates,
            &SubscriberStatus::None,
            &PricingPolicy::default(),
        )
        .unwrap();
        assert_eq!(quote.commission_amount, 16.0);
    }

    #[test]
    fn test_subscription_rate_override_and_clamp() {
        let barber_rates = BarberRates {
            commission_rate: 40.0,
            hourly_rate: Some(0.0),
            subscription_commission_rate: Some(45.0),
        };
        let status = SubscriberStatus::Subscribed(Coverage::Included(Vec::new()));
        let quote =
            resolve(&[corte()], &[], barber_rates, &status, &PricingPolicy::default()).unwrap();
        assert_eq!(quote.commission_amount, 18.0);

        let quote = resolve(
            &[corte()],
            &[],
            rates(150.0),
            &SubscriberStatus::None,
            &PricingPolicy::default(),
        )
        .unwrap();
        assert_eq!(quote.commission_amount, quote.total_amount);
    }

    #[test]
    fn test_rejects_bad_amounts() {
        let mut bad = corte();
        bad.price = -1.0;
        assert!(matches!(
            resolve(&[bad], &[], rates(40.0), &SubscriberStatus::None, &PricingPolicy::default()),
            Err(Error::InvalidAmount { .. })
        ));

        let products = [ProductLine {
            product_id: 1,
            quantity: 0,
            unit_price: 5.0,
        }];
        assert!(matches!(
            resolve(&[corte()], &products, rates(40.0), &SubscriberStatus::None, &PricingPolicy::default()),
            Err(Error::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_rounding_is_applied_on_request() {
        let line = ServiceLine {
            service_id: 1,
            name: "Pigmentação".to_string(),
            price: 33.333,
            duration_minutes: 30,
        };
        let quote = resolve(&[line], &[], rates(33.0), &SubscriberStatus::None, &PricingPolicy::default())
            .unwrap()
            .rounded();
        assert_eq!(quote.total_amount, 33.33);
        assert_eq!(quote.commission_amount, 11.0);
        assert_eq!(round_money(0.125), 0.13);
    }
}
