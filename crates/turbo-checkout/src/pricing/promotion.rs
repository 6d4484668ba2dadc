//! Promotion rules and their repository.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{CommerceError, Result};
use crate::ids::{CategoryId, ProductId, PromotionId};
use crate::money::Money;

/// How a promotion computes its discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// `value` is a fraction of the line subtotal (`0.10` is 10% off).
    Percentage,
    /// `value` is a flat amount in minor units, taken off every qualifying line.
    FixedAmount,
    /// Not evaluated at line level; yields no discount.
    BuyXGetY,
    /// Not evaluated at line level; yields no discount.
    FreeShipping,
}

/// A coded discount rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Promotion {
    pub id: PromotionId,
    /// Code the customer enters (e.g., "SAVE10").
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub discount_kind: DiscountKind,
    pub value: f64,
    /// Minimum cart total, checked by [`PricingEngine::validate_promotion`].
    ///
    /// [`PricingEngine::validate_promotion`]: crate::pricing::PricingEngine::validate_promotion
    pub min_purchase: Option<Money>,
    /// Cap on the discount for a single line.
    pub max_discount: Option<Money>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub is_active: bool,
    /// Zero or less means unlimited.
    pub usage_limit: i64,
    pub usage_count: i64,
    pub applicable_product_ids: BTreeSet<ProductId>,
    pub applicable_category_ids: BTreeSet<CategoryId>,
    pub excluded_product_ids: BTreeSet<ProductId>,
}

impl Promotion {
    fn new(code: String, name: String, discount_kind: DiscountKind, value: f64) -> Self {
        Self {
            id: PromotionId::generate(),
            code,
            name,
            description: None,
            discount_kind,
            value,
            min_purchase: None,
            max_discount: None,
            valid_from: DateTime::<Utc>::MIN_UTC,
            valid_to: DateTime::<Utc>::MAX_UTC,
            is_active: true,
            usage_limit: 0,
            usage_count: 0,
            applicable_product_ids: BTreeSet::new(),
            applicable_category_ids: BTreeSet::new(),
            excluded_product_ids: BTreeSet::new(),
        }
    }

    /// Percentage promotion; `fraction` of `0.10` is 10% off.
    pub fn percentage(code: impl Into<String>, name: impl Into<String>, fraction: f64) -> Self {
        Self::new(code.into(), name.into(), DiscountKind::Percentage, fraction)
    }

    /// Fixed amount promotion, in minor units per qualifying line.
    pub fn fixed_amount(code: impl Into<String>, name: impl Into<String>, minor_units: i64) -> Self {
        Self::new(
            code.into(),
            name.into(),
            DiscountKind::FixedAmount,
            minor_units as f64,
        )
    }

    pub fn free_shipping(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(code.into(), name.into(), DiscountKind::FreeShipping, 0.0)
    }

    pub fn with_validity(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.valid_from = from;
        self.valid_to = to;
        self
    }

    pub fn with_usage_limit(mut self, limit: i64) -> Self {
        self.usage_limit = limit;
        self
    }

    pub fn with_min_purchase(mut self, minimum: Money) -> Self {
        self.min_purchase = Some(minimum);
        self
    }

    pub fn with_max_discount(mut self, cap: Money) -> Self {
        self.max_discount = Some(cap);
        self
    }

    /// Restrict the promotion to these products.
    pub fn for_products(mut self, products: impl IntoIterator<Item = ProductId>) -> Self {
        self.applicable_product_ids.extend(products);
        self
    }

    pub fn excluding(mut self, products: impl IntoIterator<Item = ProductId>) -> Self {
        self.excluded_product_ids.extend(products);
        self
    }

    pub fn deactivate(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Whether the usage limit has been reached.
    pub fn is_exhausted(&self) -> bool {
        self.usage_limit > 0 && self.usage_count >= self.usage_limit
    }

    /// Active, inside its validity window, and not exhausted.
    pub fn is_valid(&self, at: DateTime<Utc>) -> bool {
        self.is_active && at >= self.valid_from && at <= self.valid_to && !self.is_exhausted()
    }

    /// Exclusions win; a non-empty allow-list must contain the product.
    pub fn can_apply_to_product(&self, product_id: &ProductId) -> bool {
        if self.excluded_product_ids.contains(product_id) {
            return false;
        }
        self.applicable_product_ids.is_empty() || self.applicable_product_ids.contains(product_id)
    }

    /// Discount for one line with the given subtotal, capped at `max_discount`.
    pub fn line_discount(&self, line_subtotal: &Money) -> Result<Money> {
        let currency = line_subtotal.currency;
        let discount = match self.discount_kind {
            DiscountKind::Percentage => line_subtotal.multiply_by_fraction(self.value),
            DiscountKind::FixedAmount => Money::new(self.value.trunc() as i64, currency),
            DiscountKind::BuyXGetY | DiscountKind::FreeShipping => Money::zero(currency),
        };

        match &self.max_discount {
            Some(cap) if discount.greater_than(cap)? => Ok(*cap),
            _ => Ok(discount),
        }
    }

    /// Check the minimum purchase requirement against a cart total.
    ///
    /// The total must strictly exceed the minimum.
    pub fn check_min_purchase(&self, cart_total: &Money) -> Result<()> {
        match &self.min_purchase {
            Some(minimum) if !cart_total.greater_than(minimum)? => {
                Err(CommerceError::MinPurchaseNotMet {
                    code: self.code.clone(),
                    minimum: minimum.display(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Promotion storage.
#[async_trait]
pub trait PromotionRepository: Send + Sync {
    /// Find a promotion by its code.
    async fn find_by_code(&self, code: &str) -> Result<Option<Promotion>>;

    /// All promotions valid at `at`.
    async fn find_active(&self, at: DateTime<Utc>) -> Result<Vec<Promotion>>;

    /// Insert or replace a promotion.
    async fn save(&self, promotion: Promotion) -> Result<()>;

    /// Atomically bump the usage count unless the limit has been reached.
    ///
    /// Returns `false` when the promotion was already exhausted.
    async fn increment_usage(&self, id: &PromotionId) -> Result<bool>;
}

/// In-memory promotion store keyed by code.
#[derive(Debug, Default)]
pub struct InMemoryPromotionRepository {
    promotions: RwLock<HashMap<String, Promotion>>,
}

impl InMemoryPromotionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-loaded with promotions.
    pub fn with_promotions(promotions: impl IntoIterator<Item = Promotion>) -> Self {
        let map = promotions
            .into_iter()
            .map(|p| (p.code.clone(), p))
            .collect();
        Self {
            promotions: RwLock::new(map),
        }
    }
}

#[async_trait]
impl PromotionRepository for InMemoryPromotionRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<Promotion>> {
        Ok(self.promotions.read().await.get(code).cloned())
    }

    async fn find_active(&self, at: DateTime<Utc>) -> Result<Vec<Promotion>> {
        let promotions = self.promotions.read().await;
        let mut active: Vec<Promotion> = promotions
            .values()
            .filter(|p| p.is_valid(at))
            .cloned()
            .collect();
        active.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(active)
    }

    async fn save(&self, promotion: Promotion) -> Result<()> {
        self.promotions
            .write()
            .await
            .insert(promotion.code.clone(), promotion);
        Ok(())
    }

    async fn increment_usage(&self, id: &PromotionId) -> Result<bool> {
        let mut promotions = self.promotions.write().await;
        let promotion = promotions
            .values_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| CommerceError::PromotionNotFound(id.to_string()))?;

        if promotion.is_exhausted() {
            return Ok(false);
        }
        promotion.usage_count += 1;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use chrono::Duration;

    fn usd(units: i64) -> Money {
        Money::new(units, Currency::USD)
    }

    #[test]
    fn test_validity_window() {
        let now = Utc::now();
        let promo = Promotion::percentage("SPRING", "Spring sale", 0.2)
            .with_validity(now - Duration::days(1), now + Duration::days(1));

        assert!(promo.is_valid(now));
        assert!(!promo.is_valid(now + Duration::days(2)));
        assert!(!promo.is_valid(now - Duration::days(2)));
        assert!(!promo.clone().deactivate().is_valid(now));
    }

    #[test]
    fn test_usage_limit() {
        let mut promo = Promotion::percentage("ONCE", "One use", 0.1).with_usage_limit(1);
        assert!(promo.is_valid(Utc::now()));
        promo.usage_count = 1;
        assert!(!promo.is_valid(Utc::now()));

        let unlimited = Promotion {
            usage_count: 1000,
            ..Promotion::percentage("ALWAYS", "Always", 0.1)
        };
        assert!(unlimited.is_valid(Utc::now()));
    }

    #[test]
    fn test_product_applicability() {
        let hat = ProductId::new("hat");
        let shoe = ProductId::new("shoe");

        let everything = Promotion::percentage("ALL", "All", 0.1);
        assert!(everything.can_apply_to_product(&hat));

        let hats_only = Promotion::percentage("HATS", "Hats", 0.1).for_products([hat.clone()]);
        assert!(hats_only.can_apply_to_product(&hat));
        assert!(!hats_only.can_apply_to_product(&shoe));

        let excluded_wins = hats_only.excluding([hat.clone()]);
        assert!(!excluded_wins.can_apply_to_product(&hat));
    }

    #[test]
    fn test_line_discount() {
        let pct = Promotion::percentage("TEN", "10%", 0.10);
        assert_eq!(pct.line_discount(&usd(9998)).unwrap(), usd(999));

        let capped = pct.with_max_discount(usd(500));
        assert_eq!(capped.line_discount(&usd(9998)).unwrap(), usd(500));

        let fixed = Promotion::fixed_amount("FIVE", "$5 off", 500);
        assert_eq!(fixed.line_discount(&usd(300)).unwrap(), usd(500));

        let ship = Promotion::free_shipping("SHIP", "Free shipping");
        assert!(ship.line_discount(&usd(300)).unwrap().is_zero());
    }

    #[test]
    fn test_cap_in_other_currency_fails() {
        let promo = Promotion::percentage("TEN", "10%", 0.10)
            .with_max_discount(Money::new(100, Currency::EUR));
        assert!(matches!(
            promo.line_discount(&usd(9998)),
            Err(CommerceError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_min_purchase_is_strict() {
        let promo = Promotion::percentage("BIG", "Big spender", 0.1).with_min_purchase(usd(5000));
        assert!(promo.check_min_purchase(&usd(5001)).is_ok());
        assert!(matches!(
            promo.check_min_purchase(&usd(5000)),
            Err(CommerceError::MinPurchaseNotMet { .. })
        ));
    }

    #[tokio::test]
    async fn test_conditional_increment() {
        let promo = Promotion::percentage("TWICE", "Twice", 0.1).with_usage_limit(2);
        let id = promo.id.clone();
        let repo = InMemoryPromotionRepository::with_promotions([promo]);

        assert!(repo.increment_usage(&id).await.unwrap());
        assert!(repo.increment_usage(&id).await.unwrap());
        assert!(!repo.increment_usage(&id).await.unwrap());

        let stored = repo.find_by_code("TWICE").await.unwrap().unwrap();
        assert_eq!(stored.usage_count, 2);
        assert!(repo.find_active(Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_increment_unknown_promotion() {
        let repo = InMemoryPromotionRepository::new();
        assert!(matches!(
            repo.increment_usage(&PromotionId::new("nope")).await,
            Err(CommerceError::PromotionNotFound(_))
        ));
    }
}
