//! Promotion evaluation against priced lines.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::Result;
use crate::money::Money;
use crate::pricing::{AppliedDiscount, LineItem, LineItemPrice, Promotion, PromotionRepository};

/// Resolves promotion codes and spreads their discounts over line items.
///
/// Codes are applied in the order supplied. Each promotion sees the original
/// line subtotals, so stacked promotions add up rather than compound.
#[derive(Clone)]
pub struct PromotionEvaluator {
    promotions: Arc<dyn PromotionRepository>,
}

impl PromotionEvaluator {
    pub fn new(promotions: Arc<dyn PromotionRepository>) -> Self {
        Self { promotions }
    }

    /// Apply every usable code to `prices`, returning the promotions that
    /// produced a discount.
    ///
    /// Unknown, expired, exhausted and repeated codes are skipped, as are
    /// codes whose lookup fails. `items` and `prices` are parallel slices.
    pub async fn evaluate(
        &self,
        items: &[LineItem],
        prices: &mut [LineItemPrice],
        codes: &[String],
        at: DateTime<Utc>,
    ) -> Result<Vec<AppliedDiscount>> {
        let mut applied = Vec::new();
        let mut seen: Vec<&str> = Vec::new();

        for code in codes {
            if seen.contains(&code.as_str()) {
                debug!(code = %code, "skipping repeated promotion code");
                continue;
            }
            seen.push(code);

            let promotion = match self.promotions.find_by_code(code).await {
                Ok(Some(promotion)) => promotion,
                Ok(None) => {
                    debug!(code = %code, "promotion code not found");
                    continue;
                }
                Err(e) => {
                    warn!(code = %code, error = %e, "promotion lookup failed, skipping code");
                    continue;
                }
            };

            if !promotion.is_valid(at) {
                debug!(code = %code, "promotion not valid, skipping");
                continue;
            }

            if let Some(discount) = Self::apply_promotion(&promotion, items, prices)? {
                applied.push(discount);
            }
        }

        Ok(applied)
    }

    /// Apply one promotion to every qualifying line.
    ///
    /// Returns `None` when the promotion discounts nothing.
    pub fn apply_promotion(
        promotion: &Promotion,
        items: &[LineItem],
        prices: &mut [LineItemPrice],
    ) -> Result<Option<AppliedDiscount>> {
        let Some(first) = prices.first() else {
            return Ok(None);
        };
        let mut total = Money::zero(first.subtotal.currency);
        let mut applied_to_items = Vec::new();

        for (item, price) in items.iter().zip(prices.iter_mut()) {
            if !promotion.can_apply_to_product(&item.product_id) {
                continue;
            }

            let discount = promotion.line_discount(&price.subtotal)?;
            if discount.is_zero() {
                continue;
            }

            price.discount_amount = price.discount_amount.add(&discount)?;
            total = total.add(&discount)?;
            applied_to_items.push(item.id.clone());
        }

        if total.is_zero() {
            return Ok(None);
        }

        Ok(Some(AppliedDiscount {
            promotion_id: promotion.id.clone(),
            code: promotion.code.clone(),
            name: promotion.name.clone(),
            discount_kind: promotion.discount_kind,
            amount: total,
            applied_to_items,
        }))
    }
}
