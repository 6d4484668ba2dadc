//! Cart pricing pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::cart::Cart;
use crate::error::{CommerceError, Result};
use crate::ids::{CartItemId, ShippingMethodId};
use crate::money::{Currency, Money};
use crate::pricing::{
    LineItem, LineItemPrice, PricingAddress, PricingResult, Promotion, PromotionEvaluator,
    PromotionRepository, TaxLine,
};
use crate::shipping::{RateRequest, ShippableItem, ShippingRateCalculator};
use crate::tax::{TaxCalculator, TaxRequest, TaxResult, TaxableItem};

/// Inputs to a pricing run besides the items themselves.
#[derive(Debug, Clone, Default)]
pub struct PricingOptions {
    /// Applied in order; unusable codes are skipped.
    pub promotion_codes: Vec<String>,
    pub shipping_method_id: Option<ShippingMethodId>,
    /// Destination for shipping quotes and tax.
    pub shipping_address: Option<PricingAddress>,
    pub tax_inclusive: bool,
}

/// Computes subtotal, discounts, shipping, tax and totals.
///
/// Tax and shipping calculators are optional. When one is missing, or fails,
/// its total is zero and pricing carries on.
#[derive(Clone)]
pub struct PricingEngine {
    promotions: Arc<dyn PromotionRepository>,
    evaluator: PromotionEvaluator,
    tax_calculator: Option<Arc<dyn TaxCalculator>>,
    shipping_calculator: Option<Arc<dyn ShippingRateCalculator>>,
}

impl PricingEngine {
    pub fn new(promotions: Arc<dyn PromotionRepository>) -> Self {
        Self {
            evaluator: PromotionEvaluator::new(promotions.clone()),
            promotions,
            tax_calculator: None,
            shipping_calculator: None,
        }
    }

    pub fn with_tax_calculator(mut self, calculator: Arc<dyn TaxCalculator>) -> Self {
        self.tax_calculator = Some(calculator);
        self
    }

    pub fn with_shipping_calculator(mut self, calculator: Arc<dyn ShippingRateCalculator>) -> Self {
        self.shipping_calculator = Some(calculator);
        self
    }

    /// Promotion store used for code lookups.
    pub fn promotions(&self) -> &Arc<dyn PromotionRepository> {
        &self.promotions
    }

    /// Price a cart. Returns `None` for an empty cart.
    #[tracing::instrument(skip_all, fields(cart_id = %cart.id, items = cart.items.len()))]
    pub async fn price_cart(
        &self,
        cart: &Cart,
        options: &PricingOptions,
    ) -> Result<Option<PricingResult>> {
        let items: Vec<LineItem> = cart.items.iter().map(LineItem::from).collect();
        self.price(&items, options, None).await
    }

    /// Price arbitrary line items with a known shipping cost.
    ///
    /// No shipping quote is requested; `shipping_cost` is used as is.
    pub async fn price_line_items(
        &self,
        items: &[LineItem],
        shipping_cost: Money,
        options: &PricingOptions,
    ) -> Result<Option<PricingResult>> {
        self.price(items, options, Some(shipping_cost)).await
    }

    /// Look up a code and check it can be used against `cart_total`.
    pub async fn validate_promotion(&self, code: &str, cart_total: &Money) -> Result<Promotion> {
        let promotion = self
            .promotions
            .find_by_code(code)
            .await?
            .ok_or_else(|| CommerceError::PromotionNotFound(code.to_string()))?;

        if !promotion.is_valid(Utc::now()) {
            return Err(CommerceError::PromotionInvalid(code.to_string()));
        }
        promotion.check_min_purchase(cart_total)?;
        Ok(promotion)
    }

    async fn price(
        &self,
        items: &[LineItem],
        options: &PricingOptions,
        fixed_shipping: Option<Money>,
    ) -> Result<Option<PricingResult>> {
        let Some(first) = items.first() else {
            return Ok(None);
        };
        let currency = first.unit_price.currency;
        let calculated_at = Utc::now();

        let mut prices = Vec::with_capacity(items.len());
        for item in items {
            if item.quantity <= 0 {
                return Err(CommerceError::InvalidQuantity(item.quantity));
            }
            let subtotal = item.subtotal()?;
            prices.push(LineItemPrice {
                line_item_id: item.id.clone(),
                subtotal,
                discount_amount: Money::zero(currency),
                tax_amount: Money::zero(currency),
                total: subtotal,
            });
        }
        let subtotal = Money::try_sum(prices.iter().map(|p| &p.subtotal), currency)?;

        let applied_discounts = self
            .evaluator
            .evaluate(items, &mut prices, &options.promotion_codes, calculated_at)
            .await?;
        let discount_total = Money::try_sum(prices.iter().map(|p| &p.discount_amount), currency)?;

        let shipping_total = match fixed_shipping {
            Some(cost) => {
                cost.ensure_same_currency(&subtotal)?;
                cost
            }
            None => self.quote_shipping(items, &subtotal, options).await?,
        };

        let tax = self
            .calculate_tax(items, &prices, shipping_total, options)
            .await?
            .unwrap_or_else(|| TaxResult::zero(currency));
        let tax_total = tax.total_tax;
        tax_total.ensure_same_currency(&subtotal)?;
        apply_line_taxes(&mut prices, &tax)?;

        for price in &mut prices {
            price.total = price
                .subtotal
                .subtract(&price.discount_amount)?
                .add(&price.tax_amount)?;
        }

        let total = subtotal
            .subtract(&discount_total)?
            .add(&tax_total)?
            .add(&shipping_total)?;

        let tax_lines = tax
            .rates
            .into_iter()
            .map(|r| TaxLine {
                name: r.name,
                rate: r.rate,
                amount: r.amount,
                jurisdiction: r.jurisdiction,
            })
            .collect();

        debug!(
            subtotal = subtotal.minor_units,
            discount = discount_total.minor_units,
            tax = tax_total.minor_units,
            shipping = shipping_total.minor_units,
            total = total.minor_units,
            "priced line items"
        );

        Ok(Some(PricingResult {
            subtotal,
            discount_total,
            tax_total,
            shipping_total,
            total,
            line_items: prices,
            applied_discounts,
            tax_lines,
            currency,
            calculated_at,
        }))
    }

    async fn quote_shipping(
        &self,
        items: &[LineItem],
        subtotal: &Money,
        options: &PricingOptions,
    ) -> Result<Money> {
        let zero = Money::zero(subtotal.currency);
        let (Some(method_id), Some(address), Some(calculator)) = (
            &options.shipping_method_id,
            &options.shipping_address,
            &self.shipping_calculator,
        ) else {
            return Ok(zero);
        };

        let request = RateRequest {
            items: items
                .iter()
                .map(|i| ShippableItem {
                    sku: i.sku.clone(),
                    quantity: i.quantity,
                })
                .collect(),
            destination: address.clone(),
            shipping_method_id: method_id.clone(),
            order_value: *subtotal,
        };

        match calculator.get_rate(&request).await {
            Ok(rate) => {
                rate.cost.ensure_same_currency(subtotal)?;
                Ok(rate.cost)
            }
            Err(e) => {
                warn!(method = %method_id, error = %e, "shipping quote failed, using zero shipping");
                Ok(zero)
            }
        }
    }

    async fn calculate_tax(
        &self,
        items: &[LineItem],
        prices: &[LineItemPrice],
        shipping_cost: Money,
        options: &PricingOptions,
    ) -> Result<Option<TaxResult>> {
        let (Some(address), Some(calculator)) = (&options.shipping_address, &self.tax_calculator)
        else {
            return Ok(None);
        };

        let line_items = items
            .iter()
            .zip(prices)
            .map(|(item, p)| {
                Ok(TaxableItem {
                    id: p.line_item_id.clone(),
                    amount: p.subtotal.subtract(&p.discount_amount)?,
                    quantity: item.quantity,
                    tax_code: None,
                    is_taxable: true,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let request = TaxRequest {
            line_items,
            shipping_cost,
            address: address.clone(),
            tax_inclusive: options.tax_inclusive,
        };

        match calculator.calculate(&request).await {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                warn!(error = %e, "tax calculation failed, using zero tax");
                Ok(None)
            }
        }
    }
}

/// Copy per-line taxes onto `prices`, spreading any tax not attributed to a
/// line (e.g. shipping tax) so that line taxes sum to the total.
fn apply_line_taxes(prices: &mut [LineItemPrice], tax: &TaxResult) -> Result<()> {
    let by_line: HashMap<&CartItemId, &Money> = tax
        .line_item_taxes
        .iter()
        .map(|t| (&t.line_item_id, &t.tax_amount))
        .collect();

    for price in prices.iter_mut() {
        if let Some(amount) = by_line.get(&price.line_item_id) {
            price.tax_amount.ensure_same_currency(amount)?;
            price.tax_amount = **amount;
        }
    }

    let currency: Currency = tax.total_tax.currency;
    let attributed = Money::try_sum(prices.iter().map(|p| &p.tax_amount), currency)?;
    let residual = tax.total_tax.subtract(&attributed)?;
    if !residual.is_zero() {
        let shares = residual.allocate(prices.len());
        for (price, share) in prices.iter_mut().zip(shares) {
            price.tax_amount = price.tax_amount.add(&share)?;
        }
    }
    Ok(())
}
