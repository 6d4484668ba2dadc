//! Pricing inputs and results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::CartItem;
use crate::error::Result;
use crate::ids::{CartItemId, ProductId, PromotionId, VariantId};
use crate::money::{Currency, Money};
use crate::pricing::DiscountKind;

/// An item to be priced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub sku: String,
    pub name: String,
    pub unit_price: Money,
    /// Must be positive.
    pub quantity: i64,
    pub attributes: BTreeMap<String, String>,
}

impl LineItem {
    /// Unit price times quantity.
    pub fn subtotal(&self) -> Result<Money> {
        self.unit_price.multiply(self.quantity)
    }
}

impl From<&CartItem> for LineItem {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.id.clone(),
            product_id: item.product_id.clone(),
            variant_id: item.variant_id.clone(),
            sku: item.sku.clone(),
            name: item.name.clone(),
            unit_price: item.price,
            quantity: item.quantity,
            attributes: item.attributes.clone(),
        }
    }
}

/// Minimal address used for tax and shipping lookups.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PricingAddress {
    pub country: String,
    pub state: String,
    pub city: String,
    pub postal_code: String,
}

/// Pricing details for a single line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItemPrice {
    pub line_item_id: CartItemId,
    /// Unit price times quantity.
    pub subtotal: Money,
    /// Sum of every promotion's discount on this line.
    pub discount_amount: Money,
    pub tax_amount: Money,
    /// `subtotal - discount_amount + tax_amount`.
    pub total: Money,
}

/// A promotion that produced a non-zero discount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppliedDiscount {
    pub promotion_id: PromotionId,
    pub code: String,
    pub name: String,
    pub discount_kind: DiscountKind,
    pub amount: Money,
    /// Lines the promotion discounted.
    pub applied_to_items: Vec<CartItemId>,
}

/// A tax rate that contributed to the total.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaxLine {
    pub name: String,
    /// Fraction, e.g. `0.08` for 8%.
    pub rate: f64,
    pub amount: Money,
    pub jurisdiction: String,
}

/// Complete pricing breakdown.
///
/// `total == subtotal - discount_total + tax_total + shipping_total`, and the
/// line totals sum to `subtotal - discount_total + tax_total`. Shipping is
/// cart-level and never allocated to lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingResult {
    pub subtotal: Money,
    pub discount_total: Money,
    pub tax_total: Money,
    pub shipping_total: Money,
    pub total: Money,
    pub line_items: Vec<LineItemPrice>,
    pub applied_discounts: Vec<AppliedDiscount>,
    pub tax_lines: Vec<TaxLine>,
    pub currency: Currency,
    pub calculated_at: DateTime<Utc>,
}

impl PricingResult {
    pub fn has_discounts(&self) -> bool {
        self.discount_total.is_positive()
    }

    /// Pricing for one line.
    pub fn line(&self, id: &CartItemId) -> Option<&LineItemPrice> {
        self.line_items.iter().find(|l| &l.line_item_id == id)
    }
}
