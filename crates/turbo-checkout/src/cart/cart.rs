//! Cart and cart item types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MAX_QUANTITY_PER_ITEM;
use crate::error::{CommerceError, Result};
use crate::ids::{CartId, CartItemId, ProductId, UserId, VariantId};
use crate::money::{Currency, Money};

/// A shopping cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cart {
    /// Unique cart identifier.
    pub id: CartId,
    /// User ID for authenticated carts.
    pub user_id: Option<UserId>,
    /// Session ID for guest carts.
    pub session_id: Option<String>,
    /// Items in the cart.
    pub items: Vec<CartItem>,
    /// Maximum quantity on a single line.
    #[serde(default = "default_max_quantity")]
    pub max_quantity_per_item: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_max_quantity() -> i64 {
    DEFAULT_MAX_QUANTITY_PER_ITEM
}

impl Cart {
    /// Create a new guest cart for a session.
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: CartId::generate(),
            user_id: None,
            session_id: Some(session_id.into()),
            items: Vec::new(),
            max_quantity_per_item: DEFAULT_MAX_QUANTITY_PER_ITEM,
            created_at: now,
            updated_at: now,
            expires_at: None,
        }
    }

    /// Create a cart for an authenticated user.
    pub fn for_user(user_id: UserId) -> Self {
        let mut cart = Self::new(String::new());
        cart.session_id = None;
        cart.user_id = Some(user_id);
        cart
    }

    /// Override the per-line quantity limit.
    pub fn with_max_quantity(mut self, limit: i64) -> Self {
        self.max_quantity_per_item = limit;
        self
    }

    /// Add an item, merging with an existing line for the same product and variant.
    ///
    /// Returns the id of the line that now holds the item. Fails if:
    /// - quantity is not positive
    /// - the merged quantity exceeds the line limit or overflows
    /// - the price currency differs from the items already in the cart
    pub fn add_item(&mut self, item: CartItem) -> Result<CartItemId> {
        if item.quantity <= 0 {
            return Err(CommerceError::InvalidQuantity(item.quantity));
        }
        if let Some(first) = self.items.first() {
            first.price.ensure_same_currency(&item.price)?;
        }

        let limit = self.max_quantity_per_item;
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|i| i.product_id == item.product_id && i.variant_id == item.variant_id)
        {
            let new_quantity = existing
                .quantity
                .checked_add(item.quantity)
                .ok_or(CommerceError::Overflow)?;
            if new_quantity > limit {
                return Err(CommerceError::QuantityExceedsLimit(new_quantity, limit));
            }
            existing.quantity = new_quantity;
            self.updated_at = Utc::now();
            return Ok(existing.id.clone());
        }

        if item.quantity > limit {
            return Err(CommerceError::QuantityExceedsLimit(item.quantity, limit));
        }

        let id = item.id.clone();
        self.items.push(item);
        self.updated_at = Utc::now();
        Ok(id)
    }

    /// Update a line's quantity. A quantity of zero or less removes the line.
    pub fn update_quantity(&mut self, item_id: &CartItemId, quantity: i64) -> Result<()> {
        if quantity <= 0 {
            return if self.remove_item(item_id) {
                Ok(())
            } else {
                Err(CommerceError::ItemNotInCart(item_id.to_string()))
            };
        }
        if quantity > self.max_quantity_per_item {
            return Err(CommerceError::QuantityExceedsLimit(
                quantity,
                self.max_quantity_per_item,
            ));
        }

        let item = self
            .items
            .iter_mut()
            .find(|i| &i.id == item_id)
            .ok_or_else(|| CommerceError::ItemNotInCart(item_id.to_string()))?;
        item.quantity = quantity;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Remove a line. Returns whether anything was removed.
    pub fn remove_item(&mut self, item_id: &CartItemId) -> bool {
        let len_before = self.items.len();
        self.items.retain(|i| &i.id != item_id);
        let removed = self.items.len() < len_before;
        if removed {
            self.updated_at = Utc::now();
        }
        removed
    }

    /// Clear all items from the cart.
    pub fn clear(&mut self) {
        self.items.clear();
        self.updated_at = Utc::now();
    }

    /// Merge another cart's items into this one (e.g., guest cart on login).
    pub fn merge(&mut self, other: &Cart) -> Result<()> {
        for item in &other.items {
            let mut incoming = item.clone();
            incoming.id = CartItemId::generate();
            self.add_item(incoming)?;
        }
        Ok(())
    }

    /// Total item count (sum of quantities).
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Currency of the first line, if any.
    pub fn currency(&self) -> Option<Currency> {
        self.items.first().map(|i| i.price.currency)
    }

    pub fn find_item(&self, item_id: &CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|i| &i.id == item_id)
    }

    /// Sum of line totals, in the currency of the first line.
    pub fn subtotal(&self) -> Result<Money> {
        let currency = self.currency().unwrap_or_default();
        self.items.iter().try_fold(Money::zero(currency), |acc, item| {
            acc.add(&item.line_total()?)
        })
    }
}

/// A line in the cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub sku: String,
    pub name: String,
    /// Unit price at the time the item was added.
    pub price: Money,
    pub quantity: i64,
    /// Selected options (e.g., size, color).
    pub attributes: BTreeMap<String, String>,
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    pub fn new(
        product_id: ProductId,
        sku: impl Into<String>,
        name: impl Into<String>,
        price: Money,
        quantity: i64,
    ) -> Self {
        Self {
            id: CartItemId::generate(),
            product_id,
            variant_id: None,
            sku: sku.into(),
            name: name.into(),
            price,
            quantity,
            attributes: BTreeMap::new(),
            added_at: Utc::now(),
        }
    }

    pub fn with_variant(mut self, variant_id: VariantId) -> Self {
        self.variant_id = Some(variant_id);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Unit price times quantity.
    pub fn line_total(&self) -> Result<Money> {
        self.price.multiply(self.quantity)
    }
}
