//! Inventory reservation contract and an in-memory stock ledger.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{CommerceError, Result};

/// Stock for one SKU.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StockLevel {
    /// Physical quantity on hand.
    pub on_hand: i64,
    /// Quantity held for unshipped orders.
    pub reserved: i64,
    /// Restock when available stock falls to this level.
    pub reorder_point: Option<i64>,
    /// Untracked SKUs always have stock.
    pub track_inventory: bool,
    /// Whether to allow orders when out of stock.
    pub allow_backorder: bool,
}

impl StockLevel {
    /// Create a tracked stock level.
    pub fn new(on_hand: i64) -> Self {
        Self {
            on_hand,
            reserved: 0,
            reorder_point: None,
            track_inventory: true,
            allow_backorder: false,
        }
    }

    /// Stock that is never exhausted.
    pub fn untracked() -> Self {
        Self {
            track_inventory: false,
            allow_backorder: true,
            ..Self::default()
        }
    }

    pub fn with_reorder_point(mut self, point: i64) -> Self {
        self.reorder_point = Some(point);
        self
    }

    /// On hand minus reserved.
    pub fn available(&self) -> i64 {
        self.on_hand - self.reserved
    }

    pub fn can_fulfill(&self, quantity: i64) -> bool {
        !self.track_inventory || self.allow_backorder || self.available() >= quantity
    }

    pub fn needs_reorder(&self) -> bool {
        self.track_inventory
            && self
                .reorder_point
                .map(|point| self.available() <= point)
                .unwrap_or(false)
    }

    fn reserve(&mut self, sku: &str, quantity: i64) -> Result<()> {
        if !self.can_fulfill(quantity) {
            return Err(CommerceError::InsufficientStock {
                sku: sku.to_string(),
                requested: quantity,
                available: self.available().max(0),
            });
        }
        self.reserved += quantity;
        Ok(())
    }

    fn release(&mut self, quantity: i64) {
        self.reserved = (self.reserved - quantity).max(0);
    }

    /// Ship reserved stock.
    fn commit(&mut self, quantity: i64) {
        self.reserved = (self.reserved - quantity).max(0);
        self.on_hand = (self.on_hand - quantity).max(0);
    }
}

/// Reserves and releases stock on behalf of an order.
///
/// Reservations are grouped under a reference id (the order id), so every
/// reservation taken for one order can be released together.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Units available to reserve.
    async fn available_stock(&self, sku: &str) -> Result<i64>;

    /// Reserve `quantity` units or fail with `InsufficientStock`.
    async fn reserve(&self, sku: &str, quantity: i64, reference_id: &str) -> Result<()>;

    /// Release units reserved under `reference_id`. Releasing more than is
    /// held releases what is held.
    async fn release(&self, sku: &str, quantity: i64, reference_id: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct Ledger {
    stock: HashMap<String, StockLevel>,
    /// reference id -> sku -> reserved quantity
    reservations: HashMap<String, HashMap<String, i64>>,
}

/// In-memory inventory with a reservation ledger.
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    ledger: RwLock<Ledger>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stock level for a SKU.
    pub async fn set_stock(&self, sku: impl Into<String>, level: StockLevel) {
        self.ledger.write().await.stock.insert(sku.into(), level);
    }

    pub async fn stock_level(&self, sku: &str) -> Option<StockLevel> {
        self.ledger.read().await.stock.get(sku).cloned()
    }

    /// Quantity of `sku` held under `reference_id`.
    pub async fn reserved_for(&self, reference_id: &str, sku: &str) -> i64 {
        self.ledger
            .read()
            .await
            .reservations
            .get(reference_id)
            .and_then(|held| held.get(sku))
            .copied()
            .unwrap_or(0)
    }

    /// Convert every reservation under `reference_id` into shipped stock.
    pub async fn commit(&self, reference_id: &str) {
        let mut ledger = self.ledger.write().await;
        let Some(held) = ledger.reservations.remove(reference_id) else {
            return;
        };
        for (sku, quantity) in held {
            if let Some(level) = ledger.stock.get_mut(&sku) {
                level.commit(quantity);
            }
        }
    }
}

#[async_trait]
impl InventoryService for InMemoryInventory {
    async fn available_stock(&self, sku: &str) -> Result<i64> {
        Ok(self
            .ledger
            .read()
            .await
            .stock
            .get(sku)
            .map(StockLevel::available)
            .unwrap_or(0))
    }

    async fn reserve(&self, sku: &str, quantity: i64, reference_id: &str) -> Result<()> {
        if quantity <= 0 {
            return Err(CommerceError::InvalidQuantity(quantity));
        }
        let mut ledger = self.ledger.write().await;
        let level = ledger
            .stock
            .get_mut(sku)
            .ok_or_else(|| CommerceError::InsufficientStock {
                sku: sku.to_string(),
                requested: quantity,
                available: 0,
            })?;
        level.reserve(sku, quantity)?;

        *ledger
            .reservations
            .entry(reference_id.to_string())
            .or_default()
            .entry(sku.to_string())
            .or_insert(0) += quantity;
        Ok(())
    }

    async fn release(&self, sku: &str, quantity: i64, reference_id: &str) -> Result<()> {
        let mut ledger = self.ledger.write().await;
        let Some(held) = ledger.reservations.get_mut(reference_id) else {
            return Ok(());
        };
        let Some(reserved) = held.get_mut(sku) else {
            return Ok(());
        };

        let released = quantity.min(*reserved);
        *reserved -= released;
        if *reserved == 0 {
            held.remove(sku);
        }
        if held.is_empty() {
            ledger.reservations.remove(reference_id);
        }
        if let Some(level) = ledger.stock.get_mut(sku) {
            level.release(released);
        }
        Ok(())
    }
}
