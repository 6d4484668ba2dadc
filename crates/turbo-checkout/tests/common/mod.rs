//! Recording collaborators shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use turbo_checkout::error::Result;
use turbo_checkout::prelude::*;
use turbo_checkout::shipping::{RateRequest, ShippingRate};
use turbo_checkout::tax::{TaxRequest, TaxResult};

pub fn usd(units: i64) -> Money {
    Money::new(units, Currency::USD)
}

pub fn address() -> Address {
    Address::new("Ada", "Lovelace", "12 Analytical Row", "San Jose", "95113", "US")
        .with_state("CA")
}

pub fn cart_with(lines: &[(&str, i64, i64)]) -> Cart {
    let mut cart = Cart::for_user(UserId::new("user-1"));
    for (sku, unit, quantity) in lines {
        cart.add_item(CartItem::new(
            ProductId::new(sku.to_lowercase()),
            *sku,
            format!("Product {}", sku),
            usd(*unit),
            *quantity,
        ))
        .unwrap();
    }
    cart
}

pub fn details() -> OrderDetails {
    OrderDetails::new(UserId::new("user-1"), address(), "pm_card_visa")
}

/// In-memory inventory that counts calls.
#[derive(Default)]
pub struct RecordingInventory {
    pub inner: InMemoryInventory,
    pub reserve_calls: AtomicUsize,
    pub release_calls: AtomicUsize,
}

impl RecordingInventory {
    pub async fn stocked(levels: &[(&str, i64)]) -> Arc<Self> {
        let inventory = Self::default();
        for (sku, on_hand) in levels {
            inventory.inner.set_stock(*sku, StockLevel::new(*on_hand)).await;
        }
        Arc::new(inventory)
    }

    pub fn calls(&self) -> usize {
        self.reserve_calls.load(Ordering::SeqCst) + self.release_calls.load(Ordering::SeqCst)
    }

    pub async fn reserved(&self, sku: &str) -> i64 {
        self.inner
            .stock_level(sku)
            .await
            .map(|l| l.reserved)
            .unwrap_or(0)
    }
}

#[async_trait]
impl InventoryService for RecordingInventory {
    async fn available_stock(&self, sku: &str) -> Result<i64> {
        self.inner.available_stock(sku).await
    }

    async fn reserve(&self, sku: &str, quantity: i64, reference_id: &str) -> Result<()> {
        self.reserve_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.reserve(sku, quantity, reference_id).await
    }

    async fn release(&self, sku: &str, quantity: i64, reference_id: &str) -> Result<()> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.release(sku, quantity, reference_id).await
    }
}

/// Order store that counts calls and can be told to fail saves.
#[derive(Default)]
pub struct RecordingOrders {
    pub inner: InMemoryOrderRepository,
    pub calls: AtomicUsize,
    pub saves: AtomicUsize,
    pub fail_saves: AtomicBool,
    /// Fail only saves of orders already marked paid.
    pub fail_paid_saves: AtomicBool,
}

impl RecordingOrders {
    pub fn failing() -> Arc<Self> {
        let orders = Self::default();
        orders.fail_saves.store(true, Ordering::SeqCst);
        Arc::new(orders)
    }

    pub fn failing_paid() -> Arc<Self> {
        let orders = Self::default();
        orders.fail_paid_saves.store(true, Ordering::SeqCst);
        Arc::new(orders)
    }
}

#[async_trait]
impl OrderRepository for RecordingOrders {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_id(id).await
    }

    async fn find_by_order_number(&self, order_number: &str) -> Result<Option<Order>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_order_number(order_number).await
    }

    async fn find_by_user_id(&self, user_id: &UserId, filter: &OrderFilter) -> Result<Vec<Order>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_user_id(user_id, filter).await
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_idempotency_key(key).await
    }

    async fn save(&self, order: &Order) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let paid = order.status == OrderStatus::Paid;
        if self.fail_saves.load(Ordering::SeqCst)
            || (paid && self.fail_paid_saves.load(Ordering::SeqCst))
        {
            return Err(CommerceError::Repository("database unavailable".to_string()));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(order).await
    }
}

/// Gateway that answers every request with a fixed outcome.
pub struct ScriptedGateway {
    /// `None` makes the gateway itself fail.
    pub status: Option<IntentStatus>,
    pub calls: AtomicUsize,
    pub last_request: Mutex<Option<IntentRequest>>,
}

impl ScriptedGateway {
    pub fn returning(status: IntentStatus) -> Arc<Self> {
        Arc::new(Self {
            status: Some(status),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            status: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        let status = self
            .status
            .ok_or_else(|| CommerceError::collaborator("payments", "gateway timeout"))?;
        Ok(PaymentIntent {
            id: format!("pi_{}", request.order_id),
            amount: request.amount,
            status,
            payment_method_id: request.payment_method_id.clone(),
            order_id: request.order_id.clone(),
            failure_reason: (status == IntentStatus::Failed).then(|| "card declined".to_string()),
            created_at: Utc::now(),
        })
    }
}

/// Tax calculator that is always down.
#[derive(Default)]
pub struct FailingTax {
    pub calls: AtomicUsize,
}

#[async_trait]
impl TaxCalculator for FailingTax {
    async fn calculate(&self, _request: &TaxRequest) -> Result<TaxResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CommerceError::collaborator("tax", "connection refused"))
    }

    async fn rates_for_address(&self, _address: &PricingAddress) -> Result<Vec<TaxRate>> {
        Err(CommerceError::collaborator("tax", "connection refused"))
    }
}

/// Shipping calculator that is always down.
#[derive(Default)]
pub struct FailingShipping {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ShippingRateCalculator for FailingShipping {
    async fn get_rate(&self, _request: &RateRequest) -> Result<ShippingRate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CommerceError::collaborator("shipping", "carrier API unavailable"))
    }

    async fn get_available_rates(&self, _request: &RateRequest) -> Result<Vec<ShippingRate>> {
        Err(CommerceError::collaborator("shipping", "carrier API unavailable"))
    }
}

/// Promotion store whose lookups always fail.
#[derive(Default)]
pub struct BrokenPromotions;

#[async_trait]
impl PromotionRepository for BrokenPromotions {
    async fn find_by_code(&self, _code: &str) -> Result<Option<Promotion>> {
        Err(CommerceError::Repository("promotions table locked".to_string()))
    }

    async fn find_active(&self, _at: DateTime<Utc>) -> Result<Vec<Promotion>> {
        Err(CommerceError::Repository("promotions table locked".to_string()))
    }

    async fn save(&self, _promotion: Promotion) -> Result<()> {
        Err(CommerceError::Repository("promotions table locked".to_string()))
    }

    async fn increment_usage(&self, _id: &PromotionId) -> Result<bool> {
        Err(CommerceError::Repository("promotions table locked".to_string()))
    }
}

/// California sales tax at 8.75%.
pub fn california_tax() -> Arc<FlatRateTaxCalculator> {
    Arc::new(FlatRateTaxCalculator::new(vec![
        TaxRate::new("us-ca", "California sales tax", 0.0875)
            .in_country("US")
            .in_state("CA"),
    ]))
}

pub fn promotions(promotions: Vec<Promotion>) -> Arc<InMemoryPromotionRepository> {
    Arc::new(InMemoryPromotionRepository::with_promotions(promotions))
}
