//! Order creation and lifecycle operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cart::{Cart, CartRepository};
use crate::config::CheckoutConfig;
use crate::error::{CommerceError, Result};
use crate::ids::{CartId, OrderId, ShippingMethodId, UserId};
use crate::inventory::InventoryService;
use crate::orders::{
    Address, ClockOrderNumbers, Order, OrderFilter, OrderItem, OrderNumberGenerator,
    OrderRepository, OrderStatus,
};
use crate::payments::{IntentRequest, IntentStatus, PaymentGateway};
use crate::pricing::{PricingAddress, PricingEngine, PricingOptions, PricingResult};

/// Everything besides the cart needed to place an order.
#[derive(Debug, Clone)]
pub struct OrderDetails {
    pub user_id: UserId,
    pub shipping_address: Address,
    /// Falls back to the shipping address when missing or incomplete.
    pub billing_address: Option<Address>,
    pub payment_method_id: String,
    pub promotion_codes: Vec<String>,
    pub shipping_method_id: Option<ShippingMethodId>,
    pub notes: String,
    /// Repeat calls with the same key return the first order.
    pub idempotency_key: Option<String>,
    /// Checked before pricing, before reserving stock and before saving.
    pub cancellation: Option<CancellationToken>,
}

impl OrderDetails {
    pub fn new(
        user_id: UserId,
        shipping_address: Address,
        payment_method_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            shipping_address,
            billing_address: None,
            payment_method_id: payment_method_id.into(),
            promotion_codes: Vec::new(),
            shipping_method_id: None,
            notes: String::new(),
            idempotency_key: None,
            cancellation: None,
        }
    }

    pub fn with_billing_address(mut self, address: Address) -> Self {
        self.billing_address = Some(address);
        self
    }

    pub fn with_promotion_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.promotion_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_shipping_method(mut self, method: impl Into<ShippingMethodId>) -> Self {
        self.shipping_method_id = Some(method.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn ensure_not_cancelled(&self) -> Result<()> {
        match &self.cancellation {
            Some(token) if token.is_cancelled() => Err(CommerceError::Cancelled),
            _ => Ok(()),
        }
    }
}

/// Stock reserved for one order, released together on failure.
struct Reservations<'a> {
    inventory: Option<&'a Arc<dyn InventoryService>>,
    order_id: &'a OrderId,
    held: Vec<(String, i64)>,
}

impl Reservations<'_> {
    async fn release_all(&self) {
        let Some(inventory) = self.inventory else {
            return;
        };
        for (sku, quantity) in &self.held {
            if let Err(e) = inventory
                .release(sku, *quantity, self.order_id.as_str())
                .await
            {
                error!(
                    order_id = %self.order_id,
                    sku = %sku,
                    quantity,
                    error = %e,
                    "failed to release inventory reservation"
                );
            }
        }
    }
}

/// Attempts at drawing an order number not already in the repository.
const ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Turns carts into orders and manages them afterwards.
///
/// Inventory, payment and cart lookup are optional. Without an inventory
/// service no stock is reserved; without a payment gateway orders stay
/// `pending`.
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    pricing: PricingEngine,
    carts: Option<Arc<dyn CartRepository>>,
    inventory: Option<Arc<dyn InventoryService>>,
    payments: Option<Arc<dyn PaymentGateway>>,
    /// Set by [`OrderService::with_order_numbers`]; otherwise numbers come
    /// from `default_numbers`, which follows the configured prefix.
    order_numbers: Option<Arc<dyn OrderNumberGenerator>>,
    default_numbers: ClockOrderNumbers,
    config: CheckoutConfig,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderRepository>, pricing: PricingEngine) -> Self {
        let config = CheckoutConfig::default();
        Self {
            orders,
            pricing,
            carts: None,
            inventory: None,
            payments: None,
            order_numbers: None,
            default_numbers: ClockOrderNumbers::new(&config.order_number_prefix),
            config,
        }
    }

    /// Apply configuration. A generator set with `with_order_numbers` is kept.
    pub fn with_config(mut self, config: CheckoutConfig) -> Self {
        self.default_numbers = ClockOrderNumbers::new(&config.order_number_prefix);
        self.config = config;
        self
    }

    pub fn with_order_numbers(mut self, generator: Arc<dyn OrderNumberGenerator>) -> Self {
        self.order_numbers = Some(generator);
        self
    }

    pub fn with_cart_repository(mut self, carts: Arc<dyn CartRepository>) -> Self {
        self.carts = Some(carts);
        self
    }

    pub fn with_inventory(mut self, inventory: Arc<dyn InventoryService>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    pub fn with_payment_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.payments = Some(gateway);
        self
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// Create an order from a stored cart.
    pub async fn create_from_cart_id(&self, cart_id: &CartId, details: OrderDetails) -> Result<Order> {
        let carts = self
            .carts
            .as_ref()
            .ok_or_else(|| CommerceError::Config("no cart repository configured".to_string()))?;
        let cart = carts
            .find_by_id(cart_id)
            .await?
            .ok_or_else(|| CommerceError::CartNotFound(cart_id.to_string()))?;
        self.create_from_cart(&cart, details).await
    }

    /// Create an order from a cart.
    ///
    /// Prices the cart, reserves stock for every line, saves the order as
    /// `pending`, then requests payment. A failed reservation or save releases
    /// all stock reserved for the order. A failed payment leaves the saved
    /// order `pending` with its stock reserved and returns
    /// [`CommerceError::PaymentFailed`]. Clearing the cart is left to the
    /// caller.
    #[tracing::instrument(skip_all, fields(cart_id = %cart.id, user_id = %details.user_id))]
    pub async fn create_from_cart(&self, cart: &Cart, details: OrderDetails) -> Result<Order> {
        self.validate_cart(cart)?;
        details.shipping_address.validate()?;

        if let Some(key) = &details.idempotency_key {
            if let Some(existing) = self.orders.find_by_idempotency_key(key).await? {
                info!(order_id = %existing.id, "order already created for idempotency key");
                return Ok(existing);
            }
        }

        details.ensure_not_cancelled()?;
        let options = PricingOptions {
            promotion_codes: details.promotion_codes.clone(),
            shipping_method_id: details.shipping_method_id.clone(),
            shipping_address: Some(PricingAddress::from(&details.shipping_address)),
            tax_inclusive: self.config.tax_inclusive,
        };
        let pricing = self
            .pricing
            .price_cart(cart, &options)
            .await?
            .ok_or(CommerceError::EmptyCart)?;

        let order_id = OrderId::generate();
        let order_number = self.next_order_number().await?;

        details.ensure_not_cancelled()?;
        let reservations = self.reserve_inventory(cart, &order_id).await?;

        let order = self.build_order(order_id.clone(), order_number, cart, &pricing, details.clone());

        if let Err(e) = details.ensure_not_cancelled() {
            reservations.release_all().await;
            return Err(e);
        }
        if let Err(e) = self.orders.save(&order).await {
            warn!(order_id = %order.id, error = %e, "failed to save order, releasing inventory");
            reservations.release_all().await;
            return Err(e);
        }
        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "order created"
        );

        self.record_promotion_usage(&pricing).await;

        match &self.payments {
            Some(gateway) => self.authorize_payment(gateway.as_ref(), order).await,
            None => Ok(order),
        }
    }

    fn validate_cart(&self, cart: &Cart) -> Result<()> {
        if cart.is_empty() {
            return Err(CommerceError::EmptyCart);
        }
        let limit = self.config.max_quantity_per_item;
        for item in &cart.items {
            if item.quantity <= 0 {
                return Err(CommerceError::InvalidQuantity(item.quantity));
            }
            if item.quantity > limit {
                return Err(CommerceError::QuantityExceedsLimit(item.quantity, limit));
            }
        }
        Ok(())
    }

    /// Draw an order number that no stored order uses yet.
    async fn next_order_number(&self) -> Result<String> {
        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            let number = match &self.order_numbers {
                Some(generator) => generator.next_number(),
                None => self.default_numbers.next_number(),
            };
            if self.orders.find_by_order_number(&number).await?.is_none() {
                return Ok(number);
            }
            warn!(order_number = %number, "order number already taken, drawing another");
        }
        Err(CommerceError::Repository(format!(
            "no unused order number after {} attempts",
            ORDER_NUMBER_ATTEMPTS
        )))
    }

    async fn reserve_inventory<'a>(
        &'a self,
        cart: &Cart,
        order_id: &'a OrderId,
    ) -> Result<Reservations<'a>> {
        let mut reservations = Reservations {
            inventory: self.inventory.as_ref(),
            order_id,
            held: Vec::with_capacity(cart.items.len()),
        };
        let Some(inventory) = &self.inventory else {
            return Ok(reservations);
        };

        for item in &cart.items {
            if let Err(e) = inventory
                .reserve(&item.sku, item.quantity, order_id.as_str())
                .await
            {
                warn!(
                    sku = %item.sku,
                    quantity = item.quantity,
                    error = %e,
                    "reservation failed, releasing earlier reservations"
                );
                reservations.release_all().await;
                return Err(e);
            }
            reservations.held.push((item.sku.clone(), item.quantity));
        }
        Ok(reservations)
    }

    fn build_order(
        &self,
        id: OrderId,
        order_number: String,
        cart: &Cart,
        pricing: &PricingResult,
        details: OrderDetails,
    ) -> Order {
        let items = cart
            .items
            .iter()
            .zip(&pricing.line_items)
            .map(|(item, price)| OrderItem::from_cart_item(item, price))
            .collect();

        let billing_address = match details.billing_address {
            Some(billing) if billing.is_complete() => billing,
            _ => details.shipping_address.clone(),
        };

        let now = Utc::now();
        Order {
            id,
            order_number,
            user_id: details.user_id,
            status: OrderStatus::Pending,
            items,
            shipping_address: details.shipping_address,
            billing_address,
            payment_method_id: details.payment_method_id,
            subtotal: pricing.subtotal,
            discount_total: pricing.discount_total,
            tax_total: pricing.tax_total,
            shipping_total: pricing.shipping_total,
            total: pricing.total,
            currency: pricing.currency,
            promotion_codes: pricing
                .applied_discounts
                .iter()
                .map(|d| d.code.clone())
                .collect(),
            notes: details.notes,
            idempotency_key: details.idempotency_key,
            created_at: now,
            updated_at: now,
            completed_at: None,
            canceled_at: None,
        }
    }

    async fn record_promotion_usage(&self, pricing: &PricingResult) {
        for discount in &pricing.applied_discounts {
            match self
                .pricing
                .promotions()
                .increment_usage(&discount.promotion_id)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    warn!(code = %discount.code, "promotion usage limit reached while recording use")
                }
                Err(e) => warn!(code = %discount.code, error = %e, "failed to record promotion use"),
            }
        }
    }

    async fn authorize_payment(&self, gateway: &dyn PaymentGateway, mut order: Order) -> Result<Order> {
        let mut metadata = BTreeMap::new();
        metadata.insert("order_number".to_string(), order.order_number.clone());
        let request = IntentRequest {
            amount: order.total,
            payment_method_id: order.payment_method_id.clone(),
            order_id: order.id.clone(),
            description: format!("Order {}", order.order_number),
            capture_method: self.config.capture_method,
            metadata,
        };

        let failed = |order: &Order, reason: String| {
            warn!(order_id = %order.id, reason = %reason, "payment failed, order left pending");
            CommerceError::PaymentFailed {
                order_id: order.id.to_string(),
                order_number: order.order_number.clone(),
                reason,
            }
        };

        let intent = match gateway.create_intent(&request).await {
            Ok(intent) => intent,
            Err(e) => return Err(failed(&order, e.to_string())),
        };

        match intent.status {
            status if status.is_failure() => {
                let reason = intent
                    .failure_reason
                    .unwrap_or_else(|| format!("payment intent {}", status));
                Err(failed(&order, reason))
            }
            IntentStatus::Succeeded => {
                order.update_status(OrderStatus::Paid)?;
                if let Err(e) = self.orders.save(&order).await {
                    error!(
                        order_id = %order.id,
                        order_number = %order.order_number,
                        intent_id = %intent.id,
                        error = %e,
                        "payment succeeded but paid order was not saved"
                    );
                    return Err(CommerceError::PaymentNotRecorded {
                        order_id: order.id.to_string(),
                        order_number: order.order_number.clone(),
                        intent_id: intent.id,
                        reason: e.to_string(),
                    });
                }
                info!(order_id = %order.id, intent_id = %intent.id, "order paid");
                Ok(order)
            }
            status => {
                info!(
                    order_id = %order.id,
                    intent_id = %intent.id,
                    status = %status,
                    "payment not yet complete, order left pending"
                );
                Ok(order)
            }
        }
    }

    pub async fn get_order(&self, id: &OrderId) -> Result<Order> {
        self.orders
            .find_by_id(id)
            .await?
            .ok_or_else(|| CommerceError::OrderNotFound(id.to_string()))
    }

    pub async fn get_order_by_number(&self, order_number: &str) -> Result<Order> {
        self.orders
            .find_by_order_number(order_number)
            .await?
            .ok_or_else(|| CommerceError::OrderNotFound(order_number.to_string()))
    }

    /// A user's orders, newest first.
    pub async fn get_user_orders(&self, user_id: &UserId, filter: &OrderFilter) -> Result<Vec<Order>> {
        self.orders.find_by_user_id(user_id, filter).await
    }

    /// Move an order to a new status and save it.
    pub async fn update_status(&self, id: &OrderId, status: OrderStatus) -> Result<Order> {
        let mut order = self.get_order(id).await?;
        order.update_status(status)?;
        self.orders.save(&order).await?;
        info!(order_id = %order.id, status = %status, "order status updated");
        Ok(order)
    }

    /// Cancel an order, releasing its reserved stock and noting the reason.
    pub async fn cancel_order(&self, id: &OrderId, reason: &str) -> Result<Order> {
        let mut order = self.get_order(id).await?;
        if !order.is_cancelable() {
            return Err(CommerceError::InvalidStatus {
                from: order.status,
                to: OrderStatus::Canceled,
            });
        }
        order.update_status(OrderStatus::Canceled)?;

        if let Some(inventory) = &self.inventory {
            for item in &order.items {
                if let Err(e) = inventory
                    .release(&item.sku, item.quantity, order.id.as_str())
                    .await
                {
                    warn!(order_id = %order.id, sku = %item.sku, error = %e, "failed to release inventory");
                }
            }
        }

        order.append_note(&format!("Canceled: {}", reason));
        self.orders.save(&order).await?;
        info!(order_id = %order.id, reason = %reason, "order canceled");
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{CartItem, InMemoryCartRepository};
    use crate::ids::ProductId;
    use crate::inventory::{InMemoryInventory, StockLevel};
    use crate::money::{Currency, Money};
    use crate::orders::InMemoryOrderRepository;
    use crate::pricing::InMemoryPromotionRepository;

    fn address() -> Address {
        Address::new("Grace", "Hopper", "1 Navy Way", "Arlington", "22202", "US").with_state("VA")
    }

    fn cart() -> Cart {
        let mut cart = Cart::for_user(UserId::new("user-1"));
        cart.add_item(CartItem::new(
            ProductId::new("mug"),
            "MUG",
            "Mug",
            Money::new(1200, Currency::USD),
            2,
        ))
        .unwrap();
        cart
    }

    fn details() -> OrderDetails {
        OrderDetails::new(UserId::new("user-1"), address(), "pm_card")
    }

    async fn service() -> (OrderService, Arc<InMemoryInventory>) {
        let inventory = Arc::new(InMemoryInventory::new());
        inventory.set_stock("MUG", StockLevel::new(10)).await;
        let pricing = PricingEngine::new(Arc::new(InMemoryPromotionRepository::new()));
        let service = OrderService::new(Arc::new(InMemoryOrderRepository::new()), pricing)
            .with_inventory(inventory.clone());
        (service, inventory)
    }

    #[tokio::test]
    async fn test_order_without_payment_stays_pending() {
        let (service, inventory) = service().await;
        let order = service.create_from_cart(&cart(), details()).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total, Money::new(2400, Currency::USD));
        assert_eq!(order.item_count(), 2);
        assert_eq!(order.billing_address, address());
        assert!(order.order_number.starts_with("ORD-"));
        assert_eq!(inventory.reserved_for(order.id.as_str(), "MUG").await, 2);
    }

    #[tokio::test]
    async fn test_configured_prefix() {
        let (service, _) = service().await;
        let config = CheckoutConfig::from_toml_str("order_number_prefix = \"TC\"").unwrap();
        let service = service.with_config(config);

        let order = service.create_from_cart(&cart(), details()).await.unwrap();
        assert!(order.order_number.starts_with("TC-"));
    }

    /// Hands out the listed numbers in order, then repeats the last one.
    struct ListedNumbers(std::sync::Mutex<Vec<&'static str>>);

    impl ListedNumbers {
        fn new(numbers: &[&'static str]) -> Arc<Self> {
            let mut numbers = numbers.to_vec();
            numbers.reverse();
            Arc::new(Self(std::sync::Mutex::new(numbers)))
        }
    }

    impl OrderNumberGenerator for ListedNumbers {
        fn next_number(&self) -> String {
            let mut numbers = self.0.lock().unwrap();
            if numbers.len() > 1 {
                numbers.pop().unwrap().to_string()
            } else {
                numbers[0].to_string()
            }
        }
    }

    #[tokio::test]
    async fn test_custom_numbers_survive_config() {
        let (service, _) = service().await;
        let service = service
            .with_order_numbers(ListedNumbers::new(&["CUSTOM-1"]))
            .with_config(CheckoutConfig::default());

        let order = service.create_from_cart(&cart(), details()).await.unwrap();
        assert_eq!(order.order_number, "CUSTOM-1");
    }

    #[tokio::test]
    async fn test_taken_order_number_is_skipped() {
        let (service, _) = service().await;
        let service = service.with_order_numbers(ListedNumbers::new(&["DUP-1", "DUP-1", "DUP-2"]));

        let first = service.create_from_cart(&cart(), details()).await.unwrap();
        let second = service.create_from_cart(&cart(), details()).await.unwrap();
        assert_eq!(first.order_number, "DUP-1");
        assert_eq!(second.order_number, "DUP-2");
    }

    #[tokio::test]
    async fn test_exhausted_order_numbers_fail_before_reserving() {
        let (service, inventory) = service().await;
        let service = service.with_order_numbers(ListedNumbers::new(&["SAME"]));

        service.create_from_cart(&cart(), details()).await.unwrap();
        let err = service.create_from_cart(&cart(), details()).await.unwrap_err();

        assert!(matches!(err, CommerceError::Repository(_)));
        assert_eq!(inventory.available_stock("MUG").await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_services_sharing_a_repository_issue_distinct_numbers() {
        let orders = Arc::new(InMemoryOrderRepository::new());
        let pricing = PricingEngine::new(Arc::new(InMemoryPromotionRepository::new()));
        let a = OrderService::new(orders.clone(), pricing.clone());
        let b = OrderService::new(orders.clone(), pricing);

        let first = a.create_from_cart(&cart(), details()).await.unwrap();
        let second = b.create_from_cart(&cart(), details()).await.unwrap();

        assert_ne!(first.order_number, second.order_number);
        assert_eq!(
            b.get_order_by_number(&first.order_number).await.unwrap().id,
            first.id
        );
    }

    #[tokio::test]
    async fn test_cancel_order_releases_stock() {
        let (service, inventory) = service().await;
        let order = service
            .create_from_cart(&cart(), details().with_notes("Gift wrap"))
            .await
            .unwrap();

        let canceled = service.cancel_order(&order.id, "customer request").await.unwrap();
        assert_eq!(canceled.status, OrderStatus::Canceled);
        assert!(canceled.canceled_at.is_some());
        assert_eq!(canceled.notes, "Gift wrap\nCanceled: customer request");
        assert_eq!(inventory.available_stock("MUG").await.unwrap(), 10);

        assert_eq!(
            service.cancel_order(&order.id, "again").await.unwrap_err(),
            CommerceError::InvalidStatus {
                from: OrderStatus::Canceled,
                to: OrderStatus::Canceled,
            }
        );
    }

    #[tokio::test]
    async fn test_update_status_and_lookups() {
        let (service, _) = service().await;
        let order = service.create_from_cart(&cart(), details()).await.unwrap();

        let paid = service.update_status(&order.id, OrderStatus::Paid).await.unwrap();
        assert_eq!(paid.status, OrderStatus::Paid);
        assert!(matches!(
            service.update_status(&order.id, OrderStatus::Delivered).await,
            Err(CommerceError::InvalidStatus { .. })
        ));

        let by_number = service.get_order_by_number(&order.order_number).await.unwrap();
        assert_eq!(by_number.status, OrderStatus::Paid);

        let user_orders = service
            .get_user_orders(&UserId::new("user-1"), &OrderFilter::default())
            .await
            .unwrap();
        assert_eq!(user_orders.len(), 1);

        assert!(matches!(
            service.get_order(&OrderId::new("missing")).await,
            Err(CommerceError::OrderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_from_cart_id() {
        let (service, _) = service().await;
        assert!(matches!(
            service.create_from_cart_id(&CartId::new("c"), details()).await,
            Err(CommerceError::Config(_))
        ));

        let carts = Arc::new(InMemoryCartRepository::new());
        let stored = cart();
        let cart_id = stored.id.clone();
        carts.insert(stored).await;
        let service = service.with_cart_repository(carts);

        assert!(service.create_from_cart_id(&cart_id, details()).await.is_ok());
        assert!(matches!(
            service.create_from_cart_id(&CartId::new("missing"), details()).await,
            Err(CommerceError::CartNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_quantity_limit_from_config() {
        let (service, inventory) = service().await;
        let config = CheckoutConfig {
            max_quantity_per_item: 1,
            ..CheckoutConfig::default()
        };
        let service = service.with_config(config);

        assert_eq!(
            service.create_from_cart(&cart(), details()).await.unwrap_err(),
            CommerceError::QuantityExceedsLimit(2, 1)
        );
        assert_eq!(inventory.available_stock("MUG").await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_incomplete_billing_defaults_to_shipping() {
        let (service, _) = service().await;
        let mut billing = address();
        billing.postal_code.clear();

        let order = service
            .create_from_cart(&cart(), details().with_billing_address(billing))
            .await
            .unwrap();
        assert_eq!(order.billing_address, order.shipping_address);
    }
}
