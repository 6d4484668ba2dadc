//! Cart pricing and order creation for TurboCommerce.
//!
//! - **Money**: integer minor-unit amounts with currency-checked arithmetic
//! - **Cart**: carts and cart items
//! - **Pricing**: promotions, tax, shipping and totals for a cart
//! - **Orders**: order creation with inventory reservation, payment and
//!   compensation, plus the order status state machine
//!
//! Tax, shipping, inventory, payment and storage are collaborator traits.
//! In-memory and flat-rate implementations are included for tests and small
//! deployments.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use turbo_checkout::prelude::*;
//!
//! let promotions = Arc::new(InMemoryPromotionRepository::with_promotions([
//!     Promotion::percentage("SAVE10", "10% off", 0.10),
//! ]));
//! let pricing = PricingEngine::new(promotions)
//!     .with_tax_calculator(Arc::new(FlatRateTaxCalculator::new(vec![
//!         TaxRate::new("ca", "California", 0.0875).in_state("CA"),
//!     ])));
//! let orders = OrderService::new(Arc::new(InMemoryOrderRepository::new()), pricing)
//!     .with_inventory(inventory)
//!     .with_payment_gateway(gateway);
//!
//! let mut cart = Cart::for_user(user_id.clone());
//! cart.add_item(CartItem::new(product_id, "BOOK-1", "Rust book", Money::new(4999, Currency::USD), 2))?;
//!
//! let order = orders
//!     .create_from_cart(
//!         &cart,
//!         OrderDetails::new(user_id, address, "pm_card").with_promotion_codes(["SAVE10"]),
//!     )
//!     .await?;
//! println!("{} total {}", order.order_number, order.total);
//! ```

pub mod error;
pub mod ids;
pub mod money;

pub mod cart;
pub mod config;
pub mod inventory;
pub mod orders;
pub mod payments;
pub mod pricing;
pub mod shipping;
pub mod tax;

pub use config::CheckoutConfig;
pub use error::{CommerceError, ErrorCategory, Result};
pub use ids::*;
pub use money::{Currency, Money};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::CheckoutConfig;
    pub use crate::error::{CommerceError, ErrorCategory};
    pub use crate::ids::*;
    pub use crate::money::{Currency, Money};

    // Cart
    pub use crate::cart::{Cart, CartItem, CartRepository, InMemoryCartRepository};

    // Pricing
    pub use crate::pricing::{
        AppliedDiscount, DiscountKind, InMemoryPromotionRepository, LineItem, LineItemPrice,
        PricingAddress, PricingEngine, PricingOptions, PricingResult, Promotion,
        PromotionEvaluator, PromotionRepository, TaxLine,
    };

    // Collaborators
    pub use crate::inventory::{InMemoryInventory, InventoryService, StockLevel};
    pub use crate::payments::{
        CaptureMethod, IntentRequest, IntentStatus, PaymentGateway, PaymentIntent,
    };
    pub use crate::shipping::{FlatRateShipping, ShippingMethod, ShippingRateCalculator};
    pub use crate::tax::{FlatRateTaxCalculator, TaxCalculator, TaxRate};

    // Orders
    pub use crate::orders::{
        Address, ClockOrderNumbers, InMemoryOrderRepository, Order, OrderDetails, OrderFilter,
        OrderItem, OrderNumberGenerator, OrderRepository, OrderService, OrderStatus,
        SequentialOrderNumbers,
    };
}
