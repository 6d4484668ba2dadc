//! Cart pricing.
//!
//! [`PricingEngine`] turns a cart into a [`PricingResult`]: subtotal, then
//! promotions (via [`PromotionEvaluator`]), shipping, tax, and totals.

mod engine;
mod evaluator;
mod promotion;
mod types;

pub use engine::{PricingEngine, PricingOptions};
pub use evaluator::PromotionEvaluator;
pub use promotion::{DiscountKind, InMemoryPromotionRepository, Promotion, PromotionRepository};
pub use types::{AppliedDiscount, LineItem, LineItemPrice, PricingAddress, PricingResult, TaxLine};
