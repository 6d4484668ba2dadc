//! Checkout error types.

use crate::orders::OrderStatus;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = CommerceError> = std::result::Result<T, E>;

/// Errors that can occur while pricing carts and creating orders.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommerceError {
    /// Cart has no items.
    #[error("Cart is empty")]
    EmptyCart,

    /// Address is missing a required field.
    #[error("Invalid address: missing {0}")]
    InvalidAddress(String),

    /// Invalid quantity.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Quantity exceeds maximum allowed.
    #[error("Quantity {0} exceeds maximum allowed ({1})")]
    QuantityExceedsLimit(i64, i64),

    /// Currency mismatch.
    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: String, got: String },

    /// Arithmetic overflow.
    #[error("Arithmetic overflow in money calculation")]
    Overflow,

    /// Not enough stock to reserve.
    #[error("Insufficient stock for {sku}: requested {requested}, available {available}")]
    InsufficientStock {
        sku: String,
        requested: i64,
        available: i64,
    },

    /// Item not in cart.
    #[error("Item not in cart: {0}")]
    ItemNotInCart(String),

    /// Cart not found.
    #[error("Cart not found: {0}")]
    CartNotFound(String),

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Promotion code not found.
    #[error("Promotion not found: {0}")]
    PromotionNotFound(String),

    /// Promotion inactive, expired or exhausted.
    #[error("Promotion code is invalid: {0}")]
    PromotionInvalid(String),

    /// Cart total below the promotion's minimum purchase.
    #[error("Minimum purchase not met for {code}: requires more than {minimum}")]
    MinPurchaseNotMet { code: String, minimum: String },

    /// Order status transition not allowed.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatus { from: OrderStatus, to: OrderStatus },

    /// Payment authorization failed. The order exists and remains pending.
    #[error("Payment failed for order {order_number}: {reason}")]
    PaymentFailed {
        order_id: String,
        order_number: String,
        reason: String,
    },

    /// Payment succeeded but the paid order could not be saved. The stored
    /// order is still pending; reconcile it against `intent_id`.
    #[error("Payment {intent_id} succeeded for order {order_number} but was not recorded: {reason}")]
    PaymentNotRecorded {
        order_id: String,
        order_number: String,
        intent_id: String,
        reason: String,
    },

    /// Caller cancelled the operation before a side effect was issued.
    #[error("Operation cancelled")]
    Cancelled,

    /// Repository failure.
    #[error("Repository error: {0}")]
    Repository(String),

    /// External collaborator failure (tax, shipping, payment gateway).
    #[error("{service} error: {message}")]
    Collaborator { service: String, message: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Broad classes of failure, used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad input, detected before any side effect.
    Validation,
    /// Money arithmetic across currencies. Always a caller bug.
    Currency,
    /// Stock, cart, order or promotion unavailable.
    ResourceUnavailable,
    /// Order exists but its payment state needs attention.
    Payment,
    /// Rejected state-machine transition.
    InvalidState,
    /// Cancelled by the caller.
    Cancelled,
    /// Storage, collaborator or configuration failure.
    Infrastructure,
}

impl CommerceError {
    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            CommerceError::EmptyCart
            | CommerceError::InvalidAddress(_)
            | CommerceError::InvalidQuantity(_)
            | CommerceError::QuantityExceedsLimit(..)
            | CommerceError::PromotionInvalid(_)
            | CommerceError::MinPurchaseNotMet { .. } => ErrorCategory::Validation,
            CommerceError::CurrencyMismatch { .. } | CommerceError::Overflow => {
                ErrorCategory::Currency
            }
            CommerceError::InsufficientStock { .. }
            | CommerceError::ItemNotInCart(_)
            | CommerceError::CartNotFound(_)
            | CommerceError::OrderNotFound(_)
            | CommerceError::PromotionNotFound(_) => ErrorCategory::ResourceUnavailable,
            CommerceError::PaymentFailed { .. } | CommerceError::PaymentNotRecorded { .. } => {
                ErrorCategory::Payment
            }
            CommerceError::InvalidStatus { .. } => ErrorCategory::InvalidState,
            CommerceError::Cancelled => ErrorCategory::Cancelled,
            CommerceError::Repository(_)
            | CommerceError::Collaborator { .. }
            | CommerceError::Config(_) => ErrorCategory::Infrastructure,
        }
    }

    /// Whether repeating the call (after fixing input, if needed) can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Validation | ErrorCategory::Infrastructure | ErrorCategory::Cancelled
        )
    }

    /// Build a currency mismatch error from two currency codes.
    pub fn currency_mismatch(expected: impl ToString, got: impl ToString) -> Self {
        CommerceError::CurrencyMismatch {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }

    /// Build a collaborator error.
    pub fn collaborator(service: impl Into<String>, message: impl ToString) -> Self {
        CommerceError::Collaborator {
            service: service.into(),
            message: message.to_string(),
        }
    }
}

impl From<toml::de::Error> for CommerceError {
    fn from(e: toml::de::Error) -> Self {
        CommerceError::Config(e.to_string())
    }
}
