//! Order types and the order status state machine.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::CartItem;
use crate::error::{CommerceError, Result};
use crate::ids::{OrderId, OrderItemId, ProductId, UserId, VariantId};
use crate::money::{Currency, Money};
use crate::orders::Address;
use crate::pricing::LineItemPrice;

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created, awaiting payment.
    #[default]
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Canceled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Refunded => "refunded",
        }
    }

    /// Statuses reachable in one step.
    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Paid, Canceled],
            Paid => &[Processing, Canceled, Refunded],
            Processing => &[Shipped, Canceled],
            Shipped => &[Delivered],
            Delivered => &[Refunded],
            Canceled | Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line on an order. Prices are frozen at order time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub sku: String,
    pub name: String,
    /// Unit price when the item was added to the cart.
    pub unit_price: Money,
    pub quantity: i64,
    pub discount_amount: Money,
    pub tax_amount: Money,
    /// `unit_price * quantity - discount_amount + tax_amount`.
    pub total: Money,
    pub attributes: BTreeMap<String, String>,
}

impl OrderItem {
    /// Build from a cart line and its pricing.
    pub fn from_cart_item(item: &CartItem, price: &LineItemPrice) -> Self {
        Self {
            id: OrderItemId::generate(),
            product_id: item.product_id.clone(),
            variant_id: item.variant_id.clone(),
            sku: item.sku.clone(),
            name: item.name.clone(),
            unit_price: item.price,
            quantity: item.quantity,
            discount_amount: price.discount_amount,
            tax_amount: price.tax_amount,
            total: price.total,
            attributes: item.attributes.clone(),
        }
    }
}

/// A customer order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: OrderId,
    /// Human-readable order number.
    pub order_number: String,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub payment_method_id: String,
    pub subtotal: Money,
    pub discount_total: Money,
    pub tax_total: Money,
    pub shipping_total: Money,
    pub total: Money,
    pub currency: Currency,
    /// Promotion codes that produced a discount.
    pub promotion_codes: Vec<String>,
    pub notes: String,
    /// Caller-supplied key that makes order creation repeatable.
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set on delivery.
    pub completed_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Get total item count.
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.status.can_transition_to(next)
    }

    /// Move to `next`, stamping `completed_at` on delivery and
    /// `canceled_at` on cancellation.
    pub fn update_status(&mut self, next: OrderStatus) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(CommerceError::InvalidStatus {
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        match next {
            OrderStatus::Delivered => self.completed_at = Some(now),
            OrderStatus::Canceled => self.canceled_at = Some(now),
            _ => {}
        }
        Ok(())
    }

    pub fn is_cancelable(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Pending | OrderStatus::Paid | OrderStatus::Processing
        )
    }

    pub fn is_refundable(&self) -> bool {
        matches!(self.status, OrderStatus::Paid | OrderStatus::Delivered)
    }

    pub fn is_paid(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Paid | OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered
        )
    }

    /// Append a line to the order notes.
    pub fn append_note(&mut self, note: &str) {
        if !self.notes.is_empty() {
            self.notes.push('\n');
        }
        self.notes.push_str(note);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn order(status: OrderStatus) -> Order {
        let usd = |units| Money::new(units, Currency::USD);
        let now = Utc::now();
        Order {
            id: OrderId::generate(),
            order_number: "ORD-20260101-000001".to_string(),
            user_id: UserId::new("user-1"),
            status,
            items: Vec::new(),
            shipping_address: Address::default(),
            billing_address: Address::default(),
            payment_method_id: "pm_card".to_string(),
            subtotal: usd(0),
            discount_total: usd(0),
            tax_total: usd(0),
            shipping_total: usd(0),
            total: usd(0),
            currency: Currency::USD,
            promotion_codes: Vec::new(),
            notes: String::new(),
            idempotency_key: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            canceled_at: None,
        }
    }

    const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Canceled,
        OrderStatus::Refunded,
    ];

    #[test]
    fn test_transition_table() {
        use OrderStatus::*;
        let allowed = [
            (Pending, Paid),
            (Pending, Canceled),
            (Paid, Processing),
            (Paid, Canceled),
            (Paid, Refunded),
            (Processing, Shipped),
            (Processing, Canceled),
            (Shipped, Delivered),
            (Delivered, Refunded),
        ];
        for from in ALL {
            for to in ALL {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_rejected_transition_leaves_order_unchanged() {
        let mut order = order(OrderStatus::Pending);
        let before = order.clone();
        assert_eq!(
            order.update_status(OrderStatus::Shipped),
            Err(CommerceError::InvalidStatus {
                from: OrderStatus::Pending,
                to: OrderStatus::Shipped,
            })
        );
        assert_eq!(order, before);
    }

    #[test]
    fn test_timestamps_on_delivery_and_cancel() {
        let mut delivered = order(OrderStatus::Shipped);
        delivered.update_status(OrderStatus::Delivered).unwrap();
        assert!(delivered.completed_at.is_some());
        assert!(delivered.canceled_at.is_none());

        let mut canceled = order(OrderStatus::Paid);
        canceled.update_status(OrderStatus::Canceled).unwrap();
        assert!(canceled.canceled_at.is_some());
        assert!(canceled.completed_at.is_none());
    }

    #[test]
    fn test_cancelable_and_refundable() {
        let cancelable: Vec<_> = ALL
            .into_iter()
            .filter(|s| order(*s).is_cancelable())
            .collect();
        assert_eq!(
            cancelable,
            vec![OrderStatus::Pending, OrderStatus::Paid, OrderStatus::Processing]
        );

        let refundable: Vec<_> = ALL
            .into_iter()
            .filter(|s| order(*s).is_refundable())
            .collect();
        assert_eq!(refundable, vec![OrderStatus::Paid, OrderStatus::Delivered]);
    }

    #[test]
    fn test_append_note() {
        let mut order = order(OrderStatus::Pending);
        order.append_note("Canceled: customer request");
        assert_eq!(order.notes, "Canceled: customer request");

        order.notes = "Leave at door".to_string();
        order.append_note("Canceled: fraud");
        assert_eq!(order.notes, "Leave at door\nCanceled: fraud");
    }
}
