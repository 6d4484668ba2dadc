//! Shipping rate contract and a flat-rate calculator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{CommerceError, Result};
use crate::ids::ShippingMethodId;
use crate::money::Money;
use crate::pricing::PricingAddress;

/// An item to ship.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippableItem {
    pub sku: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateRequest {
    pub items: Vec<ShippableItem>,
    pub destination: PricingAddress,
    pub shipping_method_id: ShippingMethodId,
    /// Merchandise subtotal, for free-shipping thresholds.
    pub order_value: Money,
}

/// A quote for one shipping method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippingRate {
    pub method_id: ShippingMethodId,
    pub method_name: String,
    pub cost: Money,
    pub carrier: Option<String>,
    pub delivery_estimate: Option<String>,
}

/// A shipping method option.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippingMethod {
    pub id: ShippingMethodId,
    pub name: String,
    pub description: Option<String>,
    /// Carrier name (e.g., "UPS", "FedEx").
    pub carrier: Option<String>,
    pub flat_rate: Money,
    /// Orders above this value ship free.
    pub free_shipping_min: Option<Money>,
    pub min_delivery_days: Option<i32>,
    pub max_delivery_days: Option<i32>,
    pub is_active: bool,
}

impl ShippingMethod {
    pub fn new(id: impl Into<ShippingMethodId>, name: impl Into<String>, flat_rate: Money) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            carrier: None,
            flat_rate,
            free_shipping_min: None,
            min_delivery_days: None,
            max_delivery_days: None,
            is_active: true,
        }
    }

    pub fn with_carrier(mut self, carrier: impl Into<String>) -> Self {
        self.carrier = Some(carrier.into());
        self
    }

    pub fn with_free_shipping_over(mut self, minimum: Money) -> Self {
        self.free_shipping_min = Some(minimum);
        self
    }

    pub fn with_delivery_days(mut self, min: i32, max: i32) -> Self {
        self.min_delivery_days = Some(min);
        self.max_delivery_days = Some(max);
        self
    }

    /// Get delivery estimate string.
    pub fn delivery_estimate(&self) -> Option<String> {
        match (self.min_delivery_days, self.max_delivery_days) {
            (Some(min), Some(max)) if min == max => Some(format!("{} days", min)),
            (Some(min), Some(max)) => Some(format!("{}-{} days", min, max)),
            (Some(min), None) => Some(format!("{}+ days", min)),
            (None, Some(max)) => Some(format!("Up to {} days", max)),
            (None, None) => None,
        }
    }

    /// Cost of shipping an order of the given value.
    pub fn cost_for(&self, order_value: &Money) -> Result<Money> {
        match &self.free_shipping_min {
            Some(minimum) if order_value.greater_than(minimum)? => {
                Ok(Money::zero(self.flat_rate.currency))
            }
            _ => Ok(self.flat_rate),
        }
    }

    fn quote(&self, order_value: &Money) -> Result<ShippingRate> {
        Ok(ShippingRate {
            method_id: self.id.clone(),
            method_name: self.name.clone(),
            cost: self.cost_for(order_value)?,
            carrier: self.carrier.clone(),
            delivery_estimate: self.delivery_estimate(),
        })
    }
}

/// Quotes shipping costs.
#[async_trait]
pub trait ShippingRateCalculator: Send + Sync {
    /// Quote the method named in the request.
    async fn get_rate(&self, request: &RateRequest) -> Result<ShippingRate>;

    /// Quote every method available for the destination.
    async fn get_available_rates(&self, request: &RateRequest) -> Result<Vec<ShippingRate>>;
}

/// Calculator over a fixed table of methods.
#[derive(Debug, Clone, Default)]
pub struct FlatRateShipping {
    methods: Vec<ShippingMethod>,
}

impl FlatRateShipping {
    pub fn new(methods: Vec<ShippingMethod>) -> Self {
        Self { methods }
    }
}

#[async_trait]
impl ShippingRateCalculator for FlatRateShipping {
    async fn get_rate(&self, request: &RateRequest) -> Result<ShippingRate> {
        let method = self
            .methods
            .iter()
            .find(|m| m.is_active && m.id == request.shipping_method_id)
            .ok_or_else(|| {
                CommerceError::collaborator(
                    "shipping",
                    format!("unknown shipping method {}", request.shipping_method_id),
                )
            })?;
        method.quote(&request.order_value)
    }

    async fn get_available_rates(&self, request: &RateRequest) -> Result<Vec<ShippingRate>> {
        self.methods
            .iter()
            .filter(|m| m.is_active)
            .map(|m| m.quote(&request.order_value))
            .collect()
    }
}
