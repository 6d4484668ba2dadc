//! Payment authorization contract.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ids::OrderId;
use crate::money::Money;

/// When the gateway captures authorized funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMethod {
    /// Capture immediately on authorization.
    #[default]
    Automatic,
    /// Authorize now, capture later.
    Manual,
}

/// State of a payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Pending,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
    Failed,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::Pending => "pending",
            IntentStatus::RequiresAction => "requires_action",
            IntentStatus::Processing => "processing",
            IntentStatus::Succeeded => "succeeded",
            IntentStatus::Canceled => "canceled",
            IntentStatus::Failed => "failed",
        }
    }

    /// The intent will never collect funds.
    pub fn is_failure(&self) -> bool {
        matches!(self, IntentStatus::Canceled | IntentStatus::Failed)
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to authorize a payment for an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntentRequest {
    pub amount: Money,
    pub payment_method_id: String,
    pub order_id: OrderId,
    pub description: String,
    pub capture_method: CaptureMethod,
    pub metadata: BTreeMap<String, String>,
}

/// A payment intent as reported by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: Money,
    pub status: IntentStatus,
    pub payment_method_id: String,
    pub order_id: OrderId,
    /// Failure detail from the gateway, if any.
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PaymentIntent {
    pub fn is_cancelable(&self) -> bool {
        matches!(
            self.status,
            IntentStatus::Pending | IntentStatus::RequiresAction
        )
    }
}

/// Payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create and confirm a payment intent.
    async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent>;
}
