//! Checkout configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CommerceError, Result};
use crate::payments::CaptureMethod;

/// Default maximum quantity per cart line.
pub const DEFAULT_MAX_QUANTITY_PER_ITEM: i64 = 9999;

/// Checkout configuration, usually loaded from a `checkout.toml` file.
///
/// ```toml
/// order_number_prefix = "TC"
/// tax_inclusive = false
/// capture_method = "manual"
/// max_quantity_per_item = 50
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    /// Prefix for human-readable order numbers.
    pub order_number_prefix: String,
    /// Whether catalog prices already include tax.
    pub tax_inclusive: bool,
    /// When the payment gateway should capture funds.
    pub capture_method: CaptureMethod,
    /// Maximum quantity on a single cart line.
    pub max_quantity_per_item: i64,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            order_number_prefix: "ORD".to_string(),
            tax_inclusive: false,
            capture_method: CaptureMethod::Automatic,
            max_quantity_per_item: DEFAULT_MAX_QUANTITY_PER_ITEM,
        }
    }
}

impl CheckoutConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CheckoutConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CommerceError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.order_number_prefix.trim().is_empty() {
            return Err(CommerceError::Config(
                "order_number_prefix must not be empty".to_string(),
            ));
        }
        if self.max_quantity_per_item <= 0 {
            return Err(CommerceError::Config(format!(
                "max_quantity_per_item must be positive, got {}",
                self.max_quantity_per_item
            )));
        }
        Ok(())
    }
}
