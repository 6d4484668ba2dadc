//! Postal addresses.

use serde::{Deserialize, Serialize};

use crate::error::{CommerceError, Result};
use crate::pricing::PricingAddress;

/// A shipping or billing address.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    pub company: Option<String>,
    /// Address line 1.
    pub address1: String,
    /// Address line 2 (apt, suite, etc.).
    pub address2: Option<String>,
    pub city: String,
    /// State/province code (e.g., "CA").
    pub state: String,
    pub postal_code: String,
    /// Country code (e.g., "US").
    pub country: String,
    pub phone: Option<String>,
}

impl Address {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        address1: impl Into<String>,
        city: impl Into<String>,
        postal_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            address1: address1.into(),
            city: city.into(),
            postal_code: postal_code.into(),
            country: country.into(),
            ..Self::default()
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    /// Get full name.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Format as single line.
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.address1.as_str()];
        if let Some(addr2) = &self.address2 {
            parts.push(addr2);
        }
        parts.push(&self.city);
        if !self.state.is_empty() {
            parts.push(&self.state);
        }
        parts.push(&self.postal_code);
        parts.push(&self.country);
        parts.join(", ")
    }

    /// First required field that is blank, if any.
    fn missing_field(&self) -> Option<&'static str> {
        [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("address1", &self.address1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
    }

    /// Check if address is complete.
    pub fn is_complete(&self) -> bool {
        self.missing_field().is_none()
    }

    /// Fail with `InvalidAddress` naming the first missing field.
    pub fn validate(&self) -> Result<()> {
        match self.missing_field() {
            Some(field) => Err(CommerceError::InvalidAddress(field.to_string())),
            None => Ok(()),
        }
    }
}

impl From<&Address> for PricingAddress {
    fn from(address: &Address) -> Self {
        PricingAddress {
            country: address.country.clone(),
            state: address.state.clone(),
            city: address.city.clone(),
            postal_code: address.postal_code.clone(),
        }
    }
}
