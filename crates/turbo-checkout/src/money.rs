//! Money type for representing monetary values.
//!
//! Amounts are whole minor units (cents for USD) tagged with a currency.
//! Every operation between two values checks the currency first and every
//! integer operation is overflow-checked, so nothing here panics.

use crate::error::{CommerceError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    USD,
    EUR,
    GBP,
    JPY,
    CAD,
    AUD,
    CHF,
    CNY,
    INR,
    MXN,
}

impl Currency {
    /// Get the ISO 4217 code (e.g., "USD").
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::JPY => "JPY",
            Currency::CAD => "CAD",
            Currency::AUD => "AUD",
            Currency::CHF => "CHF",
            Currency::CNY => "CNY",
            Currency::INR => "INR",
            Currency::MXN => "MXN",
        }
    }

    /// Get the currency symbol (e.g., "$").
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::EUR => "\u{20ac}",
            Currency::GBP => "\u{00a3}",
            Currency::JPY => "\u{00a5}",
            Currency::CAD => "CA$",
            Currency::AUD => "A$",
            Currency::CHF => "CHF",
            Currency::CNY => "\u{00a5}",
            Currency::INR => "\u{20b9}",
            Currency::MXN => "MX$",
        }
    }

    /// Number of minor-unit decimal places.
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Parse a currency code string.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_uppercase().as_str() {
            "USD" => Some(Currency::USD),
            "EUR" => Some(Currency::EUR),
            "GBP" => Some(Currency::GBP),
            "JPY" => Some(Currency::JPY),
            "CAD" => Some(Currency::CAD),
            "AUD" => Some(Currency::AUD),
            "CHF" => Some(Currency::CHF),
            "CNY" => Some(Currency::CNY),
            "INR" => Some(Currency::INR),
            "MXN" => Some(Currency::MXN),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A monetary value with currency.
///
/// Immutable: every operation returns a new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Money {
    /// Amount in the smallest currency unit.
    pub minor_units: i64,
    /// The currency.
    pub currency: Currency,
}

impl Money {
    /// Create a new Money value from minor units.
    pub fn new(minor_units: i64, currency: Currency) -> Self {
        Self {
            minor_units,
            currency,
        }
    }

    /// Create a zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    pub fn is_zero(&self) -> bool {
        self.minor_units == 0
    }

    pub fn is_positive(&self) -> bool {
        self.minor_units > 0
    }

    pub fn is_negative(&self) -> bool {
        self.minor_units < 0
    }

    /// Negate the amount.
    pub fn negate(&self) -> Result<Money> {
        self.minor_units
            .checked_neg()
            .map(|units| Money::new(units, self.currency))
            .ok_or(CommerceError::Overflow)
    }

    /// Format as a display string (e.g., "$49.99").
    pub fn display(&self) -> String {
        format!("{}{}", self.currency.symbol(), self.display_amount())
    }

    /// Format the amount without symbol (e.g., "49.99").
    ///
    /// Built from integer parts so no float rounding leaks into the output.
    pub fn display_amount(&self) -> String {
        let places = self.currency.decimal_places();
        let sign = if self.minor_units < 0 { "-" } else { "" };
        let abs = self.minor_units.unsigned_abs();
        if places == 0 {
            return format!("{}{}", sign, abs);
        }
        let divisor = 10_u64.pow(places);
        format!(
            "{}{}.{:0width$}",
            sign,
            abs / divisor,
            abs % divisor,
            width = places as usize
        )
    }

    /// Fail with `CurrencyMismatch` unless `other` has the same currency.
    pub fn ensure_same_currency(&self, other: &Money) -> Result<()> {
        if self.currency != other.currency {
            return Err(CommerceError::currency_mismatch(
                self.currency,
                other.currency,
            ));
        }
        Ok(())
    }

    /// Add another Money value.
    pub fn add(&self, other: &Money) -> Result<Money> {
        self.ensure_same_currency(other)?;
        self.minor_units
            .checked_add(other.minor_units)
            .map(|units| Money::new(units, self.currency))
            .ok_or(CommerceError::Overflow)
    }

    /// Subtract another Money value.
    pub fn subtract(&self, other: &Money) -> Result<Money> {
        self.ensure_same_currency(other)?;
        self.minor_units
            .checked_sub(other.minor_units)
            .map(|units| Money::new(units, self.currency))
            .ok_or(CommerceError::Overflow)
    }

    /// Exact integer multiply (unit price times quantity).
    pub fn multiply(&self, factor: i64) -> Result<Money> {
        self.minor_units
            .checked_mul(factor)
            .map(|units| Money::new(units, self.currency))
            .ok_or(CommerceError::Overflow)
    }

    /// Multiply by a fractional factor, truncating toward zero.
    ///
    /// Used for percentage discounts (`0.10` is 10%) and tax rates. The
    /// truncation is the rounding policy: `9998 * 0.10` yields `999`.
    pub fn multiply_by_fraction(&self, factor: f64) -> Money {
        let product = self.minor_units as f64 * factor;
        Money::new(product.trunc() as i64, self.currency)
    }

    /// Split into `parts` shares that sum exactly to this amount.
    ///
    /// The first `minor_units mod parts` shares receive one extra minor unit.
    /// Returns an empty list when `parts` is zero.
    pub fn allocate(&self, parts: usize) -> Vec<Money> {
        if parts == 0 {
            return Vec::new();
        }
        let n = parts as i64;
        let base = self.minor_units.div_euclid(n);
        let remainder = self.minor_units.rem_euclid(n) as usize;

        (0..parts)
            .map(|i| {
                let extra = if i < remainder { 1 } else { 0 };
                Money::new(base + extra, self.currency)
            })
            .collect()
    }

    /// Compare amounts; fails on mismatched currency.
    pub fn less_than(&self, other: &Money) -> Result<bool> {
        self.ensure_same_currency(other)?;
        Ok(self.minor_units < other.minor_units)
    }

    /// Compare amounts; fails on mismatched currency.
    pub fn greater_than(&self, other: &Money) -> Result<bool> {
        self.ensure_same_currency(other)?;
        Ok(self.minor_units > other.minor_units)
    }

    /// Equal amount and currency. Mismatched currency is `false`, not an error.
    pub fn equals(&self, other: &Money) -> bool {
        self.currency == other.currency && self.minor_units == other.minor_units
    }

    /// Sum an iterator of Money values, starting from zero in `currency`.
    pub fn try_sum<'a>(iter: impl IntoIterator<Item = &'a Money>, currency: Currency) -> Result<Money> {
        iter.into_iter()
            .try_fold(Money::zero(currency), |acc, m| acc.add(m))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}
