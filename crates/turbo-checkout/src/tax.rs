//! Tax calculation contract and a rate-table calculator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ids::CartItemId;
use crate::money::{Currency, Money};
use crate::pricing::PricingAddress;

/// Kind of tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaxType {
    #[default]
    Sales,
    Vat,
    Gst,
    Hst,
}

/// An amount subject to tax, already net of discounts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaxableItem {
    pub id: CartItemId,
    pub amount: Money,
    pub quantity: i64,
    /// Optional product tax code.
    pub tax_code: Option<String>,
    pub is_taxable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaxRequest {
    pub line_items: Vec<TaxableItem>,
    pub shipping_cost: Money,
    pub address: PricingAddress,
    /// Whether prices already include tax.
    pub tax_inclusive: bool,
}

/// A rate that contributed to a calculation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppliedTaxRate {
    pub name: String,
    pub rate: f64,
    pub amount: Money,
    pub jurisdiction: String,
    pub tax_type: TaxType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItemTax {
    pub line_item_id: CartItemId,
    pub tax_amount: Money,
    pub rates: Vec<AppliedTaxRate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaxResult {
    /// Line taxes plus shipping tax.
    pub total_tax: Money,
    pub rates: Vec<AppliedTaxRate>,
    pub line_item_taxes: Vec<LineItemTax>,
    pub shipping_tax: Money,
}

impl TaxResult {
    /// A result with no tax at all.
    pub fn zero(currency: Currency) -> Self {
        Self {
            total_tax: Money::zero(currency),
            rates: Vec::new(),
            line_item_taxes: Vec::new(),
            shipping_tax: Money::zero(currency),
        }
    }
}

/// A configured tax rate for a jurisdiction.
///
/// Empty location fields match any address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TaxRate {
    pub id: String,
    pub name: String,
    /// Fraction, e.g. `0.0875` for 8.75%.
    pub rate: f64,
    pub country: String,
    pub state: String,
    pub city: String,
    pub postal_code: String,
    pub tax_type: TaxType,
    /// Compound rates apply to the amount plus taxes computed before them.
    pub is_compound: bool,
    /// Application order; lower runs first.
    pub priority: i32,
}

impl TaxRate {
    pub fn new(id: impl Into<String>, name: impl Into<String>, rate: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rate,
            ..Default::default()
        }
    }

    pub fn in_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    pub fn in_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    pub fn compound(mut self, priority: i32) -> Self {
        self.is_compound = true;
        self.priority = priority;
        self
    }

    pub fn applies_to(&self, address: &PricingAddress) -> bool {
        let matches = |rule: &str, value: &str| rule.is_empty() || rule == value;
        matches(&self.country, &address.country)
            && matches(&self.state, &address.state)
            && matches(&self.city, &address.city)
            && matches(&self.postal_code, &address.postal_code)
    }

    /// Most specific non-empty location field, used as the jurisdiction label.
    pub fn jurisdiction(&self) -> String {
        [&self.postal_code, &self.city, &self.state, &self.country]
            .into_iter()
            .find(|s| !s.is_empty())
            .cloned()
            .unwrap_or_default()
    }
}

/// Computes tax for a priced cart.
#[async_trait]
pub trait TaxCalculator: Send + Sync {
    async fn calculate(&self, request: &TaxRequest) -> Result<TaxResult>;

    /// Rates that apply at an address.
    async fn rates_for_address(&self, address: &PricingAddress) -> Result<Vec<TaxRate>>;
}

/// Calculator backed by a static table of rates.
///
/// Amounts are truncated per rate. Tax-inclusive requests yield no
/// additional tax.
#[derive(Debug, Clone, Default)]
pub struct FlatRateTaxCalculator {
    rates: Vec<TaxRate>,
    tax_shipping: bool,
}

impl FlatRateTaxCalculator {
    pub fn new(rates: Vec<TaxRate>) -> Self {
        Self {
            rates,
            tax_shipping: false,
        }
    }

    /// Also tax the shipping cost.
    pub fn with_shipping_taxed(mut self) -> Self {
        self.tax_shipping = true;
        self
    }

    fn matching_rates(&self, address: &PricingAddress) -> Vec<TaxRate> {
        let mut rates: Vec<TaxRate> = self
            .rates
            .iter()
            .filter(|r| r.applies_to(address))
            .cloned()
            .collect();
        rates.sort_by_key(|r| r.priority);
        rates
    }

    /// Tax one amount under every rate, returning the per-rate amounts.
    fn tax_amount(rates: &[TaxRate], amount: &Money) -> Result<Vec<Money>> {
        let mut accumulated = Money::zero(amount.currency);
        let mut per_rate = Vec::with_capacity(rates.len());
        for rate in rates {
            let base = if rate.is_compound {
                amount.add(&accumulated)?
            } else {
                *amount
            };
            let tax = base.multiply_by_fraction(rate.rate);
            accumulated = accumulated.add(&tax)?;
            per_rate.push(tax);
        }
        Ok(per_rate)
    }
}

#[async_trait]
impl TaxCalculator for FlatRateTaxCalculator {
    async fn calculate(&self, request: &TaxRequest) -> Result<TaxResult> {
        let currency = request.shipping_cost.currency;
        if request.tax_inclusive {
            return Ok(TaxResult::zero(currency));
        }

        let rates = self.matching_rates(&request.address);
        let mut rate_totals = vec![Money::zero(currency); rates.len()];
        let mut line_item_taxes = Vec::with_capacity(request.line_items.len());

        let applied = |amounts: &[Money]| -> Vec<AppliedTaxRate> {
            rates
                .iter()
                .zip(amounts)
                .filter(|(_, amount)| !amount.is_zero())
                .map(|(rate, amount)| AppliedTaxRate {
                    name: rate.name.clone(),
                    rate: rate.rate,
                    amount: *amount,
                    jurisdiction: rate.jurisdiction(),
                    tax_type: rate.tax_type,
                })
                .collect()
        };

        for item in &request.line_items {
            let amounts = if item.is_taxable {
                Self::tax_amount(&rates, &item.amount)?
            } else {
                vec![Money::zero(item.amount.currency); rates.len()]
            };
            for (total, amount) in rate_totals.iter_mut().zip(&amounts) {
                *total = total.add(amount)?;
            }
            line_item_taxes.push(LineItemTax {
                line_item_id: item.id.clone(),
                tax_amount: Money::try_sum(&amounts, item.amount.currency)?,
                rates: applied(&amounts),
            });
        }

        let shipping_tax = if self.tax_shipping {
            let amounts = Self::tax_amount(&rates, &request.shipping_cost)?;
            for (total, amount) in rate_totals.iter_mut().zip(&amounts) {
                *total = total.add(amount)?;
            }
            Money::try_sum(&amounts, currency)?
        } else {
            Money::zero(currency)
        };

        let total_tax = Money::try_sum(&rate_totals, currency)?;

        Ok(TaxResult {
            total_tax,
            rates: applied(&rate_totals),
            line_item_taxes,
            shipping_tax,
        })
    }

    async fn rates_for_address(&self, address: &PricingAddress) -> Result<Vec<TaxRate>> {
        Ok(self.matching_rates(address))
    }
}
