//! Core data types for the trade sizer.

use crate::{Error, Result};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// A tracked trade: entry, protective stop, profit target and share count.
///
/// Serialized field names double as the column headers of the portfolio file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    /// Stock ticker symbol (uppercase)
    #[serde(rename = "Stock")]
    pub stock: String,
    /// Entry price per share
    #[serde(rename = "Buy Price")]
    pub buy_price: f64,
    /// Number of shares
    #[serde(rename = "Quantity")]
    pub quantity: u64,
    /// Protective stop price
    #[serde(rename = "Stop Loss")]
    pub stop_loss: f64,
    /// Profit target price
    #[serde(rename = "Target")]
    pub target: f64,
    /// Day the position was recorded
    #[serde(rename = "Date Added")]
    pub date_added: NaiveDate,
}

impl Position {
    /// Create a position dated today.
    ///
    /// Checks field invariants only; the stop/entry ordering is left to the
    /// caller (see [`Position::ensure_stop_below_entry`]).
    pub fn new(
        stock: &str,
        buy_price: f64,
        quantity: u64,
        stop_loss: f64,
        target: f64,
    ) -> Result<Self> {
        Self::dated(
            stock,
            buy_price,
            quantity,
            stop_loss,
            target,
            Local::now().date_naive(),
        )
    }

    /// Create a position with an explicit date.
    pub fn dated(
        stock: &str,
        buy_price: f64,
        quantity: u64,
        stop_loss: f64,
        target: f64,
        date_added: NaiveDate,
    ) -> Result<Self> {
        let position = Self {
            stock: stock.trim().to_uppercase(),
            buy_price,
            quantity,
            stop_loss,
            target,
            date_added,
        };
        position.validate()?;
        Ok(position)
    }

    /// Check the stored invariants: a stock name, positive finite prices and
    /// at least one share.
    pub fn validate(&self) -> Result<()> {
        if self.stock.trim().is_empty() {
            return Err(Error::InvalidTradeParameters(
                "Stock ticker is required".to_string(),
            ));
        }
        ensure_positive("Buy Price", self.buy_price)?;
        ensure_positive("Stop Loss", self.stop_loss)?;
        ensure_positive("Target", self.target)?;
        if self.quantity == 0 {
            return Err(Error::InvalidTradeParameters(
                "Quantity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Reject long trades whose stop is not below the entry.
    pub fn ensure_stop_below_entry(&self) -> Result<()> {
        if self.stop_loss >= self.buy_price {
            return Err(Error::InvalidTradeParameters(format!(
                "Stop loss ({:.2}) must be below buy price ({:.2})",
                self.stop_loss, self.buy_price
            )));
        }
        Ok(())
    }

    /// Capital committed to the position.
    pub fn investment(&self) -> f64 {
        self.buy_price * self.quantity as f64
    }

    /// Loss if the stop is hit.
    pub fn risk_if_stopped(&self) -> f64 {
        (self.buy_price - self.stop_loss) * self.quantity as f64
    }

    /// Gain if the target is hit.
    pub fn potential_gain(&self) -> f64 {
        (self.target - self.buy_price) * self.quantity as f64
    }

    /// Reward per unit of risk, if the stop is below the entry.
    pub fn reward_to_risk(&self) -> Option<f64> {
        let per_unit_risk = self.buy_price - self.stop_loss;
        (per_unit_risk > 0.0).then(|| (self.target - self.buy_price) / per_unit_risk)
    }
}

pub(crate) fn ensure_positive(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::InvalidTradeParameters(format!(
            "{} must be a positive number, got {}",
            field, value
        )));
    }
    Ok(())
}

/// Recommended size and payoff for a candidate trade.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SizingResult {
    /// Capital at risk if the stop is hit
    pub risk_amount: f64,
    /// Distance between entry and stop
    pub per_unit_risk: f64,
    /// Whole shares to buy
    pub quantity: u64,
    /// quantity * entry
    pub total_cost: f64,
    /// Profit if the target is hit
    pub expected_profit: f64,
    /// Percentage move from entry to target
    pub upside_pct: f64,
    /// Target distance over stop distance
    pub reward_to_risk: f64,
}

/// Proximity of the live price to a position's stop or target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    /// Price is away from both levels
    Clear,
    NearStop,
    NearTarget,
    /// No price could be obtained
    PriceUnavailable,
}

/// A rejected row from an import or file load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportRowError {
    /// 1-based data row number (the header is not counted)
    pub row: usize,
    pub reason: String,
}

impl std::fmt::Display for ImportRowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}: {}", self.row, self.reason)
    }
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportResult {
    pub accepted: usize,
    pub rejected: usize,
    pub errors: Vec<ImportRowError>,
}

impl ImportResult {
    pub(crate) fn reject(&mut self, row: usize, reason: impl Into<String>) {
        self.rejected += 1;
        self.errors.push(ImportRowError {
            row,
            reason: reason.into(),
        });
    }

    /// True when every row was accepted.
    pub fn is_clean(&self) -> bool {
        self.rejected == 0
    }
}

/// API response wrapper for success cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            warning: None,
        }
    }

    /// Create an error response.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
            warning: None,
        }
    }

    /// Attach a non-fatal warning.
    pub fn with_warning(mut self, warning: Option<String>) -> Self {
        self.warning = warning;
        self
    }
}
