//! Position sizing from a risk budget.
//!
//! Quantities are whole shares, truncated toward zero so the realised risk
//! never exceeds the budget.

use crate::types::{ensure_positive, SizingResult};
use crate::{Error, Result};

/// Size a long trade so that hitting the stop loses `risk_pct` of `capital`.
///
/// # Arguments
///
/// * `capital` - Total portfolio capital
/// * `risk_pct` - Percentage of capital to risk (e.g., 1.0 for 1%)
/// * `entry` - Planned buy price
/// * `stop` - Stop-loss price, must be below `entry`
/// * `target` - Profit target price
///
/// # Returns
///
/// Returns the share count with its cost and payoff, or
/// `Error::InvalidTradeParameters` if any input is non-positive or the stop
/// is not below the entry.
pub fn size_by_risk_percent(
    capital: f64,
    risk_pct: f64,
    entry: f64,
    stop: f64,
    target: f64,
) -> Result<SizingResult> {
    ensure_positive("Capital", capital)?;
    ensure_positive("Risk %", risk_pct)?;
    ensure_positive("Entry", entry)?;
    ensure_positive("Stop", stop)?;
    ensure_positive("Target", target)?;

    if entry <= stop {
        return Err(Error::InvalidTradeParameters(format!(
            "Stop loss ({:.2}) must be below entry ({:.2})",
            stop, entry
        )));
    }

    let risk_amount = capital * (risk_pct / 100.0);
    let per_unit_risk = entry - stop;
    let quantity = whole_shares(risk_amount, per_unit_risk)?;

    Ok(SizingResult {
        risk_amount,
        per_unit_risk,
        quantity,
        total_cost: quantity as f64 * entry,
        expected_profit: (target - entry) * quantity as f64,
        upside_pct: (target - entry) / entry * 100.0,
        reward_to_risk: (target - entry) / per_unit_risk,
    })
}

/// Derive a share count from an absolute risk budget.
///
/// A positive `max_risk_amount` overrides `requested_quantity` whenever the
/// entry and stop differ. The distance is taken as an absolute value, so a
/// stop above the entry is sized like a short rather than rejected.
///
/// Returns `Error::InvalidTradeParameters` when the budget buys more shares
/// than a `u64` can count.
pub fn size_by_max_risk(
    max_risk_amount: f64,
    entry: f64,
    stop: f64,
    requested_quantity: u64,
) -> Result<u64> {
    let per_unit_risk = (entry - stop).abs();
    if max_risk_amount > 0.0 && per_unit_risk > 0.0 && per_unit_risk.is_finite() {
        whole_shares(max_risk_amount, per_unit_risk)
    } else {
        Ok(requested_quantity)
    }
}

/// Whole shares affordable within `budget`, refusing counts a `u64` cannot hold.
fn whole_shares(budget: f64, per_unit_risk: f64) -> Result<u64> {
    let shares = (budget / per_unit_risk).floor();
    // u64::MAX as f64 rounds up to 2^64, the first value that does not fit
    if shares.is_nan() || shares >= u64::MAX as f64 {
        return Err(Error::InvalidTradeParameters(format!(
            "Risk budget {} over per-share risk {} exceeds the maximum share count",
            budget, per_unit_risk
        )));
    }
    Ok(shares as u64)
}
