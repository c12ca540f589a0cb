//! Portfolio-level risk and reward totals.

use super::PositionStore;
use crate::types::Position;
use serde::{Deserialize, Serialize};

/// Aggregate exposure of all tracked positions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PortfolioSummary {
    /// Sum of buy price * quantity
    pub total_investment: f64,
    /// Sum of (buy price - stop loss) * quantity
    pub total_risk_if_stopped: f64,
    /// Sum of (target - buy price) * quantity
    pub total_potential_gain: f64,
    /// Number of positions
    pub position_count: usize,
}

impl PortfolioSummary {
    /// Calculate totals over a slice of positions. Empty input gives zeros.
    pub fn from_positions(positions: &[Position]) -> Self {
        positions.iter().fold(Self::default(), |acc, p| Self {
            total_investment: acc.total_investment + p.investment(),
            total_risk_if_stopped: acc.total_risk_if_stopped + p.risk_if_stopped(),
            total_potential_gain: acc.total_potential_gain + p.potential_gain(),
            position_count: acc.position_count + 1,
        })
    }

    /// Potential gain over risk for the whole book, if any risk is on.
    pub fn reward_to_risk(&self) -> Option<f64> {
        (self.total_risk_if_stopped > 0.0)
            .then(|| self.total_potential_gain / self.total_risk_if_stopped)
    }
}

/// Summarize the current contents of a store.
pub fn summarize(store: &PositionStore) -> PortfolioSummary {
    PortfolioSummary::from_positions(store.positions())
}
