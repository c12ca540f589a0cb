//! Stop and target proximity alerts.

use crate::prices::PriceSource;
use crate::types::{AlertState, Position};
use serde::{Deserialize, Serialize};

/// Default relative distance that counts as "near".
pub const DEFAULT_ALERT_THRESHOLD: f64 = 0.05;

/// A position paired with its live price and alert state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionAlert {
    pub stock: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    pub state: AlertState,
}

/// Classifies a live price against a position's stop and target.
#[derive(Debug, Clone, Copy)]
pub struct PriceAlertEvaluator {
    threshold: f64,
}

impl Default for PriceAlertEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_THRESHOLD)
    }
}

impl PriceAlertEvaluator {
    /// Create an evaluator with a relative threshold (0.05 = within 5%).
    ///
    /// A threshold that is not a finite number in `(0, 1)` falls back to
    /// [`DEFAULT_ALERT_THRESHOLD`].
    pub fn new(threshold: f64) -> Self {
        if threshold.is_finite() && threshold > 0.0 && threshold < 1.0 {
            return Self { threshold };
        }

        tracing::warn!(
            threshold,
            fallback = DEFAULT_ALERT_THRESHOLD,
            "Invalid alert threshold"
        );
        Self {
            threshold: DEFAULT_ALERT_THRESHOLD,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Classify `current_price` for `position`.
    ///
    /// The stop is checked first, so a price within range of both levels is
    /// `NearStop`.
    pub fn evaluate(&self, position: &Position, current_price: Option<f64>) -> AlertState {
        let Some(price) = current_price else {
            return AlertState::PriceUnavailable;
        };

        let stop_gap = (price - position.stop_loss).abs() / position.stop_loss;
        let target_gap = (price - position.target).abs() / position.target;

        if stop_gap < self.threshold {
            AlertState::NearStop
        } else if target_gap < self.threshold {
            AlertState::NearTarget
        } else {
            AlertState::Clear
        }
    }

    /// Look up each position's price and classify it.
    ///
    /// One lookup is made per position; failed lookups become
    /// `PriceUnavailable`.
    pub fn evaluate_all<S: PriceSource + ?Sized>(
        &self,
        positions: &[Position],
        source: &S,
    ) -> Vec<PositionAlert> {
        positions
            .iter()
            .map(|position| {
                let current_price = source.get_live_price(&position.stock);
                PositionAlert {
                    stock: position.stock.clone(),
                    current_price,
                    state: self.evaluate(position, current_price),
                }
            })
            .collect()
    }
}
