//! Sizer Core - Position sizing and portfolio risk tracking library.
//!
//! This crate provides the core functionality behind the `sizer` tool:
//!
//! - **Position sizing**: share counts from a risk budget, entry and stop
//! - **Portfolio tracking**: an ordered position store mirrored to a CSV file
//! - **Summaries**: total investment, risk if stopped, potential gain
//! - **Price alerts**: proximity of a live price to stop or target
//!
//! # Example
//!
//! ```rust,no_run
//! use sizer_core::portfolio::{summarize, PositionStore};
//! use sizer_core::sizing::size_by_risk_percent;
//! use sizer_core::Position;
//!
//! // 1% of 100k at risk, entry 3800, stop 3700, target 4050
//! let sizing = size_by_risk_percent(100_000.0, 1.0, 3800.0, 3700.0, 4050.0)?;
//! println!("Buy {} shares for {:.2}", sizing.quantity, sizing.total_cost);
//!
//! let mut store = PositionStore::in_memory();
//! store.add(Position::new("TCS", 3800.0, sizing.quantity, 3700.0, 4050.0)?)?;
//!
//! let summary = summarize(&store);
//! println!("Risk if stopped: {:.2}", summary.total_risk_if_stopped);
//! # Ok::<(), sizer_core::Error>(())
//! ```

pub mod alerts;
pub mod config;
pub mod picks;
pub mod portfolio;
pub mod prices;
pub mod session;
pub mod sizing;
pub mod types;

// Re-export commonly used types
pub use types::{
    AlertState, ApiResponse, ImportResult, ImportRowError, Position, SizingResult,
};

// Re-export main functionality
pub use alerts::{PositionAlert, PriceAlertEvaluator};
pub use config::Settings;
pub use portfolio::{summarize, PortfolioSummary, PositionStore, SortKey};
pub use prices::{LookupError, PriceSource, StaticPriceSource};
pub use session::{AddTradeRequest, CommandOutcome, Session, SizeTradeRequest};
pub use sizing::{size_by_max_risk, size_by_risk_percent};

/// Error types for sizer-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid trade parameters: {0}")]
    InvalidTradeParameters(String),

    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for sizer-core operations.
pub type Result<T> = std::result::Result<T, Error>;
