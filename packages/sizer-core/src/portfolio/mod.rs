//! Portfolio management module.
//!
//! Provides the position store, its CSV format, and portfolio totals.

pub mod records;
mod store;
mod summary;

pub use store::{PositionStore, SortKey};
pub use summary::{summarize, PortfolioSummary};
