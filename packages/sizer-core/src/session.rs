//! Session context and command handlers.
//!
//! A [`Session`] owns the position store and settings for the life of the
//! process. Each handler applies one user action to the store and, for
//! mutations, mirrors the result to disk. A failed write keeps the in-memory
//! change and is reported as a warning on the [`CommandOutcome`].

use crate::alerts::{PositionAlert, PriceAlertEvaluator};
use crate::config::Settings;
use crate::picks::{load_static_picks, PicksTable};
use crate::portfolio::{summarize, PortfolioSummary, PositionStore, SortKey};
use crate::prices::PriceSource;
use crate::sizing::{size_by_max_risk, size_by_risk_percent};
use crate::types::{ImportResult, Position, SizingResult};
use crate::Result;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Result of a command plus any non-fatal warning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandOutcome<T> {
    pub value: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl<T> CommandOutcome<T> {
    fn new(value: T, warning: Option<String>) -> Self {
        Self { value, warning }
    }
}

/// Parameters for the sizing calculator. Unset capital and risk come from
/// the session settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SizeTradeRequest {
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    pub capital: Option<f64>,
    pub risk_percent: Option<f64>,
}

/// A manually entered trade.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddTradeRequest {
    pub stock: String,
    pub buy_price: f64,
    pub stop_loss: f64,
    pub target: f64,
    /// Share count typed by the user
    pub quantity: u64,
    /// Absolute risk budget; a positive value replaces `quantity`
    pub max_risk: f64,
    /// Defaults to today
    pub date_added: Option<NaiveDate>,
}

/// Owned trading context: settings plus the position store.
#[derive(Debug)]
pub struct Session {
    settings: Settings,
    store: PositionStore,
    evaluator: PriceAlertEvaluator,
    /// Set once the backing file turned out to be unusable
    persistence_warning: Option<String>,
}

impl Session {
    /// Load the portfolio named by `settings`, or start empty.
    ///
    /// An unreadable file does not fail: the session runs in memory and
    /// [`Session::persistence_warning`] explains why. A file with rows that
    /// could not be parsed is also left untouched, so the session keeps the
    /// readable rows in memory only rather than rewriting the file without
    /// the others.
    pub fn init(settings: Settings) -> Self {
        let evaluator = PriceAlertEvaluator::new(settings.alert_threshold);
        let path = settings.portfolio_path();

        match PositionStore::load(path) {
            Ok((mut store, load_result)) => {
                let persistence_warning = if load_result.is_clean() {
                    None
                } else {
                    let warning = format!(
                        "{} malformed row(s) skipped while loading {}; changes will not be saved until the file is fixed",
                        load_result.rejected,
                        store.path().display()
                    );
                    tracing::warn!(
                        path = %store.path().display(),
                        "Portfolio file has malformed rows, continuing in memory"
                    );
                    store.detach();
                    Some(warning)
                };
                Self {
                    settings,
                    store,
                    evaluator,
                    persistence_warning,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Portfolio file unavailable, continuing in memory");
                Self {
                    settings,
                    store: PositionStore::in_memory(),
                    evaluator,
                    persistence_warning: Some(e.to_string()),
                }
            }
        }
    }

    /// Start a session around an existing store.
    pub fn with_store(settings: Settings, store: PositionStore) -> Self {
        Self {
            evaluator: PriceAlertEvaluator::new(settings.alert_threshold),
            settings,
            store,
            persistence_warning: None,
        }
    }

    /// Write the final state and end the session.
    pub fn teardown(self) -> Result<()> {
        self.store.persist()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    /// Warning raised while loading or last persisting, if any.
    pub fn persistence_warning(&self) -> Option<&str> {
        self.persistence_warning.as_deref()
    }

    /// Size a candidate trade from the capital and risk budget.
    pub fn on_size_trade(&self, request: &SizeTradeRequest) -> Result<SizingResult> {
        size_by_risk_percent(
            request.capital.unwrap_or(self.settings.capital),
            request.risk_percent.unwrap_or(self.settings.risk_percent),
            request.entry,
            request.stop,
            request.target,
        )
    }

    /// Validate and record a manually entered trade.
    pub fn on_add_trade(&mut self, request: AddTradeRequest) -> Result<CommandOutcome<Position>> {
        let quantity = size_by_max_risk(
            request.max_risk,
            request.buy_price,
            request.stop_loss,
            request.quantity,
        )?;
        let position = Position::dated(
            &request.stock,
            request.buy_price,
            quantity,
            request.stop_loss,
            request.target,
            request.date_added.unwrap_or_else(|| Local::now().date_naive()),
        )?;

        self.store.add(position.clone())?;
        tracing::info!(stock = %position.stock, quantity, "Added trade");

        let warning = self.persist();
        Ok(CommandOutcome::new(position, warning))
    }

    /// Append the well-formed rows of a CSV batch.
    pub fn on_import_batch(&mut self, data: &[u8]) -> CommandOutcome<ImportResult> {
        let result = self.store.import_batch(data);
        let warning = if result.accepted > 0 {
            self.persist()
        } else {
            None
        };
        CommandOutcome::new(result, warning)
    }

    /// Remove the selected rows.
    pub fn on_delete_selected(&mut self, indices: &BTreeSet<usize>) -> CommandOutcome<usize> {
        let removed = self.store.remove_by_indices(indices);
        let warning = if removed > 0 {
            tracing::info!(removed, "Deleted positions");
            self.persist()
        } else {
            None
        };
        CommandOutcome::new(removed, warning)
    }

    /// Re-order the positions and save the new order.
    pub fn on_sort(&mut self, key: SortKey) -> CommandOutcome<()> {
        self.store.sort_by(key);
        let warning = self.persist();
        CommandOutcome::new((), warning)
    }

    /// Current portfolio totals.
    pub fn on_summarize(&self) -> PortfolioSummary {
        summarize(&self.store)
    }

    /// Classify every position against its live price.
    pub fn on_check_alerts<S: PriceSource + ?Sized>(&self, source: &S) -> Vec<PositionAlert> {
        self.evaluator.evaluate_all(self.store.positions(), source)
    }

    /// Portfolio in the persisted CSV format.
    pub fn on_export(&self) -> Result<Vec<u8>> {
        self.store.export()
    }

    /// Picks table from the configured file, if one is available.
    pub fn on_load_picks(&self) -> Option<PicksTable> {
        load_static_picks(&self.settings.picks_path())
    }

    fn persist(&mut self) -> Option<String> {
        // A session cut off from its file keeps reporting why
        if !self.store.is_persistent() {
            return self.persistence_warning.clone();
        }

        match self.store.persist() {
            Ok(()) => {
                self.persistence_warning = None;
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Keeping changes in memory only");
                let warning = e.to_string();
                self.persistence_warning = Some(warning.clone());
                Some(warning)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prices::StaticPriceSource;
    use crate::types::AlertState;
    use crate::Error;
    use approx::assert_relative_eq;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn settings_at(path: &Path) -> Settings {
        Settings {
            portfolio_file: Some(path.to_path_buf()),
            picks_file: Some(path.with_file_name("picks.csv")),
            ..Settings::default()
        }
    }

    fn tcs_request() -> AddTradeRequest {
        AddTradeRequest {
            stock: "tcs".to_string(),
            buy_price: 3800.0,
            stop_loss: 3700.0,
            target: 4050.0,
            quantity: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_init_without_file_is_empty() {
        let dir = tempdir().unwrap();
        let session = Session::init(settings_at(&dir.path().join("portfolio.csv")));

        assert!(session.store().is_empty());
        assert!(session.persistence_warning().is_none());
    }

    #[test]
    fn test_on_size_trade_uses_settings_defaults() {
        let session = Session::with_store(
            Settings {
                capital: 100_000.0,
                ..Settings::default()
            },
            PositionStore::in_memory(),
        );
        let request = SizeTradeRequest {
            entry: 3800.0,
            stop: 3700.0,
            target: 4050.0,
            ..Default::default()
        };

        let result = session.on_size_trade(&request).unwrap();
        assert_eq!(result.quantity, 10);

        let wider = SizeTradeRequest {
            risk_percent: Some(2.0),
            ..request
        };
        assert_eq!(session.on_size_trade(&wider).unwrap().quantity, 20);
    }

    #[test]
    fn test_on_add_trade_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("portfolio.csv");
        let mut session = Session::init(settings_at(&path));

        let outcome = session.on_add_trade(tcs_request()).unwrap();
        assert_eq!(outcome.value.stock, "TCS");
        assert!(outcome.warning.is_none());

        let reloaded = Session::init(settings_at(&path));
        assert_eq!(reloaded.store().positions(), session.store().positions());
    }

    #[test]
    fn test_on_add_trade_max_risk_overrides_quantity() {
        let mut session = Session::with_store(Settings::default(), PositionStore::in_memory());
        let request = AddTradeRequest {
            max_risk: 1500.0,
            ..tcs_request()
        };

        let outcome = session.on_add_trade(request).unwrap();
        assert_eq!(outcome.value.quantity, 15);
    }

    #[test]
    fn test_on_add_trade_rejects_bad_input() {
        let mut session = Session::with_store(Settings::default(), PositionStore::in_memory());

        let stop_above = AddTradeRequest {
            stop_loss: 3900.0,
            ..tcs_request()
        };
        assert!(matches!(
            session.on_add_trade(stop_above),
            Err(Error::InvalidTradeParameters(_))
        ));

        let no_stock = AddTradeRequest {
            stock: String::new(),
            ..tcs_request()
        };
        assert!(session.on_add_trade(no_stock).is_err());

        // A risk budget too small for one share leaves zero shares
        let tiny_budget = AddTradeRequest {
            max_risk: 50.0,
            ..tcs_request()
        };
        assert!(session.on_add_trade(tiny_budget).is_err());

        assert!(session.store().is_empty());
    }

    #[test]
    fn test_on_import_and_delete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("portfolio.csv");
        let mut session = Session::init(settings_at(&path));

        let outcome = session.on_import_batch(
            b"Stock,Buy Price,Quantity,Stop Loss,Target\nTCS,3800,10,3700,4050\nINFY,x,1,1,1\nSBIN,800,15,770,880\n",
        );
        assert_eq!(outcome.value.accepted, 2);
        assert_eq!(outcome.value.errors.len(), 1);

        let removed = session.on_delete_selected(&BTreeSet::from([0]));
        assert_eq!(removed.value, 1);

        let reloaded = Session::init(settings_at(&path));
        assert_eq!(reloaded.store().len(), 1);
        assert_eq!(reloaded.store().positions()[0].stock, "SBIN");
    }

    #[test]
    fn test_unwritable_file_degrades_to_memory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("taken");
        let (store, _) = PositionStore::load(path.clone()).unwrap();
        // Occupy the file path with a directory after loading
        fs::create_dir(&path).unwrap();
        let mut session = Session::with_store(settings_at(&path), store);

        let outcome = session.on_add_trade(tcs_request()).unwrap();

        assert!(outcome.warning.is_some());
        assert!(session.persistence_warning().is_some());
        assert_eq!(session.store().len(), 1);
    }

    #[test]
    fn test_unreadable_file_starts_in_memory() {
        let dir = tempdir().unwrap();
        // Reading a directory as the portfolio file fails
        let session = Session::init(settings_at(dir.path()));

        assert!(session.persistence_warning().is_some());
        assert!(!session.store().is_persistent());
    }

    #[test]
    fn test_summarize_and_alerts() {
        let mut session = Session::with_store(Settings::default(), PositionStore::in_memory());
        session.on_add_trade(tcs_request()).unwrap();

        let summary = session.on_summarize();
        assert_relative_eq!(summary.total_investment, 38_000.0);
        assert_relative_eq!(summary.total_risk_if_stopped, 1000.0);
        assert_relative_eq!(summary.total_potential_gain, 2500.0);

        let alerts = session.on_check_alerts(&StaticPriceSource::new().with_price("TCS", 4040.0));
        assert_eq!(alerts[0].state, AlertState::NearTarget);
    }

    #[test]
    fn test_on_sort_persists_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("portfolio.csv");
        let mut session = Session::init(settings_at(&path));
        session.on_add_trade(tcs_request()).unwrap();
        session
            .on_add_trade(AddTradeRequest {
                stock: "INFY".to_string(),
                buy_price: 1500.0,
                stop_loss: 1450.0,
                target: 1650.0,
                quantity: 20,
                ..Default::default()
            })
            .unwrap();

        session.on_sort(SortKey::Stock);

        let reloaded = Session::init(settings_at(&path));
        assert_eq!(reloaded.store().positions()[0].stock, "INFY");
    }

    #[test]
    fn test_export_and_picks() {
        let dir = tempdir().unwrap();
        let session = Session::init(settings_at(&dir.path().join("portfolio.csv")));

        let export = String::from_utf8(session.on_export().unwrap()).unwrap();
        assert!(export.starts_with("Stock,Buy Price,Quantity,Stop Loss,Target,Date Added"));
        assert!(session.on_load_picks().is_none());
    }

    const TCS_AND_BAD_WIPRO: &str = "Stock,Buy Price,Quantity,Stop Loss,Target,Date Added\n\
TCS,3800.0,10,3700.0,4050.0,2024-01-15\n\
WIPRO,n/a,30,440.0,500.0,2024-01-16\n";

    #[test]
    fn test_malformed_rows_are_never_written_over() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("portfolio.csv");
        fs::write(&path, TCS_AND_BAD_WIPRO).unwrap();

        let mut session = Session::init(settings_at(&path));
        assert_eq!(session.store().len(), 1);
        assert!(!session.store().is_persistent());
        assert!(session
            .persistence_warning()
            .is_some_and(|w| w.contains("1 malformed row")));

        session.on_summarize();
        let outcome = session.on_add_trade(tcs_request()).unwrap();
        assert!(outcome.warning.is_some());
        assert!(session.persistence_warning().is_some());
        session.teardown().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), TCS_AND_BAD_WIPRO);
    }

    #[test]
    fn test_unrecognised_header_keeps_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("portfolio.csv");
        let original = "Stock,Buy Price,Qty,Stop Loss,Target\nTCS,3800,10,3700,4050\nINFY,1500,20,1450,1650\n";
        fs::write(&path, original).unwrap();

        let session = Session::init(settings_at(&path));
        assert!(session.store().is_empty());
        assert!(session.persistence_warning().is_some());
        session.teardown().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_teardown_writes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("portfolio.csv");
        let session = Session::init(settings_at(&path));

        session.teardown().unwrap();
        assert!(path.exists());
    }
}
