//! User settings loaded from a TOML file.

use crate::portfolio::PositionStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Trading and lookup settings.
///
/// Every field has a default, so a partial (or missing) file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Total portfolio capital
    pub capital: f64,
    /// Percentage of capital risked per trade
    pub risk_percent: f64,
    /// Portfolio CSV file (defaults to `~/.sizer/portfolio.csv`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio_file: Option<PathBuf>,
    /// Externally produced picks table (defaults to `~/.sizer/picks.csv`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picks_file: Option<PathBuf>,
    /// Relative distance to stop/target that raises an alert
    pub alert_threshold: f64,
    /// Timeout for a single live price request
    pub price_timeout_secs: u64,
    /// Base URL of the quote endpoint
    pub price_api_url: String,
    /// Exchange suffix appended to bare tickers (e.g. ".NS")
    pub ticker_suffix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            capital: 500_000.0,
            risk_percent: 1.0,
            portfolio_file: None,
            picks_file: None,
            alert_threshold: 0.05,
            price_timeout_secs: 5,
            price_api_url: "https://query1.finance.yahoo.com".to_string(),
            ticker_suffix: String::new(),
        }
    }
}

impl Settings {
    /// Get the default config file path.
    ///
    /// Default path: `~/.sizer/config.toml`
    /// Can be overridden with `SIZER_CONFIG` environment variable.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var("SIZER_CONFIG") {
            return PathBuf::from(path);
        }

        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".sizer/config.toml"))
            .unwrap_or_else(|| PathBuf::from("sizer.toml"))
    }

    /// Load settings from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_path())
    }

    /// Load settings from a specific path. A missing file gives defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings = Self::from_toml(&content)?;
        tracing::info!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the calculators cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !self.capital.is_finite() || self.capital <= 0.0 {
            return Err(Error::Config(format!(
                "capital must be positive, got {}",
                self.capital
            )));
        }
        if !(self.risk_percent > 0.0 && self.risk_percent <= 100.0) {
            return Err(Error::Config(format!(
                "risk_percent must be in (0, 100], got {}",
                self.risk_percent
            )));
        }
        if !(self.alert_threshold > 0.0 && self.alert_threshold < 1.0) {
            return Err(Error::Config(format!(
                "alert_threshold must be in (0, 1), got {}",
                self.alert_threshold
            )));
        }
        if self.price_timeout_secs == 0 {
            return Err(Error::Config(
                "price_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Portfolio file, falling back to the store's default location.
    pub fn portfolio_path(&self) -> PathBuf {
        self.portfolio_file
            .clone()
            .unwrap_or_else(PositionStore::default_path)
    }

    /// Picks file, falling back to `~/.sizer/picks.csv`.
    pub fn picks_path(&self) -> PathBuf {
        self.picks_file.clone().unwrap_or_else(|| {
            directories::BaseDirs::new()
                .map(|dirs| dirs.home_dir().join(".sizer/picks.csv"))
                .unwrap_or_else(|| PathBuf::from("picks.csv"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.capital, 500_000.0);
        assert_eq!(settings.risk_percent, 1.0);
        assert_eq!(settings.alert_threshold, 0.05);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
            capital = 100000
            ticker_suffix = ".NS"
            portfolio_file = "/tmp/trades.csv"
            "#,
        )
        .unwrap();

        assert_eq!(settings.capital, 100_000.0);
        assert_eq!(settings.ticker_suffix, ".NS");
        assert_eq!(settings.risk_percent, 1.0);
        assert_eq!(settings.portfolio_path(), PathBuf::from("/tmp/trades.csv"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Settings::from_toml("risk_percent = 0.0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Settings::from_toml("risk_percent = 150.0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Settings::from_toml("capital = -5.0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Settings::from_toml("alert_threshold = 1.5"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Settings::from_toml("price_timeout_secs = 0"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            Settings::from_toml("capital = \"lots\""),
            Err(Error::Toml(_))
        ));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load_from_path(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "risk_percent = 2.5\nalert_threshold = 0.02\n").unwrap();

        let settings = Settings::load_from_path(&path).unwrap();
        assert_eq!(settings.risk_percent, 2.5);
        assert_eq!(settings.alert_threshold, 0.02);
    }
}
