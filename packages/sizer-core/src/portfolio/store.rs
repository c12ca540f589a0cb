//! Ordered position storage and CSV persistence.

use super::records::{parse_positions, write_positions};
use crate::types::{ImportResult, Position};
use crate::{Error, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Display orderings for [`PositionStore::sort_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Stock,
    DateAdded,
    /// Largest investment first
    Investment,
    /// Largest risk if stopped first
    Risk,
}

/// Position store that keeps positions in insertion order and mirrors them
/// to a CSV file.
#[derive(Debug)]
pub struct PositionStore {
    /// Path to the backing CSV file (empty for in-memory stores)
    path: PathBuf,
    /// In-memory positions, in display order
    positions: Vec<Position>,
}

impl PositionStore {
    /// Open the store at the default path.
    ///
    /// Default path: `~/.sizer/portfolio.csv`
    /// Can be overridden with `SIZER_PORTFOLIO_FILE` environment variable.
    pub fn open_default() -> Result<(Self, ImportResult)> {
        Self::load(Self::default_path())
    }

    /// Create an in-memory store (no persistence).
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            positions: Vec::new(),
        }
    }

    /// Get the default portfolio file path.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var("SIZER_PORTFOLIO_FILE") {
            return PathBuf::from(path);
        }

        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".sizer/portfolio.csv"))
            .unwrap_or_else(|| PathBuf::from("portfolio.csv"))
    }

    /// Load a store backed by `path`.
    ///
    /// A missing file yields an empty store. Rows that fail to parse are
    /// skipped and reported in the returned [`ImportResult`]; an unreadable
    /// file is `Error::PersistenceUnavailable`.
    pub fn load(path: PathBuf) -> Result<(Self, ImportResult)> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No portfolio file, starting empty");
            return Ok((
                Self {
                    path,
                    positions: Vec::new(),
                },
                ImportResult::default(),
            ));
        }

        let data = fs::read(&path).map_err(|e| {
            Error::PersistenceUnavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        let (positions, result) = parse_positions(&data, Local::now().date_naive());

        if !result.is_clean() {
            tracing::warn!(
                path = %path.display(),
                rejected = result.rejected,
                "Skipped malformed rows while loading portfolio"
            );
        }
        tracing::info!(path = %path.display(), positions = positions.len(), "Loaded portfolio");

        Ok((Self { path, positions }, result))
    }

    /// Stop mirroring to the backing file, keeping the positions in memory.
    pub fn detach(&mut self) {
        self.path = PathBuf::new();
    }

    /// Get the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this store is mirrored to a file.
    pub fn is_persistent(&self) -> bool {
        !self.path.as_os_str().is_empty()
    }

    /// Write the current positions to the backing file.
    pub fn persist(&self) -> Result<()> {
        // Skip if in-memory only
        if !self.is_persistent() {
            return Ok(());
        }

        let unavailable = |e: std::io::Error| {
            Error::PersistenceUnavailable(format!("cannot write {}: {}", self.path.display(), e))
        };

        // Ensure parent directory exists
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(unavailable)?;
        }

        let content = self.export()?;
        fs::write(&self.path, content).map_err(unavailable)?;

        tracing::debug!(path = %self.path.display(), positions = self.positions.len(), "Persisted portfolio");
        Ok(())
    }

    /// Borrow the positions in display order.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Owned copy of the positions in display order.
    pub fn snapshot(&self) -> Vec<Position> {
        self.positions.clone()
    }

    /// Number of positions.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the store holds no positions.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Append a manually entered position.
    ///
    /// Rejects invalid fields and stops at or above the buy price.
    pub fn add(&mut self, position: Position) -> Result<()> {
        position.validate()?;
        position.ensure_stop_below_entry()?;
        self.positions.push(position);
        Ok(())
    }

    /// Append every well-formed row of a CSV batch.
    ///
    /// Bad rows are reported, not fatal. The stop/entry ordering is not
    /// checked, and rows without `Date Added` are stamped with today's date.
    pub fn import_batch(&mut self, data: &[u8]) -> ImportResult {
        let (positions, result) = parse_positions(data, Local::now().date_naive());
        self.positions.extend(positions);

        tracing::info!(
            accepted = result.accepted,
            rejected = result.rejected,
            "Imported position batch"
        );
        result
    }

    /// Remove the positions at the given indices in a single pass.
    ///
    /// Out-of-range indices are ignored. Returns how many were removed.
    pub fn remove_by_indices(&mut self, indices: &BTreeSet<usize>) -> usize {
        let before = self.positions.len();
        let mut idx = 0;
        self.positions.retain(|_| {
            let keep = !indices.contains(&idx);
            idx += 1;
            keep
        });
        before - self.positions.len()
    }

    /// Re-order positions for display. Ties keep their current order.
    pub fn sort_by(&mut self, key: SortKey) {
        match key {
            SortKey::Stock => self.positions.sort_by(|a, b| a.stock.cmp(&b.stock)),
            SortKey::DateAdded => self.positions.sort_by_key(|p| p.date_added),
            SortKey::Investment => self
                .positions
                .sort_by(|a, b| b.investment().total_cmp(&a.investment())),
            SortKey::Risk => self
                .positions
                .sort_by(|a, b| b.risk_if_stopped().total_cmp(&a.risk_if_stopped())),
        }
    }

    /// Clear all positions.
    pub fn clear(&mut self) {
        self.positions.clear();
    }

    /// Encode the positions in the persisted CSV format.
    pub fn export(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.export_to(&mut buf)?;
        Ok(buf)
    }

    /// Write the positions in the persisted CSV format.
    pub fn export_to<W: Write>(&self, writer: W) -> Result<()> {
        write_positions(writer, &self.positions)
    }
}
