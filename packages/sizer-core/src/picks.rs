//! Read-only access to an externally produced picks table.
//!
//! The table is opaque: headers and cells are passed through as text.

use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Rows of a picks file, as written by whatever produced it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PicksTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl PicksTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Load the picks table at `path`.
///
/// A missing file is reported as information, an unreadable one as a
/// warning; both return `None`.
pub fn load_static_picks(path: &Path) -> Option<PicksTable> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "No picks file available");
        return None;
    }

    match read_table(path) {
        Ok(table) => Some(table),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not read picks file");
            None
        }
    }
}

fn read_table(path: &Path) -> crate::Result<PicksTable> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)?;

    let headers = reader.headers()?.iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PicksTable { headers, rows })
}
