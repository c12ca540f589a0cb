//! Tabular (CSV) encoding of positions.

use crate::types::{ImportResult, Position};
use crate::{Error, Result};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use std::io::Write;

/// Column headers of the portfolio file, in write order.
pub const COLUMNS: [&str; 6] = [
    "Stock",
    "Buy Price",
    "Quantity",
    "Stop Loss",
    "Target",
    "Date Added",
];

/// Format of the `Date Added` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Column positions resolved from a header row.
#[derive(Debug, Default)]
struct ColumnMap {
    stock: Option<usize>,
    buy_price: Option<usize>,
    quantity: Option<usize>,
    stop_loss: Option<usize>,
    target: Option<usize>,
    date_added: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Self {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };

        Self {
            stock: find(COLUMNS[0]),
            buy_price: find(COLUMNS[1]),
            quantity: find(COLUMNS[2]),
            stop_loss: find(COLUMNS[3]),
            target: find(COLUMNS[4]),
            date_added: find(COLUMNS[5]),
        }
    }
}

/// Parse CSV data into positions, collecting one error per bad row.
///
/// Rows are matched to columns by header name. A missing or empty
/// `Date Added` is replaced with `default_date`. The stop/entry ordering is
/// not checked here.
pub fn parse_positions(data: &[u8], default_date: NaiveDate) -> (Vec<Position>, ImportResult) {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(data);

    let mut positions = Vec::new();
    let mut result = ImportResult::default();

    let columns = match reader.headers() {
        Ok(headers) => ColumnMap::from_headers(headers),
        Err(e) => {
            result.reject(0, format!("unreadable header: {}", e));
            return (positions, result);
        }
    };

    for (idx, record) in reader.records().enumerate() {
        let row = idx + 1;
        let parsed = record
            .map_err(|e| e.to_string())
            .and_then(|record| parse_row(&record, &columns, default_date));

        match parsed {
            Ok(position) => positions.push(position),
            Err(reason) => result.reject(row, reason),
        }
    }

    result.accepted = positions.len();
    (positions, result)
}

fn parse_row(
    record: &StringRecord,
    columns: &ColumnMap,
    default_date: NaiveDate,
) -> std::result::Result<Position, String> {
    let stock = field(record, columns.stock, COLUMNS[0])?;
    let buy_price = parse_price(field(record, columns.buy_price, COLUMNS[1])?, COLUMNS[1])?;
    let quantity = parse_quantity(field(record, columns.quantity, COLUMNS[2])?)?;
    let stop_loss = parse_price(field(record, columns.stop_loss, COLUMNS[3])?, COLUMNS[3])?;
    let target = parse_price(field(record, columns.target, COLUMNS[4])?, COLUMNS[4])?;

    let date_added = match columns.date_added.and_then(|i| record.get(i)) {
        Some(raw) if !raw.is_empty() => NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map_err(|_| format!("Date Added is not a YYYY-MM-DD date: '{}'", raw))?,
        _ => default_date,
    };

    Position::dated(stock, buy_price, quantity, stop_loss, target, date_added).map_err(|e| {
        match e {
            Error::InvalidTradeParameters(msg) => msg,
            other => other.to_string(),
        }
    })
}

fn field<'r>(
    record: &'r StringRecord,
    column: Option<usize>,
    name: &str,
) -> std::result::Result<&'r str, String> {
    let idx = column.ok_or_else(|| format!("missing column '{}'", name))?;
    match record.get(idx) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(format!("missing value for '{}'", name)),
    }
}

fn parse_price(raw: &str, name: &str) -> std::result::Result<f64, String> {
    raw.parse::<f64>()
        .map_err(|_| format!("{} is not a number: '{}'", name, raw))
}

fn parse_quantity(raw: &str) -> std::result::Result<u64, String> {
    if let Ok(quantity) = raw.parse::<u64>() {
        return Ok(quantity);
    }

    // Spreadsheets often write whole numbers as "10.0"
    match raw.parse::<f64>() {
        Ok(value) if value >= u64::MAX as f64 => {
            Err(format!("Quantity is too large: '{}'", raw))
        }
        Ok(value) if value.is_finite() && value >= 0.0 && value.fract() == 0.0 => {
            Ok(value as u64)
        }
        Ok(_) => Err(format!(
            "Quantity must be a positive whole number, got '{}'",
            raw
        )),
        Err(_) => Err(format!("Quantity is not a number: '{}'", raw)),
    }
}

/// Write positions as CSV with a header row, even when empty.
pub fn write_positions<W: Write>(writer: W, positions: &[Position]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);

    writer.write_record(COLUMNS)?;
    for position in positions {
        writer.serialize(position)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    #[test]
    fn test_parse_without_date_column_uses_default() {
        let data = b"Stock,Buy Price,Quantity,Stop Loss,Target\ninfy,1500,20,1450,1650\n";
        let (positions, result) = parse_positions(data, today());

        assert!(result.is_clean());
        assert_eq!(result.accepted, 1);
        assert_eq!(positions[0].stock, "INFY");
        assert_eq!(positions[0].quantity, 20);
        assert_eq!(positions[0].date_added, today());
    }

    #[test]
    fn test_parse_keeps_explicit_date() {
        let data = b"Stock,Buy Price,Quantity,Stop Loss,Target,Date Added\nTCS,3800,10,3700,4050,2023-11-20\n";
        let (positions, _) = parse_positions(data, today());

        assert_eq!(
            positions[0].date_added,
            NaiveDate::from_ymd_opt(2023, 11, 20).unwrap()
        );
    }

    #[test]
    fn test_parse_matches_headers_by_name() {
        let data = b" target , stock,QUANTITY,Stop Loss,Buy Price\n4050,TCS,10,3700,3800\n";
        let (positions, result) = parse_positions(data, today());

        assert!(result.is_clean());
        assert_eq!(positions[0].buy_price, 3800.0);
        assert_eq!(positions[0].target, 4050.0);
    }

    #[test]
    fn test_parse_reports_bad_rows() {
        let data = b"Stock,Buy Price,Quantity,Stop Loss,Target,Date Added\n\
TCS,3800,10,3700,4050,\n\
INFY,abc,5,1400,1600,\n\
HDFC,1600,2.5,1500,1800,\n\
WIPRO,450,10\n\
RELIANCE,2500,4,2400,2800,not-a-date\n";
        let (positions, result) = parse_positions(data, today());

        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].date_added, today());
        assert_eq!(result.accepted, 1);
        assert_eq!(result.rejected, 4);
        let rows: Vec<usize> = result.errors.iter().map(|e| e.row).collect();
        assert_eq!(rows, vec![2, 3, 4, 5]);
        assert!(result.errors[0].reason.contains("Buy Price"));
    }

    #[test]
    fn test_parse_missing_column_rejects_every_row() {
        let data = b"Stock,Buy Price,Quantity,Stop Loss\nTCS,3800,10,3700\nINFY,1500,5,1400\n";
        let (positions, result) = parse_positions(data, today());

        assert!(positions.is_empty());
        assert_eq!(result.rejected, 2);
        assert!(result.errors[0].reason.contains("missing column 'Target'"));
    }

    #[test]
    fn test_parse_accepts_whole_float_quantity() {
        assert_eq!(parse_quantity("10.0"), Ok(10));
        assert!(parse_quantity("-3").is_err());
        assert!(parse_quantity("ten").is_err());
    }

    #[test]
    fn test_parse_rejects_oversized_quantity() {
        let data = b"Stock,Buy Price,Quantity,Stop Loss,Target
TCS,3800,1e30,3700,4050
INFY,1500,20,1450,1650
";
        let (positions, result) = parse_positions(data, today());

        assert_eq!(result.accepted, 1);
        assert_eq!(positions[0].stock, "INFY");
        assert_eq!(result.errors[0].row, 1);
        assert!(result.errors[0].reason.contains("too large"));
        assert!(parse_quantity("18446744073709551616").is_err());
        assert_eq!(parse_quantity("18446744073709551615"), Ok(u64::MAX));
    }

    #[test]
    fn test_parse_empty_input() {
        let (positions, result) = parse_positions(b"", today());
        assert!(positions.is_empty());
        assert_eq!(result, ImportResult::default());
    }

    #[test]
    fn test_write_empty_has_header() {
        let mut out = Vec::new();
        write_positions(&mut out, &[]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Stock,Buy Price,Quantity,Stop Loss,Target,Date Added\n"
        );
    }
}
