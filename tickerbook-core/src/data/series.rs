//! Closing-price extraction for the plotter.
//!
//! Reads one sheet, finds its date and close columns by header, and parses
//! the date column whatever its on-disk form: Excel date cells, raw serials,
//! or text in the common ISO and US layouts.

use super::provider::DataError;
use super::workbook::{Cell, Workbook};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

const DATE_HEADERS: [&str; 3] = ["date", "datetime", "timestamp"];
const CLOSE_HEADERS: [&str; 2] = ["close", "adj close"];
/// 9999-12-31, the last day Excel can display.
const MAX_EXCEL_SERIAL: f64 = 2_958_465.999_988;

const DATETIME_LAYOUTS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];
const DATE_LAYOUTS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

/// One point on the closing-price chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosePoint {
    pub date: NaiveDateTime,
    pub close: f64,
}

/// Closing prices of one sheet, sorted by date.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosingSeries {
    pub sheet: String,
    pub points: Vec<ClosePoint>,
}

impl ClosingSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Lowest and highest close, ignoring non-finite values.
    pub fn close_bounds(&self) -> Option<(f64, f64)> {
        self.points
            .iter()
            .map(|p| p.close)
            .filter(|c| c.is_finite())
            .fold(None, |acc, c| match acc {
                None => Some((c, c)),
                Some((lo, hi)) => Some((lo.min(c), hi.max(c))),
            })
    }

    /// First and last date.
    pub fn date_bounds(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        Some((self.points.first()?.date, self.points.last()?.date))
    }
}

/// Load the date/close columns of `sheet` from `workbook`.
pub fn load_closing_series(workbook: &Workbook, sheet: &str) -> Result<ClosingSeries, DataError> {
    let rows = workbook.read_sheet(sheet)?;
    extract_closing_series(sheet, &rows)
}

/// Build a closing series from rows whose first row is the header.
pub fn extract_closing_series(sheet: &str, rows: &[Vec<Cell>]) -> Result<ClosingSeries, DataError> {
    let Some(header) = rows.first() else {
        return Ok(ClosingSeries {
            sheet: sheet.to_string(),
            points: Vec::new(),
        });
    };

    let names: Vec<String> = header
        .iter()
        .map(|c| c.display().trim().to_lowercase())
        .collect();
    let find = |candidates: &[&str]| {
        candidates
            .iter()
            .find_map(|want| names.iter().position(|n| n.as_str() == *want))
    };

    let date_col = find(&DATE_HEADERS).unwrap_or(0);
    let close_col = find(&CLOSE_HEADERS).ok_or_else(|| DataError::MissingColumn {
        sheet: sheet.to_string(),
        column: "Close".into(),
    })?;

    let mut points = Vec::with_capacity(rows.len().saturating_sub(1));
    for (i, row) in rows.iter().enumerate().skip(1) {
        let date_cell = row.get(date_col).unwrap_or(&Cell::Empty);
        let close_cell = row.get(close_col).unwrap_or(&Cell::Empty);
        if date_cell.is_empty() && close_cell.is_empty() {
            continue;
        }

        let date = parse_date_cell(date_cell).ok_or_else(|| DataError::InvalidDate {
            sheet: sheet.to_string(),
            // 1-based, as spreadsheet users count rows
            row: i + 1,
            value: date_cell.display(),
        })?;

        match parse_close_cell(close_cell) {
            Some(close) => points.push(ClosePoint { date, close }),
            None => log::debug!(
                "{sheet} row {}: skipping non-numeric close '{}'",
                i + 1,
                close_cell.display()
            ),
        }
    }

    points.sort_by_key(|p| p.date);
    Ok(ClosingSeries {
        sheet: sheet.to_string(),
        points,
    })
}

/// Interpret a cell as a date/time.
pub fn parse_date_cell(cell: &Cell) -> Option<NaiveDateTime> {
    match cell {
        Cell::DateTime(serial) | Cell::Number(serial) => from_excel_serial(*serial),
        Cell::Text(text) => parse_date_text(text),
        _ => None,
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    if let Some(dt) = DATETIME_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
    {
        return Some(dt);
    }
    DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(text, layout).ok())
        .map(|d| d.and_time(NaiveTime::MIN))
}

fn parse_close_cell(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) => Some(*n),
        Cell::Text(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

/// Excel serial (days since 1899-12-30, fraction = time of day) to a timestamp.
///
/// Anything outside Excel's own date range is not a date.
fn from_excel_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(0.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
    let secs = (serial * 86_400.0).round() as i64;
    epoch.checked_add_signed(TimeDelta::try_seconds(secs)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_time(NaiveTime::MIN)
    }

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn parses_excel_date_cells() {
        assert_eq!(parse_date_cell(&Cell::DateTime(45293.0)), Some(ymd(2024, 1, 2)));
        assert_eq!(parse_date_cell(&Cell::Number(32874.0)), Some(ymd(1990, 1, 1)));
        let noon = parse_date_cell(&Cell::DateTime(45293.5)).unwrap();
        assert_eq!(noon, ymd(2024, 1, 2) + chrono::Duration::hours(12));
    }

    #[test]
    fn parses_textual_dates() {
        for raw in [
            "2024-01-02",
            "2024/01/02",
            "01/02/2024",
            "02.01.2024",
            "2024-01-02 00:00:00",
            "2024-01-02T00:00:00",
            "2024-01-02T00:00:00+00:00",
            "  2024-01-02  ",
        ] {
            assert_eq!(parse_date_cell(&text(raw)), Some(ymd(2024, 1, 2)), "{raw}");
        }
    }

    #[test]
    fn rejects_non_dates() {
        assert_eq!(parse_date_cell(&text("yesterday")), None);
        assert_eq!(parse_date_cell(&Cell::Bool(true)), None);
        assert_eq!(parse_date_cell(&Cell::Empty), None);
    }

    #[test]
    fn finds_columns_case_insensitively() {
        let rows = vec![
            vec![text("Open"), text("Date"), text(" CLOSE ")],
            vec![Cell::Number(1.0), text("2024-01-03"), Cell::Number(11.0)],
            vec![Cell::Number(1.0), text("2024-01-02"), Cell::Number(10.0)],
        ];
        let series = extract_closing_series("X", &rows).unwrap();
        assert_eq!(series.points.len(), 2);
        // Sorted by date
        assert_eq!(series.points[0].date, ymd(2024, 1, 2));
        assert_eq!(series.points[0].close, 10.0);
        assert_eq!(series.close_bounds(), Some((10.0, 11.0)));
    }

    #[test]
    fn falls_back_to_first_column_and_adj_close() {
        let rows = vec![
            vec![text("Price"), text("Adj Close")],
            vec![Cell::DateTime(45293.0), text("1,234.5")],
        ];
        let series = extract_closing_series("X", &rows).unwrap();
        assert_eq!(series.points[0].close, 1234.5);
    }

    #[test]
    fn missing_close_column_is_an_error() {
        let rows = vec![vec![text("date"), text("Open")]];
        assert!(matches!(
            extract_closing_series("X", &rows),
            Err(DataError::MissingColumn { .. })
        ));
    }

    #[test]
    fn bad_date_reports_row() {
        let rows = vec![
            vec![text("date"), text("Close")],
            vec![text("2024-01-02"), Cell::Number(1.0)],
            vec![text("soon"), Cell::Number(2.0)],
        ];
        match extract_closing_series("X", &rows) {
            Err(DataError::InvalidDate { row, value, .. }) => {
                assert_eq!(row, 3);
                assert_eq!(value, "soon");
            }
            other => panic!("expected InvalidDate, got {other:?}"),
        }
    }

    #[test]
    fn blank_rows_and_blank_closes_are_skipped() {
        let rows = vec![
            vec![text("date"), text("Close")],
            vec![],
            vec![text("2024-01-02"), Cell::Empty],
            vec![text("2024-01-03"), Cell::Number(5.0)],
        ];
        let series = extract_closing_series("X", &rows).unwrap();
        assert_eq!(series.points.len(), 1);
        assert_eq!(series.date_bounds(), Some((ymd(2024, 1, 3), ymd(2024, 1, 3))));
    }

    #[test]
    fn serials_beyond_excel_range_are_not_dates() {
        assert_eq!(parse_date_cell(&Cell::Number(1.0e12)), None);
        assert_eq!(parse_date_cell(&Cell::Number(-1.0)), None);
        assert_eq!(parse_date_cell(&Cell::Number(f64::NAN)), None);
        assert_eq!(
            parse_date_cell(&Cell::Number(2_958_465.0)),
            Some(ymd(9999, 12, 31))
        );
    }

    #[test]
    fn huge_number_in_fallback_date_column_is_invalid_date() {
        let rows = vec![
            vec![text("Id"), text("Close")],
            vec![Cell::Number(1.0e12), Cell::Number(5.0)],
        ];
        match extract_closing_series("IDS", &rows) {
            Err(DataError::InvalidDate { row, value, .. }) => {
                assert_eq!(row, 2);
                assert_eq!(value, "1000000000000");
            }
            other => panic!("expected InvalidDate, got {other:?}"),
        }
    }

    #[test]
    fn empty_sheet_is_empty_series() {
        let series = extract_closing_series("X", &[]).unwrap();
        assert!(series.is_empty());
        assert_eq!(series.close_bounds(), None);
    }
}
