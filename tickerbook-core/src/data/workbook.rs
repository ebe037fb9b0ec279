//! Price workbook: one `.xlsx` file, one sheet per ticker.
//!
//! `.xlsx` files cannot be patched in place, so an upsert reads every sheet
//! with calamine, rebuilds the whole workbook with rust_xlsxwriter (replacing
//! or appending the target sheet), and swaps it in:
//! - Sheet order is preserved; a replaced sheet keeps its position
//! - Untouched sheets keep every cell value and type, their formulas and
//!   their merged ranges
//! - Dates from 1904-based workbooks are rebased onto the 1900 epoch
//! - Atomic writes (write to .tmp, rename into place)
//!
//! Cell styles other than date/duration number formats are not carried over.

use super::provider::{DataError, PriceBar};
use calamine::{
    open_workbook, Data, Dimensions, ExcelDateTime, ExcelDateTimeType, Range, Reader, Xlsx,
};
use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Formula, Worksheet};
use std::fs;
use std::path::{Path, PathBuf};

/// Header row written at the top of every price sheet.
pub const PRICE_HEADER: [&str; 6] = ["date", "Open", "High", "Low", "Close", "Volume"];

const DATE_FORMAT: &str = "yyyy-mm-dd";
const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";
const DURATION_FORMAT: &str = "[h]:mm:ss";
const MAX_SHEET_NAME_LEN: usize = 31;
const FORBIDDEN_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];
/// Days between the 1900 and 1904 date-system epochs.
const EPOCH_1904_OFFSET_DAYS: f64 = 1462.0;

/// A single cell value read from a workbook.
///
/// Dates and durations are kept as Excel serials so they can be written back
/// unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    DateTime(f64),
    Duration(f64),
    Error(String),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Textual form, used in error messages and for header matching.
    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) | Cell::DateTime(n) | Cell::Duration(n) => n.to_string(),
            Cell::Text(s) | Cell::Error(s) => s.clone(),
            Cell::Bool(b) => b.to_string(),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::String(s) => Cell::Text(s.clone()),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) if dt.is_duration() => Cell::Duration(dt.as_f64()),
            Data::DateTime(dt) if is_1904_datetime(dt) => {
                Cell::DateTime(dt.as_f64() + EPOCH_1904_OFFSET_DAYS)
            }
            Data::DateTime(dt) => Cell::DateTime(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(e) => Cell::Error(e.to_string()),
        }
    }
}

/// calamine keeps the date system private; equality exposes it.
fn is_1904_datetime(dt: &ExcelDateTime) -> bool {
    *dt == ExcelDateTime::new(dt.as_f64(), ExcelDateTimeType::DateTime, true)
}

/// What an upsert did to the workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetWrite {
    /// The workbook file did not exist and was created with this sheet.
    Created,
    /// The sheet was appended to an existing workbook.
    Added,
    /// An existing sheet's contents were replaced.
    Replaced,
}

/// A sheet held in memory between read and rewrite.
struct SheetContents {
    name: String,
    rows: Vec<Vec<Cell>>,
    /// `(row, col, formula)` in absolute coordinates.
    formulas: Vec<(u32, u32, String)>,
    merges: Vec<Dimensions>,
}

impl SheetContents {
    fn values(name: String, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name,
            rows,
            formulas: Vec::new(),
            merges: Vec::new(),
        }
    }
}

/// Handle to a price workbook on disk.
#[derive(Debug, Clone)]
pub struct Workbook {
    path: PathBuf,
}

impl Workbook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Sheet names in workbook order.
    pub fn sheet_names(&self) -> Result<Vec<String>, DataError> {
        Ok(self.open()?.sheet_names())
    }

    /// Read one sheet as rows of cells in absolute coordinates.
    pub fn read_sheet(&self, name: &str) -> Result<Vec<Vec<Cell>>, DataError> {
        let mut reader = self.open()?;
        let names = reader.sheet_names();
        let actual = names
            .iter()
            .find(|s| s.as_str() == name)
            .or_else(|| names.iter().find(|s| s.eq_ignore_ascii_case(name)))
            .cloned()
            .ok_or_else(|| DataError::SheetNotFound {
                sheet: name.to_string(),
                path: self.path.display().to_string(),
            })?;
        let range = reader
            .worksheet_range(&actual)
            .map_err(|e| DataError::Workbook(format!("read sheet '{actual}': {e}")))?;
        Ok(range_to_rows(&range))
    }

    /// Write `bars` to the sheet named after the uppercased `symbol`.
    ///
    /// Creates the workbook if it does not exist; otherwise replaces the
    /// matching sheet in place or appends a new one, leaving all other sheets
    /// untouched.
    pub fn upsert_series(&self, symbol: &str, bars: &[PriceBar]) -> Result<SheetWrite, DataError> {
        let sheet_name = symbol.trim().to_uppercase();
        validate_sheet_name(&sheet_name)?;
        let new_rows = series_rows(bars);

        let (sheets, write) = if self.exists() {
            let mut sheets = self.read_all()?;
            let existing = sheets
                .iter_mut()
                .find(|s| s.name.to_uppercase() == sheet_name);
            match existing {
                Some(sheet) => {
                    *sheet = SheetContents::values(sheet_name.clone(), new_rows);
                    (sheets, SheetWrite::Replaced)
                }
                None => {
                    sheets.push(SheetContents::values(sheet_name.clone(), new_rows));
                    (sheets, SheetWrite::Added)
                }
            }
        } else {
            let sheets = vec![SheetContents::values(sheet_name.clone(), new_rows)];
            (sheets, SheetWrite::Created)
        };

        self.write_all(&sheets, &sheet_name)?;
        log::info!(
            "{write:?} sheet '{sheet_name}' ({} rows) in {}",
            bars.len(),
            self.path.display()
        );
        Ok(write)
    }

    fn open(&self) -> Result<Xlsx<std::io::BufReader<fs::File>>, DataError> {
        open_workbook(&self.path)
            .map_err(|e| DataError::Workbook(format!("open {}: {e}", self.path.display())))
    }

    fn read_all(&self) -> Result<Vec<SheetContents>, DataError> {
        let mut reader = self.open()?;
        let mut sheets = Vec::new();
        for name in reader.sheet_names() {
            let read_err =
                |e: calamine::XlsxError| DataError::Workbook(format!("read sheet '{name}': {e}"));
            let range = reader.worksheet_range(&name).map_err(read_err)?;
            let formulas = reader.worksheet_formula(&name).map_err(read_err)?;
            let merges = reader
                .worksheet_merge_cells(&name)
                .transpose()
                .map_err(read_err)?
                .unwrap_or_default();
            sheets.push(SheetContents {
                rows: range_to_rows(&range),
                formulas: formula_cells(&formulas),
                merges,
                name,
            });
        }
        Ok(sheets)
    }

    fn write_all(&self, sheets: &[SheetContents], price_sheet: &str) -> Result<(), DataError> {
        let mut book = rust_xlsxwriter::Workbook::new();
        let formats = CellFormats::new();

        for sheet in sheets {
            let worksheet = book.add_worksheet();
            worksheet.set_name(&sheet.name).map_err(xlsx_err)?;
            write_sheet(worksheet, sheet, &formats)?;
            if sheet.name == price_sheet {
                worksheet.set_column_width(0, 12).map_err(xlsx_err)?;
            }
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("xlsx.tmp");
        book.save(&tmp_path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            xlsx_err(e)
        })?;

        // Atomic rename
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::Workbook(format!("atomic rename failed: {e}"))
        })?;
        Ok(())
    }
}

struct CellFormats {
    plain: Format,
    date: Format,
    datetime: Format,
    duration: Format,
}

impl CellFormats {
    fn new() -> Self {
        Self {
            plain: Format::new(),
            date: Format::new().set_num_format(DATE_FORMAT),
            datetime: Format::new().set_num_format(DATETIME_FORMAT),
            duration: Format::new().set_num_format(DURATION_FORMAT),
        }
    }

    /// Number format a cell needs to read back as the same kind of value.
    fn for_cell(&self, cell: &Cell) -> Option<&Format> {
        match cell {
            Cell::DateTime(serial) if serial.fract() == 0.0 => Some(&self.date),
            Cell::DateTime(_) => Some(&self.datetime),
            Cell::Duration(_) => Some(&self.duration),
            _ => None,
        }
    }
}

fn write_sheet(
    worksheet: &mut Worksheet,
    sheet: &SheetContents,
    formats: &CellFormats,
) -> Result<(), DataError> {
    // Merges first: merge_range blanks the whole range, values then overwrite it.
    for merge in &sheet.merges {
        worksheet
            .merge_range(
                merge.start.0,
                merge.start.1 as u16,
                merge.end.0,
                merge.end.1 as u16,
                "",
                &formats.plain,
            )
            .map_err(xlsx_err)?;
    }

    write_rows(worksheet, &sheet.rows, formats)?;

    for (row, col, formula) in &sheet.formulas {
        let cached = sheet
            .rows
            .get(*row as usize)
            .and_then(|cells| cells.get(*col as usize))
            .unwrap_or(&Cell::Empty);
        let formula = Formula::new(formula).set_result(cached.display());
        let (row, col) = (*row, *col as u16);
        let written = match formats.for_cell(cached) {
            Some(format) => worksheet.write_formula_with_format(row, col, formula, format),
            None => worksheet.write_formula(row, col, formula),
        };
        written.map_err(xlsx_err)?;
    }
    Ok(())
}

fn write_rows(
    worksheet: &mut Worksheet,
    rows: &[Vec<Cell>],
    formats: &CellFormats,
) -> Result<(), DataError> {
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let (r, c) = (r as u32, c as u16);
            match cell {
                Cell::Empty => {}
                // Excel has no NaN/inf; leave those cells blank.
                Cell::Number(n) if !n.is_finite() => {}
                Cell::Number(n) => {
                    worksheet.write_number(r, c, *n).map_err(xlsx_err)?;
                }
                Cell::Text(s) | Cell::Error(s) => {
                    worksheet.write_string(r, c, s).map_err(xlsx_err)?;
                }
                Cell::Bool(b) => {
                    worksheet.write_boolean(r, c, *b).map_err(xlsx_err)?;
                }
                Cell::DateTime(serial) | Cell::Duration(serial) => {
                    let format = formats.for_cell(cell).unwrap_or(&formats.plain);
                    worksheet
                        .write_number_with_format(r, c, *serial, format)
                        .map_err(xlsx_err)?;
                }
            }
        }
    }
    Ok(())
}

/// Header plus one row per bar.
fn series_rows(bars: &[PriceBar]) -> Vec<Vec<Cell>> {
    let mut rows = Vec::with_capacity(bars.len() + 1);
    rows.push(
        PRICE_HEADER
            .iter()
            .map(|h| Cell::Text(h.to_string()))
            .collect(),
    );
    for bar in bars {
        rows.push(vec![
            Cell::DateTime(excel_serial(bar.date)),
            Cell::Number(bar.open),
            Cell::Number(bar.high),
            Cell::Number(bar.low),
            Cell::Number(bar.close),
            Cell::Number(bar.volume as f64),
        ]);
    }
    rows
}

/// Convert a calamine range to rows, padding for the range's start offset.
fn range_to_rows(range: &Range<Data>) -> Vec<Vec<Cell>> {
    let Some((row0, col0)) = range.start() else {
        return Vec::new();
    };
    let mut rows: Vec<Vec<Cell>> = (0..row0).map(|_| Vec::new()).collect();
    for row in range.rows() {
        let mut cells: Vec<Cell> = (0..col0).map(|_| Cell::Empty).collect();
        cells.extend(row.iter().map(Cell::from));
        while cells.last().is_some_and(Cell::is_empty) {
            cells.pop();
        }
        rows.push(cells);
    }
    rows
}

/// Non-empty formulas of a calamine formula range, in absolute coordinates.
fn formula_cells(range: &Range<String>) -> Vec<(u32, u32, String)> {
    let Some((row0, col0)) = range.start() else {
        return Vec::new();
    };
    range
        .used_cells()
        .filter(|(_, _, formula)| !formula.is_empty())
        .map(|(r, c, formula)| (row0 + r as u32, col0 + c as u32, formula.clone()))
        .collect()
}

/// Days since the Excel epoch (1899-12-30).
pub fn excel_serial(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).expect("valid epoch");
    (date - epoch).num_days() as f64
}

fn validate_sheet_name(name: &str) -> Result<(), DataError> {
    let invalid = name.is_empty()
        || name.chars().count() > MAX_SHEET_NAME_LEN
        || name.chars().any(|c| FORBIDDEN_SHEET_CHARS.contains(&c))
        || name.starts_with('\'')
        || name.ends_with('\'');
    if invalid {
        return Err(DataError::InvalidSheetName(name.to_string()));
    }
    Ok(())
}

fn xlsx_err(e: rust_xlsxwriter::XlsxError) -> DataError {
    DataError::Workbook(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(n: usize, base: f64) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        (0..n)
            .map(|i| PriceBar {
                date: start + chrono::Duration::days(i as i64),
                open: base + i as f64,
                high: base + i as f64 + 2.0,
                low: base + i as f64 - 1.0,
                close: base + i as f64 + 0.5,
                volume: 1_000_000 + i as u64,
            })
            .collect()
    }

    #[test]
    fn excel_serial_matches_known_dates() {
        assert_eq!(excel_serial(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap()), 32874.0);
        assert_eq!(excel_serial(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()), 45293.0);
    }

    #[test]
    fn sheet_name_validation() {
        assert!(validate_sheet_name("AAPL").is_ok());
        assert!(validate_sheet_name("BRK.B").is_ok());
        assert!(validate_sheet_name("^GSPC").is_ok());
        assert!(validate_sheet_name("").is_err());
        assert!(validate_sheet_name("A/B").is_err());
        assert!(validate_sheet_name(&"X".repeat(32)).is_err());
    }

    #[test]
    fn series_rows_have_header_then_bars() {
        let rows = series_rows(&bars(3, 100.0));
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0][0], Cell::Text("date".into()));
        assert_eq!(rows[0][4], Cell::Text("Close".into()));
        assert_eq!(rows[1][0], Cell::DateTime(45293.0));
        assert_eq!(rows[3][4], Cell::Number(102.5));
    }

    #[test]
    fn create_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let wb = Workbook::new(dir.path().join("prices.xlsx"));
        assert!(!wb.exists());

        let write = wb.upsert_series("aapl", &bars(5, 100.0)).unwrap();
        assert_eq!(write, SheetWrite::Created);
        assert_eq!(wb.sheet_names().unwrap(), vec!["AAPL"]);

        let rows = wb.read_sheet("AAPL").unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[1][0], Cell::DateTime(45293.0));
        assert_eq!(rows[1][5], Cell::Number(1_000_000.0));
    }

    #[test]
    fn replaced_sheet_keeps_its_position() {
        let dir = tempfile::tempdir().unwrap();
        let wb = Workbook::new(dir.path().join("prices.xlsx"));
        wb.upsert_series("MSFT", &bars(3, 300.0)).unwrap();
        wb.upsert_series("AAPL", &bars(3, 100.0)).unwrap();
        wb.upsert_series("GOOGL", &bars(3, 140.0)).unwrap();

        let write = wb.upsert_series("aapl", &bars(2, 200.0)).unwrap();
        assert_eq!(write, SheetWrite::Replaced);
        assert_eq!(wb.sheet_names().unwrap(), vec!["MSFT", "AAPL", "GOOGL"]);
        assert_eq!(wb.read_sheet("AAPL").unwrap().len(), 3);
    }

    #[test]
    fn missing_sheet_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let wb = Workbook::new(dir.path().join("prices.xlsx"));
        wb.upsert_series("MSFT", &bars(1, 300.0)).unwrap();
        assert!(matches!(
            wb.read_sheet("TSLA"),
            Err(DataError::SheetNotFound { sheet, .. }) if sheet == "TSLA"
        ));
    }

    #[test]
    fn dates_from_1904_workbooks_are_rebased() {
        let date_1904 = Data::DateTime(ExcelDateTime::new(
            43831.0,
            ExcelDateTimeType::DateTime,
            true,
        ));
        assert_eq!(Cell::from(&date_1904), Cell::DateTime(45293.0));

        let date_1900 = Data::DateTime(ExcelDateTime::new(
            45293.0,
            ExcelDateTimeType::DateTime,
            false,
        ));
        assert_eq!(Cell::from(&date_1900), Cell::DateTime(45293.0));

        // Durations carry no epoch.
        let duration = Data::DateTime(ExcelDateTime::new(
            1.5,
            ExcelDateTimeType::TimeDelta,
            true,
        ));
        assert_eq!(Cell::from(&duration), Cell::Duration(1.5));
    }

    #[test]
    fn carried_cells_keep_their_kind() {
        let dir = tempfile::tempdir().unwrap();
        let wb = Workbook::new(dir.path().join("prices.xlsx"));
        let rows = vec![
            vec![],
            vec![
                Cell::Empty,
                Cell::Bool(true),
                Cell::Text("note".into()),
                Cell::Error("#DIV/0!".into()),
            ],
            vec![
                Cell::Empty,
                Cell::DateTime(45293.75),
                Cell::Duration(1.25),
                Cell::Number(f64::INFINITY),
                Cell::Number(-3.5),
            ],
        ];
        wb.write_all(&[SheetContents::values("MISC".into(), rows)], "NONE")
            .unwrap();

        let back = wb.read_sheet("MISC").unwrap();
        assert_eq!(back.len(), 3);
        assert!(back[0].is_empty());
        assert_eq!(
            back[1],
            vec![
                Cell::Empty,
                Cell::Bool(true),
                Cell::Text("note".into()),
                // Errors are kept as their text.
                Cell::Text("#DIV/0!".into()),
            ]
        );
        assert_eq!(
            back[2],
            vec![
                Cell::Empty,
                Cell::DateTime(45293.75),
                Cell::Duration(1.25),
                Cell::Empty,
                Cell::Number(-3.5),
            ]
        );
    }

    #[test]
    fn non_finite_values_are_left_blank() {
        let dir = tempfile::tempdir().unwrap();
        let wb = Workbook::new(dir.path().join("prices.xlsx"));
        let mut series = bars(1, 10.0);
        series[0].open = f64::NAN;
        wb.upsert_series("X", &series).unwrap();
        let rows = wb.read_sheet("X").unwrap();
        assert_eq!(rows[1][1], Cell::Empty);
        assert_eq!(rows[1][4], Cell::Number(10.5));
    }
}
