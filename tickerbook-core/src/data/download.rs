//! Download orchestrator: fetches each ticker in order and upserts its sheet.
//!
//! Every ticker ends in exactly one `TickerOutcome`; a failure is recorded and
//! the loop moves on, so one bad symbol never aborts the batch.

use super::provider::{DataError, DataProvider, FetchRequest, Interval, PriceBar};
use super::workbook::{SheetWrite, Workbook};
use chrono::NaiveDate;

/// Date range and sampling options shared by every ticker in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub interval: Interval,
    pub adjusted: bool,
}

impl FetchSettings {
    fn request(&self, symbol: &str) -> FetchRequest {
        FetchRequest {
            symbol: symbol.to_string(),
            start: self.start,
            end: self.end,
            interval: self.interval,
            adjusted: self.adjusted,
        }
    }
}

/// Result of processing a single ticker.
#[derive(Debug)]
pub enum TickerOutcome {
    /// Data was fetched and written to `sheet`.
    Saved {
        symbol: String,
        sheet: String,
        rows: usize,
        write: SheetWrite,
    },
    /// The provider had no data; the workbook was not touched.
    Empty { symbol: String },
    /// Fetching or saving failed.
    Failed { symbol: String, error: DataError },
}

impl TickerOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            TickerOutcome::Saved { symbol, .. }
            | TickerOutcome::Empty { symbol }
            | TickerOutcome::Failed { symbol, .. } => symbol,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TickerOutcome::Failed { .. })
    }
}

/// Progress callback for multi-ticker downloads.
pub trait DownloadProgress {
    /// Called before a ticker is fetched.
    fn on_start(&self, symbol: &str, index: usize, total: usize, settings: &FetchSettings);

    /// Called with the fetched bars before they are written.
    fn on_fetched(&self, _symbol: &str, _bars: &[PriceBar]) {}

    /// Called when a ticker is finished, whatever the outcome.
    fn on_complete(&self, index: usize, total: usize, outcome: &TickerOutcome);

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, summary: &DownloadSummary);
}

/// Progress reporter that prints to stdout.
pub struct StdoutProgress {
    /// Number of leading rows to echo after each fetch (0 disables).
    pub preview_rows: usize,
}

impl Default for StdoutProgress {
    fn default() -> Self {
        Self { preview_rows: 5 }
    }
}

impl DownloadProgress for StdoutProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize, settings: &FetchSettings) {
        println!("[{}/{}] --- Starting download for {symbol} ---", index + 1, total);
        println!(
            "Date Range: {} to {}, Interval: {}",
            settings.start, settings.end, settings.interval
        );
    }

    fn on_fetched(&self, _symbol: &str, bars: &[PriceBar]) {
        if self.preview_rows == 0 || bars.is_empty() {
            return;
        }
        println!(
            "{:<12} {:>12} {:>12} {:>12} {:>12} {:>14}",
            "date", "Open", "High", "Low", "Close", "Volume"
        );
        for bar in bars.iter().take(self.preview_rows) {
            println!(
                "{:<12} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>14}",
                bar.date.to_string(),
                bar.open,
                bar.high,
                bar.low,
                bar.close,
                bar.volume
            );
        }
    }

    fn on_complete(&self, _index: usize, _total: usize, outcome: &TickerOutcome) {
        match outcome {
            TickerOutcome::Saved {
                sheet, rows, write, ..
            } => {
                let action = match write {
                    SheetWrite::Created => "created workbook with",
                    SheetWrite::Added => "added",
                    SheetWrite::Replaced => "replaced",
                };
                println!("  OK: {action} sheet '{sheet}' ({rows} rows)");
            }
            TickerOutcome::Empty { symbol } => {
                println!("  SKIP: no data found for '{symbol}' in the specified range");
            }
            TickerOutcome::Failed { symbol, error } => {
                println!("  FAIL: {symbol}: {error}");
            }
        }
        println!("{}", "-".repeat(40));
    }

    fn on_batch_complete(&self, summary: &DownloadSummary) {
        println!(
            "\nDownload complete: {}/{} saved, {} empty, {} failed",
            summary.saved(),
            summary.total,
            summary.empty(),
            summary.failed()
        );
    }
}

/// Download every ticker in order, writing one sheet per ticker.
///
/// Returns the outcome of every ticker; never aborts early.
pub fn download_tickers(
    provider: &dyn DataProvider,
    workbook: &Workbook,
    tickers: &[String],
    settings: &FetchSettings,
    progress: &dyn DownloadProgress,
) -> DownloadSummary {
    let total = tickers.len();
    let mut outcomes = Vec::with_capacity(total);

    for (i, symbol) in tickers.iter().enumerate() {
        progress.on_start(symbol, i, total, settings);
        let outcome = download_single(provider, workbook, symbol, settings, progress);
        if let TickerOutcome::Failed { error, .. } = &outcome {
            log::warn!("{symbol}: {error}");
        }
        progress.on_complete(i, total, &outcome);
        outcomes.push(outcome);
    }

    let summary = DownloadSummary { total, outcomes };
    progress.on_batch_complete(&summary);
    summary
}

/// Download a single ticker: fetch → upsert.
fn download_single(
    provider: &dyn DataProvider,
    workbook: &Workbook,
    symbol: &str,
    settings: &FetchSettings,
    progress: &dyn DownloadProgress,
) -> TickerOutcome {
    let bars = match provider.fetch(&settings.request(symbol)) {
        Ok(bars) if bars.is_empty() => {
            return TickerOutcome::Empty {
                symbol: symbol.to_string(),
            }
        }
        Ok(bars) => bars,
        Err(DataError::SymbolNotFound { .. }) => {
            return TickerOutcome::Empty {
                symbol: symbol.to_string(),
            }
        }
        Err(error) => {
            return TickerOutcome::Failed {
                symbol: symbol.to_string(),
                error,
            }
        }
    };

    progress.on_fetched(symbol, &bars);

    match workbook.upsert_series(symbol, &bars) {
        Ok(write) => TickerOutcome::Saved {
            symbol: symbol.to_string(),
            sheet: symbol.trim().to_uppercase(),
            rows: bars.len(),
            write,
        },
        Err(error) => TickerOutcome::Failed {
            symbol: symbol.to_string(),
            error,
        },
    }
}

/// Summary of a batch download operation.
#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    /// One outcome per ticker, in input order.
    pub outcomes: Vec<TickerOutcome>,
}

impl DownloadSummary {
    pub fn saved(&self) -> usize {
        self.count(|o| matches!(o, TickerOutcome::Saved { .. }))
    }

    pub fn empty(&self) -> usize {
        self.count(|o| matches!(o, TickerOutcome::Empty { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(TickerOutcome::is_failure)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &DataError)> {
        self.outcomes.iter().filter_map(|o| match o {
            TickerOutcome::Failed { symbol, error } => Some((symbol.as_str(), error)),
            _ => None,
        })
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&TickerOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}
