//! Tickerbook CLI: download price history into a workbook, then inspect it.
//!
//! Commands:
//! - `fetch`: download every ticker in the ticker file into one sheet each
//! - `plot`: show one sheet's closing prices in the terminal
//! - `sheets`: list the sheets in the workbook with their row counts

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tickerbook_core::data::{
    download_tickers, load_closing_series, load_tickers, Interval, StdoutProgress, Workbook,
    YahooProvider,
};
use tickerbook_core::AppConfig;

#[derive(Parser)]
#[command(
    name = "tickerbook",
    about = "Download daily price history into an Excel workbook and plot it"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every ticker in the ticker file into its own workbook sheet.
    Fetch {
        /// Ticker file, one symbol per line. Defaults to tickers.txt.
        #[arg(long)]
        tickers: Option<PathBuf>,

        /// Workbook to write. Defaults to historical_prices.xlsx.
        #[arg(long)]
        workbook: Option<PathBuf>,

        /// Start date (YYYY-MM-DD). Defaults to 1990-01-01.
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,

        /// End date (YYYY-MM-DD), exclusive. Defaults to today.
        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,

        /// Bar interval: 1d, 1wk or 1mo.
        #[arg(long)]
        interval: Option<Interval>,

        /// Store raw prices instead of split/dividend adjusted ones.
        #[arg(long, default_value_t = false)]
        unadjusted: bool,

        /// TOML config file. Defaults to ./tickerbook.toml when present.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Plot the closing prices of one sheet.
    Plot {
        /// Workbook to read. Defaults to historical_prices.xlsx.
        #[arg(long)]
        workbook: Option<PathBuf>,

        /// Sheet (ticker) to plot. Defaults to AAPL.
        #[arg(long)]
        sheet: Option<String>,

        /// TOML config file. Defaults to ./tickerbook.toml when present.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List the sheets in the workbook.
    Sheets {
        /// Workbook to read. Defaults to historical_prices.xlsx.
        #[arg(long)]
        workbook: Option<PathBuf>,

        /// TOML config file. Defaults to ./tickerbook.toml when present.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
struct FetchOverrides {
    tickers: Option<PathBuf>,
    workbook: Option<PathBuf>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    interval: Option<Interval>,
    unadjusted: bool,
}

impl FetchOverrides {
    fn apply(self, config: &mut AppConfig) {
        if let Some(path) = self.tickers {
            config.fetch.tickers_file = path;
        }
        if let Some(path) = self.workbook {
            config.workbook = path;
        }
        if let Some(start) = self.start {
            config.fetch.start_date = start;
        }
        if self.end.is_some() {
            config.fetch.end_date = self.end;
        }
        if let Some(interval) = self.interval {
            config.fetch.interval = interval;
        }
        if self.unadjusted {
            config.fetch.adjusted = false;
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            tickers,
            workbook,
            start,
            end,
            interval,
            unadjusted,
            config,
        } => run_fetch(
            config,
            FetchOverrides {
                tickers,
                workbook,
                start,
                end,
                interval,
                unadjusted,
            },
        ),
        Commands::Plot {
            workbook,
            sheet,
            config,
        } => run_plot(config, workbook, sheet),
        Commands::Sheets { workbook, config } => run_sheets(config, workbook),
    }
}

fn run_fetch(config_path: Option<PathBuf>, overrides: FetchOverrides) -> Result<()> {
    let mut config = AppConfig::load(config_path.as_deref())?;
    overrides.apply(&mut config);

    let settings = config.fetch.settings(chrono::Local::now().date_naive())?;
    let tickers = load_tickers(&config.fetch.tickers_file);
    if tickers.is_empty() {
        println!(
            "Skipping download process. Please ensure '{}' exists and contains tickers.",
            config.fetch.tickers_file.display()
        );
        return Ok(());
    }

    println!("Starting download for {} tickers...", tickers.len());
    let provider = YahooProvider::new(config.fetch.timeout())?;
    let workbook = Workbook::new(config.workbook);
    let progress = StdoutProgress {
        preview_rows: config.fetch.preview_rows,
    };

    let summary = download_tickers(&provider, &workbook, &tickers, &settings, &progress);

    if !summary.all_succeeded() {
        for (symbol, err) in summary.failures() {
            eprintln!("Error for {symbol}: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run_plot(
    config_path: Option<PathBuf>,
    workbook: Option<PathBuf>,
    sheet: Option<String>,
) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let workbook = Workbook::new(workbook.unwrap_or(config.workbook));
    let sheet = sheet.unwrap_or(config.plot.sheet);

    if !workbook.exists() {
        bail!(
            "workbook {} not found; run `tickerbook fetch` first",
            workbook.path().display()
        );
    }

    let series = load_closing_series(&workbook, &sheet)?;
    log::info!("loaded {} points from sheet '{sheet}'", series.points.len());
    tickerbook_tui::run_interactive(&series)
}

fn run_sheets(config_path: Option<PathBuf>, workbook: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let workbook = Workbook::new(workbook.unwrap_or(config.workbook));

    if !workbook.exists() {
        println!("No workbook at {}.", workbook.path().display());
        return Ok(());
    }

    let names = workbook.sheet_names()?;
    println!("=== {} ===", workbook.path().display());
    println!("Sheets: {}", names.len());
    for name in &names {
        let rows = workbook.read_sheet(name)?;
        println!("  {:<10} {} rows", name, rows.len().saturating_sub(1));
    }
    Ok(())
}
