//! Standalone plotter: `tickerbook-plot [--workbook PATH] [--sheet NAME]`.
//!
//! Loads one sheet of the price workbook and shows its closing prices until
//! `q` or `Esc` is pressed.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tickerbook_core::data::{load_closing_series, Workbook};
use tickerbook_core::AppConfig;

#[derive(Parser)]
#[command(
    name = "tickerbook-plot",
    about = "Plot the closing prices of one workbook sheet in the terminal"
)]
struct Args {
    /// Workbook to read. Defaults to historical_prices.xlsx.
    #[arg(long)]
    workbook: Option<PathBuf>,

    /// Sheet (ticker) to plot. Defaults to AAPL.
    #[arg(long)]
    sheet: Option<String>,

    /// TOML config file. Defaults to ./tickerbook.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let config = AppConfig::load(args.config.as_deref())?;
    let workbook = Workbook::new(args.workbook.unwrap_or(config.workbook));
    let sheet = args.sheet.unwrap_or(config.plot.sheet);

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
