//! Layered configuration: built-in defaults, then an optional TOML file,
//! then command-line overrides applied by the binaries.
//!
//! ```toml
//! workbook = "historical_prices.xlsx"
//!
//! [fetch]
//! tickers_file = "tickers.txt"
//! start_date = "1990-01-01"
//! # end_date = "2024-12-31"   # defaults to today
//! interval = "1d"             # 1d, 1wk or 1mo
//! adjusted = true
//! # timeout_secs = 30         # defaults to the HTTP client's own
//! preview_rows = 5
//!
//! [plot]
//! sheet = "AAPL"
//! ```

use crate::data::{DataError, FetchSettings, Interval};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "tickerbook.toml";
pub const DEFAULT_WORKBOOK: &str = "historical_prices.xlsx";
pub const DEFAULT_TICKERS_FILE: &str = "tickers.txt";
pub const DEFAULT_PLOT_SHEET: &str = "AAPL";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Workbook shared by the fetcher and the plotter.
    pub workbook: PathBuf,
    pub fetch: FetchConfig,
    pub plot: PlotConfig,
}

/// Settings for the download step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub tickers_file: PathBuf,
    /// First day of history (inclusive).
    pub start_date: NaiveDate,
    /// End of history (exclusive); `None` means the day of the run.
    pub end_date: Option<NaiveDate>,
    pub interval: Interval,
    /// Adjust prices for splits and dividends.
    pub adjusted: bool,
    /// HTTP timeout; `None` keeps the client default.
    pub timeout_secs: Option<u64>,
    /// Rows echoed to stdout after each download.
    pub preview_rows: usize,
}

/// Settings for the plotter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlotConfig {
    pub sheet: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workbook: PathBuf::from(DEFAULT_WORKBOOK),
            fetch: FetchConfig::default(),
            plot: PlotConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            tickers_file: PathBuf::from(DEFAULT_TICKERS_FILE),
            start_date: default_start_date(),
            end_date: None,
            interval: Interval::Daily,
            adjusted: true,
            timeout_secs: None,
            preview_rows: 5,
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            sheet: DEFAULT_PLOT_SHEET.to_string(),
        }
    }
}

/// Fixed history floor used when no start date is configured.
pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1990, 1, 1).expect("1990-01-01 is a valid date")
}

impl AppConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DataError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string. Missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self, DataError> {
        toml::from_str(content).map_err(|e| DataError::Config(format!("parse config TOML: {e}")))
    }

    /// Resolve the config for a run.
    ///
    /// An explicit path must exist. Without one, `tickerbook.toml` in the
    /// working directory is used when present, otherwise the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, DataError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let implicit = Path::new(DEFAULT_CONFIG_FILE);
                if implicit.is_file() {
                    log::debug!("using config file {DEFAULT_CONFIG_FILE}");
                    Self::from_file(implicit)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Serialize the config to TOML.
    pub fn to_toml(&self) -> Result<String, DataError> {
        toml::to_string_pretty(self).map_err(|e| DataError::Config(format!("serialize config: {e}")))
    }
}

impl FetchConfig {
    /// Resolve the date range against `today` and validate it.
    pub fn settings(&self, today: NaiveDate) -> Result<FetchSettings, DataError> {
        let end = self.end_date.unwrap_or(today);
        if self.start_date >= end {
            return Err(DataError::Config(format!(
                "start date {} must be before end date {end}",
                self.start_date
            )));
        }
        Ok(FetchSettings {
            start: self.start_date,
            end,
            interval: self.interval,
            adjusted: self.adjusted,
        })
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn defaults_match_original_constants() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.workbook, PathBuf::from("historical_prices.xlsx"));
        assert_eq!(cfg.fetch.tickers_file, PathBuf::from("tickers.txt"));
        assert_eq!(cfg.fetch.start_date, date(1990, 1, 1));
        assert_eq!(cfg.fetch.end_date, None);
        assert_eq!(cfg.fetch.interval, Interval::Daily);
        assert!(cfg.fetch.adjusted);
        assert_eq!(cfg.plot.sheet, "AAPL");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            workbook = "out/prices.xlsx"

            [fetch]
            interval = "1wk"
            end_date = "2020-06-30"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.workbook, PathBuf::from("out/prices.xlsx"));
        assert_eq!(cfg.fetch.interval, Interval::Weekly);
        assert_eq!(cfg.fetch.end_date, Some(date(2020, 6, 30)));
        assert_eq!(cfg.fetch.start_date, date(1990, 1, 1));
        assert_eq!(cfg.plot.sheet, "AAPL");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = AppConfig::from_toml("[fetch]\nstart = \"2020-01-01\"\n").unwrap_err();
        assert!(err.to_string().contains("parse config TOML"));
    }

    #[test]
    fn toml_roundtrip() {
        let mut cfg = AppConfig::default();
        cfg.fetch.timeout_secs = Some(10);
        let parsed = AppConfig::from_toml(&cfg.to_toml().unwrap()).unwrap();
        assert_eq!(cfg, parsed);
    }

    #[test]
    fn settings_default_end_is_today() {
        let today = date(2024, 5, 1);
        let settings = FetchConfig::default().settings(today).unwrap();
        assert_eq!(settings.start, date(1990, 1, 1));
        assert_eq!(settings.end, today);
        assert!(settings.adjusted);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let cfg = FetchConfig {
            start_date: date(2024, 1, 1),
            end_date: Some(date(2023, 1, 1)),
            ..FetchConfig::default()
        };
        assert!(cfg.settings(date(2024, 5, 1)).is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
