//! Tickerbook Core: ticker lists, price downloads, and workbook storage.
//!
//! This crate contains everything the binaries share:
//! - Ticker list loading from plain text files
//! - The `DataProvider` trait and the Yahoo Finance implementation
//! - Per-ticker sheet upserts into a single `.xlsx` workbook
//! - The sequential download driver with per-ticker outcomes
//! - Closing-price extraction for the plotter
//! - Layered configuration (defaults, TOML file, CLI overrides)

pub mod config;
pub mod data;

pub use config::AppConfig;
