//! Tickerbook TUI: terminal chart of one workbook sheet's closing prices.
//!
//! The chart is a ratatui widget (`PriceChart`) so it can be drawn to a test
//! buffer as easily as to the real terminal; `run_interactive` owns the
//! terminal and the quit-key loop.

pub mod app;
pub mod chart;
pub mod theme;

pub use app::run_interactive;
pub use chart::PriceChart;
pub use theme::Theme;
