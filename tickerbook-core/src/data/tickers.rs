//! Ticker list loading.
//!
//! The list is a plain UTF-8 text file with one symbol per line. Surrounding
//! whitespace is trimmed and blank lines are skipped; order is preserved and
//! duplicates are kept.

use super::provider::DataError;
use std::io::ErrorKind;
use std::path::Path;

/// Parse ticker symbols from in-memory text.
pub fn parse_tickers(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Read ticker symbols from a file, failing if it cannot be read.
pub fn read_tickers(path: &Path) -> Result<Vec<String>, DataError> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DataError::TickerFile(format!("{} was not found", path.display())),
        _ => DataError::TickerFile(format!("could not read {}: {e}", path.display())),
    })?;
    Ok(parse_tickers(&content))
}

/// Load ticker symbols from a file.
///
/// A missing or unreadable file is reported and yields an empty list, which
/// callers treat as "nothing to do".
pub fn load_tickers(path: &Path) -> Vec<String> {
    log::info!("reading tickers from {}", path.display());
    match read_tickers(path) {
        Ok(tickers) => {
            log::debug!("loaded {} tickers from {}", tickers.len(), path.display());
            tickers
        }
        Err(e) => {
            log::warn!("{e}");
            Vec::new()
        }
    }
}
