use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use super::error::DataError;
use crate::core::PriceSeries;

const STOCK_DATA_DIR: &str = "stock_data";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// Contents of `stock_data/<SYMBOL>.json`. Only `prices` is required.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StockDataFile {
    pub symbol: Option<String>,
    pub ipo_date: Option<NaiveDate>,
    pub last_updated: Option<String>,
    pub data_source: Option<String>,
    pub total_records: Option<usize>,
    pub date_range: Option<DateRange>,
    pub prices: PriceSeries,
}

impl StockDataFile {
    pub fn from_json(json: &str, symbol: &str) -> Result<Self, DataError> {
        serde_json::from_str(json).map_err(|source| DataError::Json {
            context: format!("price data for {symbol}"),
            source,
        })
    }
}

/// Reads per-symbol price documents below `<data_dir>/stock_data`.
#[derive(Debug, Clone)]
pub struct PriceStore {
    root: PathBuf,
}

impl PriceStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            root: data_dir.as_ref().join(STOCK_DATA_DIR),
        }
    }

    pub fn path_for(&self, symbol: &str) -> Result<PathBuf, DataError> {
        if !is_valid_symbol(symbol) {
            return Err(DataError::InvalidSymbol(symbol.to_string()));
        }
        Ok(self.root.join(format!("{symbol}.json")))
    }

    pub async fn load(&self, symbol: &str) -> Result<StockDataFile, DataError> {
        let path = self.path_for(symbol)?;
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(DataError::MissingPrices(symbol.to_string()));
            }
            Err(source) => return Err(DataError::Io { path, source }),
        };

        let data = StockDataFile::from_json(&json, symbol)?;
        debug!(
            symbol,
            records = data.prices.len(),
            first = ?data.prices.first_date(),
            last = ?data.prices.last_date(),
            "loaded price series"
        );
        Ok(data)
    }
}

fn is_valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty()
        && !symbol.starts_with('.')
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_store() -> PriceStore {
        PriceStore::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures"))
    }

    #[tokio::test]
    async fn loads_full_document_with_metadata() {
        let data = fixture_store().load("2330").await.expect("fixture loads");
        assert_eq!(data.symbol.as_deref(), Some("2330"));
        assert_eq!(data.data_source.as_deref(), Some("yfinance_max_period"));
        assert_eq!(data.total_records, Some(data.prices.len()));
        assert_eq!(
            data.prices.first_date(),
            NaiveDate::from_ymd_opt(2024, 1, 2)
        );
    }

    #[tokio::test]
    async fn loads_document_with_prices_only() {
        let data = fixture_store().load("2317").await.expect("fixture loads");
        assert_eq!(data.symbol, None);
        assert_eq!(data.prices.len(), 3);
    }

    #[tokio::test]
    async fn missing_file_is_reported_per_symbol() {
        let err = fixture_store().load("2454").await.expect_err("no file for 2454");
        assert!(matches!(err, DataError::MissingPrices(symbol) if symbol == "2454"));
    }

    #[test]
    fn symbols_cannot_escape_the_data_directory() {
        let store = fixture_store();
        for symbol in ["", "../companies", "..", "a/b", "a\\b", "2330 "] {
            assert!(
                matches!(store.path_for(symbol), Err(DataError::InvalidSymbol(_))),
                "symbol {symbol:?} should be rejected"
            );
        }
        assert!(store.path_for("BRK-B").is_ok());
        assert!(store.path_for("0050.TW").is_ok());
    }

    #[test]
    fn malformed_price_keys_fail_to_parse() {
        let err = StockDataFile::from_json(r#"{"prices": {"2024/01/02": 10.0}}"#, "2330")
            .expect_err("slash dates are not ISO");
        assert!(err.to_string().contains("price data for 2330"));
    }
}
