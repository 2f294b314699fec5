use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown symbol '{0}'")]
    UnknownSymbol(String),

    #[error("invalid symbol '{0}'")]
    InvalidSymbol(String),

    #[error("no price data stored for {0}")]
    MissingPrices(String),

    #[error("company {symbol} is missing required fields: {}", missing.join(", "))]
    IncompleteCompany {
        symbol: String,
        missing: Vec<&'static str>,
    },

    #[error("{symbol} was listed on {ipo_date}; the start date cannot be earlier")]
    BeforeListing { symbol: String, ipo_date: NaiveDate },
}
