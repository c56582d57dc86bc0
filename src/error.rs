//! Error types shared by the engine and its collaborators.

use chrono::NaiveDate;
use thiserror::Error;

/// Failures raised by the tax parcel engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaxError {
    /// A sell draws more shares than the open parcels hold at that date.
    #[error("insufficient parcels for {symbol} on {date}: selling {requested}, only {available} held")]
    InsufficientParcels {
        symbol: String,
        date: NaiveDate,
        requested: u64,
        available: u64,
    },
    /// Rejected at the engine boundary before any processing.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Errors reading `config.yaml`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unable to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors from the SQLite ledger store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },
    #[error("{field} {value} does not fit in the database")]
    OutOfRange { field: &'static str, value: String },
}

/// Errors importing a transaction statement.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: {reason}")]
    Row { row: usize, reason: String },
}

/// Errors talking to a quote source.
#[derive(Error, Debug)]
pub enum PriceError {
    #[error("no api key configured for {0}")]
    MissingApiKey(&'static str),
    #[error("daily api budget of {0} calls exhausted")]
    BudgetExhausted(u32),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("failed to parse response: {0}")]
    ParseFailed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
