use crate::symbol::Symbol;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single row of the base table: one symbol's close and volume on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    /// Ticker symbol
    pub symbol: Symbol,
    /// Trading date
    pub date: NaiveDate,
    /// Closing price
    pub close: f64,
    /// Traded volume
    pub volume: u64,
}

impl StockRecord {
    /// Creates a new StockRecord.
    pub fn new(symbol: Symbol, date: NaiveDate, close: f64, volume: u64) -> Self {
        StockRecord {
            symbol,
            date,
            close,
            volume,
        }
    }

    /// Market value traded on this row (`close * volume`).
    pub fn traded_value(&self) -> f64 {
        self.close * self.volume as f64
    }
}

/// Date range for filtering (inclusive on both ends).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// Start date (inclusive)
    pub start: NaiveDate,
    /// End date (inclusive)
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a new DateRange without validation.
    ///
    /// Use [`DateRange::try_new`] for ranges coming from user input.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    /// Creates a DateRange, rejecting `start > end`.
    pub fn try_new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        if start > end {
            None
        } else {
            Some(DateRange { start, end })
        }
    }

    /// Whether `date` falls inside the range, both ends inclusive.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..={}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Source of the base table.
///
/// The dashboard loads its dataset exactly once at startup; implementations
/// either produce every record or fail with a [`DataLoadError`]. There is no
/// partial load.
pub trait DataProvider {
    /// Loads all stock records in their native row order.
    fn load_records(&self) -> Result<Vec<StockRecord>, DataLoadError>;
}

/// Errors that can occur while loading the base dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLoadError {
    /// The source file does not exist
    NotFound { source: String },
    /// The source could not be read
    Unreadable { source: String, message: String },
    /// The header lacks one of the required columns
    MissingColumn { source: String, column: String },
    /// A data row could not be parsed
    InvalidRow {
        source: String,
        row: usize,
        message: String,
    },
    /// The source contained a header but no data rows
    Empty { source: String },
}

impl fmt::Display for DataLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataLoadError::NotFound { source } => write!(f, "Data file not found: {}", source),
            DataLoadError::Unreadable { source, message } => {
                write!(f, "Failed to read {}: {}", source, message)
            }
            DataLoadError::MissingColumn { source, column } => {
                write!(f, "{} is missing required column '{}'", source, column)
            }
            DataLoadError::InvalidRow {
                source,
                row,
                message,
            } => write!(f, "{} row {}: {}", source, row, message),
            DataLoadError::Empty { source } => write!(f, "{} contains no data rows", source),
        }
    }
}

impl std::error::Error for DataLoadError {}

/// In-memory data provider, mainly for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataProvider {
    records: Vec<StockRecord>,
}

impl InMemoryDataProvider {
    /// Creates a new empty in-memory data provider.
    pub fn new() -> Self {
        InMemoryDataProvider {
            records: Vec::new(),
        }
    }

    /// Creates a provider holding the given records.
    pub fn with_records(records: Vec<StockRecord>) -> Self {
        InMemoryDataProvider { records }
    }

    /// Appends one record, preserving insertion order.
    pub fn push(&mut self, record: StockRecord) {
        self.records.push(record);
    }
}

impl DataProvider for InMemoryDataProvider {
    fn load_records(&self) -> Result<Vec<StockRecord>, DataLoadError> {
        if self.records.is_empty() {
            return Err(DataLoadError::Empty {
                source: "in-memory provider".to_string(),
            });
        }
        Ok(self.records.clone())
    }
}
