use serde::{Deserialize, Serialize};
use std::fmt;

/// Ticker symbol identifying a single stock.
///
/// Symbols are validated on construction: they must be non-empty and may only
/// contain alphanumeric characters, dots, hyphens, underscores, and carets
/// (index tickers such as `^GSPC`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Creates a new symbol from a ticker string.
    ///
    /// Surrounding whitespace is trimmed before validation.
    ///
    /// # Errors
    /// Returns an error if the ticker is empty or contains invalid characters.
    pub fn new(ticker: impl Into<String>) -> Result<Self, SymbolError> {
        let ticker = ticker.into();
        let trimmed = ticker.trim();
        Self::validate(trimmed)?;
        if trimmed.len() == ticker.len() {
            Ok(Symbol(ticker))
        } else {
            Ok(Symbol(trimmed.to_string()))
        }
    }

    fn validate(ticker: &str) -> Result<(), SymbolError> {
        if ticker.is_empty() {
            return Err(SymbolError::Empty);
        }

        if !ticker
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | '^'))
        {
            return Err(SymbolError::InvalidCharacters(ticker.to_string()));
        }

        Ok(())
    }

    /// Returns the ticker as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Symbol::new(value)
    }
}

impl TryFrom<&str> for Symbol {
    type Error = SymbolError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Symbol::new(value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

/// Errors that can occur when validating a ticker symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    /// The ticker is empty (or only whitespace)
    Empty,
    /// The ticker contains characters outside the allowed set
    InvalidCharacters(String),
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolError::Empty => write!(f, "Symbol cannot be empty"),
            SymbolError::InvalidCharacters(ticker) => {
                write!(f, "Symbol '{}' contains invalid characters", ticker)
            }
        }
    }
}

impl std::error::Error for SymbolError {}
