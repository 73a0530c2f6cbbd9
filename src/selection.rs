//! Selection State
//!
//! The only mutable entity of a dashboard session: the active date range and
//! the set of visible symbols. Every accepted mutation bumps `version`; a
//! rejected mutation leaves the state, version included, untouched.

use crate::analytics::MetricsTable;
use crate::symbol::Symbol;
use crate::time_series::DateRange;
use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Number of symbols active when a session starts.
pub const DEFAULT_TOP_N: usize = 5;

/// Returns the `n` symbols with the highest average traded value.
///
/// Sorted descending by value; ties are broken by symbol name ascending so the
/// result is deterministic. Returns fewer than `n` symbols when the dataset
/// has fewer.
pub fn initial_top_n(table: &MetricsTable, n: usize) -> Vec<Symbol> {
    // avg_value is already constant per symbol; re-averaging keeps this
    // correct for any table whose broadcast column is not.
    let mut totals: HashMap<&Symbol, (f64, usize)> = HashMap::new();
    for row in table.rows() {
        let entry = totals.entry(&row.record.symbol).or_insert((0.0, 0));
        entry.0 += row.avg_value;
        entry.1 += 1;
    }

    let mut ranked: Vec<(&Symbol, f64)> = totals
        .into_iter()
        .map(|(symbol, (sum, count))| (symbol, sum / count as f64))
        .collect();
    ranked.sort_by(|a, b| {
        OrderedFloat(b.1)
            .cmp(&OrderedFloat(a.1))
            .then_with(|| a.0.cmp(b.0))
    });

    ranked
        .into_iter()
        .take(n)
        .map(|(symbol, _)| symbol.clone())
        .collect()
}

/// Errors raised by rejected selection updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// `start` is after `end`
    InvalidRange { start: NaiveDate, end: NaiveDate },
    /// The symbol does not occur in the dataset
    UnknownSymbol(Symbol),
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionError::InvalidRange { start, end } => write!(
                f,
                "Invalid date range: start {} is after end {}",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            ),
            SelectionError::UnknownSymbol(symbol) => write!(f, "Unknown symbol: {}", symbol),
        }
    }
}

impl std::error::Error for SelectionError {}

/// Current filter state of one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionState {
    date_range: DateRange,
    active_symbols: BTreeSet<Symbol>,
    version: u64,
    #[serde(skip)]
    universe: Option<Arc<BTreeSet<Symbol>>>,
}

impl SelectionState {
    /// Creates a state with an explicit range and active set.
    ///
    /// No symbol validation is performed on toggles.
    pub fn new(date_range: DateRange, active_symbols: impl IntoIterator<Item = Symbol>) -> Self {
        SelectionState {
            date_range,
            active_symbols: active_symbols.into_iter().collect(),
            version: 0,
            universe: None,
        }
    }

    /// Creates the default state for a dataset: the full date span and the
    /// top `n` symbols by average value. Toggles are validated against the
    /// dataset's symbols.
    ///
    /// Returns `None` for an empty table, which has no date span.
    pub fn for_table(table: &MetricsTable, n: usize) -> Option<Self> {
        let date_range = table.date_bounds()?;
        let universe: BTreeSet<Symbol> = table.symbols().into_iter().collect();
        Some(SelectionState {
            date_range,
            active_symbols: initial_top_n(table, n).into_iter().collect(),
            version: 0,
            universe: Some(Arc::new(universe)),
        })
    }

    pub fn date_range(&self) -> DateRange {
        self.date_range
    }

    pub fn active_symbols(&self) -> &BTreeSet<Symbol> {
        &self.active_symbols
    }

    pub fn is_active(&self, symbol: &Symbol) -> bool {
        self.active_symbols.contains(symbol)
    }

    /// Monotonic counter of accepted mutations.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn ensure_known(&self, symbol: &Symbol) -> Result<(), SelectionError> {
        match &self.universe {
            Some(universe) if !universe.contains(symbol) => {
                Err(SelectionError::UnknownSymbol(symbol.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Flips membership of `symbol`; returns whether it is now active.
    pub fn toggle(&mut self, symbol: &Symbol) -> Result<bool, SelectionError> {
        self.ensure_known(symbol)?;

        let now_active = if self.active_symbols.remove(symbol) {
            false
        } else {
            self.active_symbols.insert(symbol.clone());
            true
        };
        self.version += 1;
        Ok(now_active)
    }

    /// Replaces the date range.
    pub fn set_date_range(&mut self, start: NaiveDate, end: NaiveDate) -> Result<(), SelectionError> {
        let range =
            DateRange::try_new(start, end).ok_or(SelectionError::InvalidRange { start, end })?;
        self.date_range = range;
        self.version += 1;
        Ok(())
    }

    /// Replaces the whole active set at once.
    ///
    /// Every symbol is validated before anything changes.
    pub fn set_active<I>(&mut self, symbols: I) -> Result<(), SelectionError>
    where
        I: IntoIterator<Item = Symbol>,
    {
        let symbols: BTreeSet<Symbol> = symbols.into_iter().collect();
        for symbol in &symbols {
            self.ensure_known(symbol)?;
        }
        self.active_symbols = symbols;
        self.version += 1;
        Ok(())
    }

    /// Activates every symbol of the universe.
    ///
    /// Returns `false` without touching the state, version included, when
    /// there is no universe to select from.
    pub fn select_all(&mut self) -> bool {
        match &self.universe {
            Some(universe) => {
                self.active_symbols = universe.as_ref().clone();
                self.version += 1;
                true
            }
            None => false,
        }
    }

    /// Deactivates every symbol.
    pub fn clear(&mut self) {
        self.active_symbols.clear();
        self.version += 1;
    }
}
