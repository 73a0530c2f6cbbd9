//! Metrics Engine
//!
//! Computes the per-symbol derived columns (percentage return, whole-history
//! volatility, average traded value) once over the base table. The result is
//! immutable and shared by every session and every view; filtering never
//! recomputes these columns.

pub mod calculators;
pub mod primitives;

use crate::analytics::calculators::{
    returns_series, PercentReturnAnalytic, SampleStdDevVolatility, VolatilityAnalytic,
};
use crate::analytics::primitives::{mean, present_values};
use crate::symbol::Symbol;
use crate::time_series::{DateRange, StockRecord};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Order in which consecutive rows of a symbol are differenced for returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnOrdering {
    /// The dataset's native row order within each symbol
    #[default]
    RowOrder,
    /// Rows of each symbol stably sorted by date first
    Chronological,
}

impl ReturnOrdering {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "row" | "row_order" | "native" => Some(ReturnOrdering::RowOrder),
            "chronological" | "date" | "sorted" => Some(ReturnOrdering::Chronological),
            _ => None,
        }
    }
}

/// A base row with its derived columns attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRow {
    #[serde(flatten)]
    pub record: StockRecord,
    /// Percent change versus the symbol's previous row, `None` on its first row
    pub return_pct: Option<f64>,
    /// Whole-history sample std-dev of the symbol's returns
    pub volatility: Option<f64>,
    /// Whole-history mean of `close * volume` for the symbol
    pub avg_value: f64,
}

/// Whole-history statistics of one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolMetrics {
    pub symbol: Symbol,
    pub rows: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub volatility: Option<f64>,
    pub avg_value: f64,
}

/// The base table plus derived columns, in input row order.
///
/// Cloning is cheap: rows and per-symbol summaries are shared.
#[derive(Debug, Clone)]
pub struct MetricsTable {
    rows: Arc<[DerivedRow]>,
    symbols: Arc<[SymbolMetrics]>,
}

impl MetricsTable {
    /// All rows in input order.
    pub fn rows(&self) -> &[DerivedRow] {
        &self.rows
    }

    /// Shared handle to the rows, for views that index into them.
    pub fn shared_rows(&self) -> Arc<[DerivedRow]> {
        Arc::clone(&self.rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct symbols in order of first appearance.
    pub fn symbols(&self) -> Vec<Symbol> {
        self.symbols.iter().map(|m| m.symbol.clone()).collect()
    }

    /// Whether `symbol` occurs anywhere in the dataset.
    pub fn contains_symbol(&self, symbol: &Symbol) -> bool {
        self.symbols.iter().any(|m| &m.symbol == symbol)
    }

    /// Per-symbol whole-history statistics in order of first appearance.
    pub fn symbol_metrics(&self) -> &[SymbolMetrics] {
        &self.symbols
    }

    /// Statistics of a single symbol.
    pub fn metrics_for(&self, symbol: &Symbol) -> Option<&SymbolMetrics> {
        self.symbols.iter().find(|m| &m.symbol == symbol)
    }

    /// Earliest and latest dates in the dataset, `None` when empty.
    pub fn date_bounds(&self) -> Option<DateRange> {
        let start = self.rows.iter().map(|row| row.record.date).min()?;
        let end = self.rows.iter().map(|row| row.record.date).max()?;
        Some(DateRange::new(start, end))
    }
}

struct GroupResult {
    returns: Vec<(usize, Option<f64>)>,
    metrics: SymbolMetrics,
}

fn compute_group(
    records: &[StockRecord],
    symbol: &Symbol,
    indices: &[usize],
    ordering: ReturnOrdering,
) -> GroupResult {
    let mut ordered = indices.to_vec();
    if ordering == ReturnOrdering::Chronological {
        ordered.sort_by_key(|&index| records[index].date);
    }

    let closes: Vec<f64> = ordered.iter().map(|&index| records[index].close).collect();
    let returns = returns_series(&PercentReturnAnalytic, &closes);
    let volatility = SampleStdDevVolatility.compute(&present_values(returns.iter().copied()));

    let traded: Vec<f64> = indices
        .iter()
        .map(|&index| records[index].traded_value())
        .collect();
    // Groups are never empty, so the mean always exists.
    let avg_value = mean(&traded).unwrap_or(0.0);

    let dates = indices.iter().map(|&index| records[index].date);
    let first_date = dates.clone().min().unwrap_or_default();
    let last_date = dates.max().unwrap_or_default();

    GroupResult {
        returns: ordered.into_iter().zip(returns).collect(),
        metrics: SymbolMetrics {
            symbol: symbol.clone(),
            rows: indices.len(),
            first_date,
            last_date,
            volatility,
            avg_value,
        },
    }
}

/// Computes derived columns for every row of the base table.
///
/// Rows are partitioned by symbol preserving their intra-group order. The
/// output has exactly one row per input row, in input order.
pub fn compute_derived(records: Vec<StockRecord>, ordering: ReturnOrdering) -> MetricsTable {
    let mut group_of: HashMap<Symbol, usize> = HashMap::new();
    let mut groups: Vec<(Symbol, Vec<usize>)> = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let group = *group_of.entry(record.symbol.clone()).or_insert_with(|| {
            groups.push((record.symbol.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[group].1.push(index);
    }

    let results: Vec<GroupResult> = groups
        .par_iter()
        .map(|(symbol, indices)| compute_group(&records, symbol, indices, ordering))
        .collect();

    let mut return_pct: Vec<Option<f64>> = vec![None; records.len()];
    let mut group_stats: Vec<(Option<f64>, f64)> = vec![(None, 0.0); records.len()];
    for result in &results {
        for &(index, value) in &result.returns {
            return_pct[index] = value;
            group_stats[index] = (result.metrics.volatility, result.metrics.avg_value);
        }
    }

    let rows: Vec<DerivedRow> = records
        .into_iter()
        .zip(return_pct.into_iter().zip(group_stats))
        .map(|(record, (return_pct, (volatility, avg_value)))| DerivedRow {
            record,
            return_pct,
            volatility,
            avg_value,
        })
        .collect();

    debug!(
        rows = rows.len(),
        symbols = results.len(),
        ?ordering,
        "Computed derived metrics"
    );

    MetricsTable {
        rows: rows.into(),
        symbols: results
            .into_iter()
            .map(|result| result.metrics)
            .collect::<Vec<_>>()
            .into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn record(symbol: &str, day: u32, close: f64, volume: u64) -> StockRecord {
        StockRecord::new(Symbol::new(symbol).unwrap(), date(day), close, volume)
    }

    fn scenario() -> Vec<StockRecord> {
        vec![
            record("A", 1, 10.0, 100),
            record("B", 1, 50.0, 10),
            record("A", 2, 11.0, 100),
            record("B", 2, 55.0, 10),
            record("A", 3, 9.0, 100),
            record("C", 3, 7.0, 1),
        ]
    }

    #[test]
    fn test_output_preserves_row_count_and_order() {
        let input = scenario();
        let table = compute_derived(input.clone(), ReturnOrdering::RowOrder);
        assert_eq!(table.len(), input.len());
        for (row, original) in table.rows().iter().zip(&input) {
            assert_eq!(&row.record, original);
        }
    }

    #[test]
    fn test_returns_per_symbol() {
        let table = compute_derived(scenario(), ReturnOrdering::RowOrder);
        let a: Vec<Option<f64>> = table
            .rows()
            .iter()
            .filter(|row| row.record.symbol.as_str() == "A")
            .map(|row| row.return_pct)
            .collect();
        assert_eq!(a[0], None);
        assert!((a[1].unwrap() - 10.0).abs() < 1e-9);
        assert!((a[2].unwrap() - (-18.181818181818183)).abs() < 1e-9);

        let c = table
            .rows()
            .iter()
            .find(|row| row.record.symbol.as_str() == "C")
            .unwrap();
        assert_eq!(c.return_pct, None);
    }

    #[test]
    fn test_avg_value_and_volatility_broadcast() {
        let table = compute_derived(scenario(), ReturnOrdering::RowOrder);
        let a_rows: Vec<&DerivedRow> = table
            .rows()
            .iter()
            .filter(|row| row.record.symbol.as_str() == "A")
            .collect();
        for row in &a_rows {
            assert!((row.avg_value - 1000.0).abs() < 1e-9);
            assert_eq!(row.volatility, a_rows[0].volatility);
        }

        let expected = crate::analytics::primitives::sample_std_dev(&[
            10.000000000000002,
            -18.181818181818183,
        ])
        .unwrap();
        assert!((a_rows[0].volatility.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_single_return_has_no_volatility() {
        let table = compute_derived(scenario(), ReturnOrdering::RowOrder);
        let b = table.metrics_for(&Symbol::new("B").unwrap()).unwrap();
        assert_eq!(b.volatility, None);
        let c = table.metrics_for(&Symbol::new("C").unwrap()).unwrap();
        assert_eq!(c.volatility, None);
        assert!((c.avg_value - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_close_yields_null_return() {
        let records = vec![
            record("Z", 1, 10.0, 1),
            record("Z", 2, 0.0, 1),
            record("Z", 3, 4.0, 1),
        ];
        let table = compute_derived(records, ReturnOrdering::RowOrder);
        assert!((table.rows()[1].return_pct.unwrap() + 100.0).abs() < 1e-12);
        assert_eq!(table.rows()[2].return_pct, None);
    }

    #[test]
    fn test_row_order_versus_chronological() {
        // Rows out of date order: day 3 appears before day 2.
        let records = vec![
            record("A", 1, 10.0, 1),
            record("A", 3, 12.0, 1),
            record("A", 2, 11.0, 1),
        ];

        let native = compute_derived(records.clone(), ReturnOrdering::RowOrder);
        assert!((native.rows()[1].return_pct.unwrap() - 20.0).abs() < 1e-9);
        let expected = (11.0 - 12.0) / 12.0 * 100.0;
        assert!((native.rows()[2].return_pct.unwrap() - expected).abs() < 1e-9);

        let sorted = compute_derived(records, ReturnOrdering::Chronological);
        assert_eq!(sorted.rows()[0].return_pct, None);
        let day3 = (12.0 - 11.0) / 11.0 * 100.0;
        assert!((sorted.rows()[1].return_pct.unwrap() - day3).abs() < 1e-9);
        assert!((sorted.rows()[2].return_pct.unwrap() - 10.0).abs() < 1e-9);
        // Output rows keep the input order in both modes.
        assert_eq!(sorted.rows()[1].record.date, date(3));
    }

    #[test]
    fn test_symbols_in_first_appearance_order() {
        let table = compute_derived(scenario(), ReturnOrdering::RowOrder);
        let names: Vec<String> = table.symbols().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);

        assert!(table.contains_symbol(&Symbol::new("C").unwrap()));
        assert!(!table.contains_symbol(&Symbol::new("Z").unwrap()));
        assert!(!compute_derived(Vec::new(), ReturnOrdering::RowOrder)
            .contains_symbol(&Symbol::new("A").unwrap()));
    }

    #[test]
    fn test_date_bounds_and_symbol_metrics() {
        let table = compute_derived(scenario(), ReturnOrdering::RowOrder);
        assert_eq!(table.date_bounds(), Some(DateRange::new(date(1), date(3))));

        let a = table.metrics_for(&Symbol::new("A").unwrap()).unwrap();
        assert_eq!(a.rows, 3);
        assert_eq!(a.first_date, date(1));
        assert_eq!(a.last_date, date(3));
    }

    #[test]
    fn test_empty_input() {
        let table = compute_derived(Vec::new(), ReturnOrdering::RowOrder);
        assert!(table.is_empty());
        assert!(table.symbols().is_empty());
        assert_eq!(table.date_bounds(), None);
    }

    #[test]
    fn test_return_ordering_from_str() {
        assert_eq!(ReturnOrdering::from_str("row"), Some(ReturnOrdering::RowOrder));
        assert_eq!(
            ReturnOrdering::from_str("Chronological"),
            Some(ReturnOrdering::Chronological)
        );
        assert_eq!(ReturnOrdering::from_str("random"), None);
    }
}
