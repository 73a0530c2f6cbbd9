//! View Filter
//!
//! Combines the derived table with a [`SelectionState`] into the rows every
//! renderer consumes. A view shares the table's rows and only stores the
//! indices that survived the filter, so cloning one is cheap.

use crate::analytics::{DerivedRow, MetricsTable};
use crate::selection::SelectionState;
use crate::symbol::Symbol;
use crate::time_series::DateRange;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::trace;

/// Rows matching the current date range and active symbols, in table order.
#[derive(Debug, Clone)]
pub struct FilteredView {
    base: Arc<[DerivedRow]>,
    indices: Arc<[usize]>,
}

impl FilteredView {
    /// Iterates over the matching rows in original table order.
    pub fn rows(&self) -> impl Iterator<Item = &DerivedRow> + '_ {
        self.indices.iter().map(move |&index| &self.base[index])
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Distinct symbols present in the view, in order of first appearance.
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut seen = BTreeSet::new();
        let mut ordered = Vec::new();
        for row in self.rows() {
            if seen.insert(&row.record.symbol) {
                ordered.push(row.record.symbol.clone());
            }
        }
        ordered
    }

    /// Groups the view's rows by symbol, groups in order of first appearance
    /// and rows in view order within each group.
    pub fn grouped(&self) -> Vec<(Symbol, Vec<&DerivedRow>)> {
        let mut groups: Vec<(Symbol, Vec<&DerivedRow>)> = Vec::new();
        for row in self.rows() {
            match groups
                .iter_mut()
                .find(|(symbol, _)| symbol == &row.record.symbol)
            {
                Some((_, rows)) => rows.push(row),
                None => groups.push((row.record.symbol.clone(), vec![row])),
            }
        }
        groups
    }
}

/// Returns the rows of `table` inside the selection's date range whose symbol
/// is active.
pub fn filter_view(table: &MetricsTable, selection: &SelectionState) -> FilteredView {
    let range = selection.date_range();
    let active = selection.active_symbols();

    let indices: Vec<usize> = if active.is_empty() {
        Vec::new()
    } else {
        table
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, row)| range.contains(row.record.date) && active.contains(&row.record.symbol))
            .map(|(index, _)| index)
            .collect()
    };

    trace!(
        rows = indices.len(),
        active = active.len(),
        range = %range,
        "Filtered view"
    );

    FilteredView {
        base: table.shared_rows(),
        indices: indices.into(),
    }
}

/// Key identifying the inputs a view was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewKey {
    pub date_range: DateRange,
    pub active_symbols: BTreeSet<Symbol>,
}

impl ViewKey {
    pub fn of(selection: &SelectionState) -> Self {
        ViewKey {
            date_range: selection.date_range(),
            active_symbols: selection.active_symbols().clone(),
        }
    }
}

/// Single-entry memo of the last computed view.
///
/// Filtering is cheap; the cache only saves work when several consumers ask
/// for the view of an unchanged selection.
#[derive(Debug, Default)]
pub struct ViewCache {
    entry: Option<(ViewKey, FilteredView)>,
    hits: u64,
    misses: u64,
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached view for `selection`, filtering on a miss.
    pub fn get_or_compute(&mut self, table: &MetricsTable, selection: &SelectionState) -> FilteredView {
        let key = ViewKey::of(selection);
        if let Some((cached_key, view)) = &self.entry {
            if cached_key == &key {
                self.hits += 1;
                return view.clone();
            }
        }

        self.misses += 1;
        let view = filter_view(table, selection);
        self.entry = Some((key, view.clone()));
        view
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
