//! Output Renderers
//!
//! Five independent consumers of a [`FilteredView`]. Each produces the data a
//! charting or table backend needs; drawing it is the backend's business.
//! Renderers never fail: an empty view yields zero counts, placeholders, a
//! skipped chart or an empty table.
//!
//! Aggregates here (mean return, volatility per symbol) are computed from the
//! filtered rows only. They are distinct from the whole-history `volatility`
//! and `avg_value` columns carried on each row.

use crate::analytics::calculators::{SampleStdDevVolatility, VolatilityAnalytic};
use crate::analytics::primitives::{mean, present_values};
use crate::analytics::DerivedRow;
use crate::symbol::Symbol;
use crate::view::FilteredView;
use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Text shown in place of an undefined statistic.
pub const PLACEHOLDER: &str = "N/A";

/// Identifies one of the dashboard outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererKind {
    Summary,
    PriceEvolution,
    VolatilityBars,
    ReturnVolatility,
    DetailTable,
}

impl RendererKind {
    pub const ALL: [RendererKind; 5] = [
        RendererKind::Summary,
        RendererKind::PriceEvolution,
        RendererKind::VolatilityBars,
        RendererKind::ReturnVolatility,
        RendererKind::DetailTable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RendererKind::Summary => "summary",
            RendererKind::PriceEvolution => "price_evolution",
            RendererKind::VolatilityBars => "volatility_bars",
            RendererKind::ReturnVolatility => "return_volatility",
            RendererKind::DetailTable => "detail_table",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        RendererKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == value.trim())
    }

    /// The built-in renderer for this kind.
    pub fn renderer(&self) -> Box<dyn Renderer> {
        match self {
            RendererKind::Summary => Box::new(SummaryRenderer),
            RendererKind::PriceEvolution => Box::new(PriceEvolutionRenderer),
            RendererKind::VolatilityBars => Box::new(VolatilityBarsRenderer),
            RendererKind::ReturnVolatility => Box::new(ReturnVolatilityRenderer),
            RendererKind::DetailTable => Box::new(DetailTableRenderer),
        }
    }
}

impl fmt::Display for RendererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Headline numbers over the filtered view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    /// Distinct symbols in the view
    pub total_stocks: usize,
    /// Sum of volume over the view
    pub total_volume: u64,
    /// Mean of present `return_pct` values, `None` when there are none
    pub average_return: Option<f64>,
}

impl SummaryStats {
    pub fn from_view(view: &FilteredView) -> Self {
        let returns = present_values(view.rows().map(|row| row.return_pct));
        SummaryStats {
            total_stocks: view.symbols().len(),
            total_volume: view
                .rows()
                .fold(0u64, |total, row| total.saturating_add(row.record.volume)),
            average_return: mean(&returns),
        }
    }

    /// Display labels and values, e.g. `("Average Return", "10.00%")`.
    pub fn labels(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Total Stocks", self.total_stocks.to_string()),
            ("Total Volume", group_thousands(self.total_volume)),
            ("Average Return", format_percent(self.average_return)),
        ]
    }
}

/// Formats a percentage with two decimals, or the placeholder.
pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(value) if value.is_finite() => format!("{:.2}%", value),
        _ => PLACEHOLDER.to_string(),
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// One line of the price-evolution chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLine {
    pub symbol: Symbol,
    pub points: Vec<PricePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub lines: Vec<PriceLine>,
}

impl PriceSeries {
    /// One line per symbol in the view; `None` when there is nothing to plot.
    pub fn from_view(view: &FilteredView) -> Option<Self> {
        if view.is_empty() {
            return None;
        }

        let lines = view
            .grouped()
            .into_iter()
            .map(|(symbol, rows)| PriceLine {
                symbol,
                points: rows
                    .iter()
                    .map(|row| PricePoint {
                        date: row.record.date,
                        close: row.record.close,
                    })
                    .collect(),
            })
            .collect();
        Some(PriceSeries { lines })
    }
}

fn filtered_returns(rows: &[&DerivedRow]) -> Vec<f64> {
    present_values(rows.iter().map(|row| row.return_pct))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityBar {
    pub symbol: Symbol,
    /// Sample std-dev of the symbol's returns inside the window
    pub volatility: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityBars {
    pub bars: Vec<VolatilityBar>,
}

impl VolatilityBars {
    pub fn from_view(view: &FilteredView) -> Self {
        let bars = view
            .grouped()
            .into_iter()
            .map(|(symbol, rows)| VolatilityBar {
                volatility: SampleStdDevVolatility.compute(&filtered_returns(&rows)),
                symbol,
            })
            .collect();
        VolatilityBars { bars }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub symbol: Symbol,
    pub mean_return: f64,
    pub volatility: f64,
}

/// Mean return against volatility, one labeled point per symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnVolatilityScatter {
    pub points: Vec<ScatterPoint>,
    /// Symbols in the view whose mean or volatility is undefined
    pub skipped: Vec<Symbol>,
}

impl ReturnVolatilityScatter {
    pub fn from_view(view: &FilteredView) -> Self {
        let mut points = Vec::new();
        let mut skipped = Vec::new();

        for (symbol, rows) in view.grouped() {
            let returns = filtered_returns(&rows);
            match (mean(&returns), SampleStdDevVolatility.compute(&returns)) {
                (Some(mean_return), Some(volatility)) => points.push(ScatterPoint {
                    symbol,
                    mean_return,
                    volatility,
                }),
                _ => skipped.push(symbol),
            }
        }

        ReturnVolatilityScatter { points, skipped }
    }
}

/// Column of the detail table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableColumn {
    Symbol,
    Date,
    Close,
    Volume,
    Return,
    Volatility,
    AvgValue,
}

impl TableColumn {
    pub const ALL: [TableColumn; 7] = [
        TableColumn::Symbol,
        TableColumn::Date,
        TableColumn::Close,
        TableColumn::Volume,
        TableColumn::Return,
        TableColumn::Volatility,
        TableColumn::AvgValue,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            TableColumn::Symbol => "Symbol",
            TableColumn::Date => "Date",
            TableColumn::Close => "Close",
            TableColumn::Volume => "Volume",
            TableColumn::Return => "Return (%)",
            TableColumn::Volatility => "Volatility",
            TableColumn::AvgValue => "Avg Value",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "symbol" => Some(TableColumn::Symbol),
            "date" => Some(TableColumn::Date),
            "close" => Some(TableColumn::Close),
            "volume" => Some(TableColumn::Volume),
            "return" | "return_pct" => Some(TableColumn::Return),
            "volatility" => Some(TableColumn::Volatility),
            "avg_value" | "avgvalue" => Some(TableColumn::AvgValue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRow {
    pub symbol: Symbol,
    pub date: NaiveDate,
    pub close: f64,
    pub volume: u64,
    pub return_pct: Option<f64>,
    pub volatility: Option<f64>,
    pub avg_value: f64,
}

impl From<&DerivedRow> for DetailRow {
    fn from(row: &DerivedRow) -> Self {
        DetailRow {
            symbol: row.record.symbol.clone(),
            date: row.record.date,
            close: row.record.close,
            volume: row.record.volume,
            return_pct: row.return_pct,
            volatility: row.volatility,
            avg_value: row.avg_value,
        }
    }
}

impl DetailRow {
    fn compare(&self, other: &Self, column: TableColumn) -> Ordering {
        let optional = |value: Option<f64>| value.map(OrderedFloat);
        match column {
            TableColumn::Symbol => self.symbol.cmp(&other.symbol),
            TableColumn::Date => self.date.cmp(&other.date),
            TableColumn::Close => OrderedFloat(self.close).cmp(&OrderedFloat(other.close)),
            TableColumn::Volume => self.volume.cmp(&other.volume),
            TableColumn::Return => optional(self.return_pct).cmp(&optional(other.return_pct)),
            TableColumn::Volatility => optional(self.volatility).cmp(&optional(other.volatility)),
            TableColumn::AvgValue => {
                OrderedFloat(self.avg_value).cmp(&OrderedFloat(other.avg_value))
            }
        }
    }
}

/// Column id paired with its display label, e.g. `return` / `Return (%)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnHeader {
    pub id: TableColumn,
    pub label: String,
}

impl From<TableColumn> for ColumnHeader {
    fn from(column: TableColumn) -> Self {
        ColumnHeader {
            id: column,
            label: column.header().to_string(),
        }
    }
}

/// Tabular dump of the view, rows in view order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailTable {
    pub columns: Vec<ColumnHeader>,
    pub rows: Vec<DetailRow>,
}

impl DetailTable {
    pub fn from_view(view: &FilteredView) -> Self {
        DetailTable {
            columns: TableColumn::ALL.into_iter().map(ColumnHeader::from).collect(),
            rows: view.rows().map(DetailRow::from).collect(),
        }
    }

    /// Rows whose symbol or `YYYY-MM-DD` date contains `query`,
    /// case-insensitively. An empty query keeps every row.
    pub fn search(&self, query: &str) -> DetailTable {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.clone();
        }

        let rows = self
            .rows
            .iter()
            .filter(|row| {
                row.symbol.as_str().to_lowercase().contains(&needle)
                    || row.date.format("%Y-%m-%d").to_string().contains(&needle)
            })
            .cloned()
            .collect();
        DetailTable {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Copy of the table stably sorted by `column`. Missing values sort first
    /// when ascending.
    pub fn sorted_by(&self, column: TableColumn, direction: SortDirection) -> DetailTable {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            let ordering = a.compare(b, column);
            match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
        DetailTable {
            columns: self.columns.clone(),
            rows,
        }
    }
}

/// Output of one renderer for one view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum RenderOutput {
    Summary(SummaryStats),
    /// `None` when the view is empty and the chart is skipped
    PriceEvolution(Option<PriceSeries>),
    VolatilityBars(VolatilityBars),
    ReturnVolatility(ReturnVolatilityScatter),
    DetailTable(DetailTable),
}

impl RenderOutput {
    pub fn kind(&self) -> RendererKind {
        match self {
            RenderOutput::Summary(_) => RendererKind::Summary,
            RenderOutput::PriceEvolution(_) => RendererKind::PriceEvolution,
            RenderOutput::VolatilityBars(_) => RendererKind::VolatilityBars,
            RenderOutput::ReturnVolatility(_) => RendererKind::ReturnVolatility,
            RenderOutput::DetailTable(_) => RendererKind::DetailTable,
        }
    }
}

/// A pure function from a filtered view to one dashboard output.
pub trait Renderer: Send + Sync {
    fn kind(&self) -> RendererKind;
    fn render(&self, view: &FilteredView) -> RenderOutput;
}

pub struct SummaryRenderer;

impl Renderer for SummaryRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::Summary
    }

    fn render(&self, view: &FilteredView) -> RenderOutput {
        RenderOutput::Summary(SummaryStats::from_view(view))
    }
}

pub struct PriceEvolutionRenderer;

impl Renderer for PriceEvolutionRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::PriceEvolution
    }

    fn render(&self, view: &FilteredView) -> RenderOutput {
        RenderOutput::PriceEvolution(PriceSeries::from_view(view))
    }
}

pub struct VolatilityBarsRenderer;

impl Renderer for VolatilityBarsRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::VolatilityBars
    }

    fn render(&self, view: &FilteredView) -> RenderOutput {
        RenderOutput::VolatilityBars(VolatilityBars::from_view(view))
    }
}

pub struct ReturnVolatilityRenderer;

impl Renderer for ReturnVolatilityRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::ReturnVolatility
    }

    fn render(&self, view: &FilteredView) -> RenderOutput {
        RenderOutput::ReturnVolatility(ReturnVolatilityScatter::from_view(view))
    }
}

pub struct DetailTableRenderer;

impl Renderer for DetailTableRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::DetailTable
    }

    fn render(&self, view: &FilteredView) -> RenderOutput {
        RenderOutput::DetailTable(DetailTable::from_view(view))
    }
}

/// The five built-in renderers, one per [`RendererKind`].
pub fn default_renderers() -> Vec<Box<dyn Renderer>> {
    RendererKind::ALL.iter().map(RendererKind::renderer).collect()
}
