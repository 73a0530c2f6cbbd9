//! Dashboard session
//!
//! Owns one [`SelectionState`] over a shared [`MetricsTable`] and runs the
//! recompute chain after every accepted UI event: filter the view, render each
//! output that has a registered sink, push the result to those sinks.
//!
//! Rejected events leave the selection untouched and push nothing.

use crate::analytics::{compute_derived, MetricsTable, ReturnOrdering};
use crate::renderers::{default_renderers, RenderOutput, Renderer, RendererKind};
use crate::selection::{SelectionError, SelectionState, DEFAULT_TOP_N};
use crate::symbol::Symbol;
use crate::time_series::{DataLoadError, DataProvider};
use crate::view::{filter_view, FilteredView, ViewCache};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, info, trace, warn};

/// Per-session behaviour knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    /// Number of symbols active when a session starts
    pub top_n: usize,
    /// How consecutive rows are differenced for returns
    pub ordering: ReturnOrdering,
    /// Memoise the last filtered view
    pub cache_views: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            top_n: DEFAULT_TOP_N,
            ordering: ReturnOrdering::default(),
            cache_views: true,
        }
    }
}

/// Errors raised while setting up a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The dataset could not be loaded
    DataLoad(DataLoadError),
    /// The table has no rows, so there is no date span to select
    EmptyDataset,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::DataLoad(err) => write!(f, "Data load error: {}", err),
            SessionError::EmptyDataset => write!(f, "Dataset contains no rows"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<DataLoadError> for SessionError {
    fn from(err: DataLoadError) -> Self {
        SessionError::DataLoad(err)
    }
}

/// Callback receiving the session version and a freshly rendered output.
pub type Sink = Box<dyn Fn(u64, &RenderOutput) + Send + Sync>;

/// Reports whether anything downstream of the sinks is listening.
pub type Demand = Box<dyn Fn() -> bool + Send + Sync>;

/// Loads every record from `provider` and derives the metrics table.
///
/// # Arguments
/// * `provider` - Source of the base dataset
/// * `ordering` - Ordering used for return computation
///
/// # Returns
/// The derived table, or the provider's error. Nothing is partially loaded.
pub fn load_table(
    provider: &dyn DataProvider,
    ordering: ReturnOrdering,
) -> Result<MetricsTable, SessionError> {
    let records = provider.load_records()?;
    let table = compute_derived(records, ordering);
    info!(
        rows = table.len(),
        symbols = table.symbol_metrics().len(),
        "Loaded dataset"
    );
    Ok(table)
}

/// One interactive dashboard.
pub struct DashboardSession {
    table: MetricsTable,
    selection: SelectionState,
    renderers: Vec<Box<dyn Renderer>>,
    sinks: HashMap<RendererKind, Vec<Sink>>,
    demand: Option<Demand>,
    cache: Option<Mutex<ViewCache>>,
}

impl fmt::Debug for DashboardSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashboardSession")
            .field("rows", &self.table.len())
            .field("selection", &self.selection)
            .field("sinks", &self.sinks.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

impl DashboardSession {
    /// Creates a session over `table` with the default selection: the full
    /// date span and the top `config.top_n` symbols by average value.
    ///
    /// # Errors
    /// `EmptyDataset` when the table has no rows.
    pub fn new(table: MetricsTable, config: &DashboardConfig) -> Result<Self, SessionError> {
        let selection =
            SelectionState::for_table(&table, config.top_n).ok_or(SessionError::EmptyDataset)?;

        debug!(
            active = selection.active_symbols().len(),
            range = %selection.date_range(),
            "Created dashboard session"
        );

        Ok(DashboardSession {
            table,
            selection,
            renderers: default_renderers(),
            sinks: HashMap::new(),
            demand: None,
            cache: config.cache_views.then(|| Mutex::new(ViewCache::new())),
        })
    }

    /// Loads `provider` and creates a session over it.
    pub fn from_provider(
        provider: &dyn DataProvider,
        config: &DashboardConfig,
    ) -> Result<Self, SessionError> {
        let table = load_table(provider, config.ordering)?;
        Self::new(table, config)
    }

    pub fn table(&self) -> &MetricsTable {
        &self.table
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn version(&self) -> u64 {
        self.selection.version()
    }

    /// Every symbol of the dataset, for building per-symbol toggles.
    pub fn symbols(&self) -> Vec<Symbol> {
        self.table.symbols()
    }

    /// Registers `sink` to receive every future output of `kind`.
    pub fn register_sink(&mut self, kind: RendererKind, sink: Sink) {
        self.sinks.entry(kind).or_default().push(sink);
    }

    pub fn sink_count(&self, kind: RendererKind) -> usize {
        self.sinks.get(&kind).map_or(0, Vec::len)
    }

    /// Installs a check consulted before each recompute. While it returns
    /// `false` accepted events still advance the version, but no view is
    /// filtered and no sink is called.
    pub fn set_demand(&mut self, demand: Demand) {
        self.demand = Some(demand);
    }

    fn has_demand(&self) -> bool {
        let listening = self.demand.as_ref().map_or(true, |demand| demand());
        listening && self.sinks.values().any(|sinks| !sinks.is_empty())
    }

    /// The view for the current selection.
    pub fn current_view(&self) -> FilteredView {
        match self.cache.as_ref().and_then(|cache| cache.lock().ok()) {
            Some(mut cache) => cache.get_or_compute(&self.table, &self.selection),
            None => filter_view(&self.table, &self.selection),
        }
    }

    /// Hits and misses of the view cache, `None` when caching is off.
    pub fn cache_stats(&self) -> Option<(u64, u64)> {
        let cache = self.cache.as_ref()?.lock().ok()?;
        Some((cache.hits(), cache.misses()))
    }

    /// Renders one output for the current selection.
    pub fn render(&self, kind: RendererKind) -> RenderOutput {
        kind.renderer().render(&self.current_view())
    }

    /// Renders every output for the current selection.
    pub fn render_all(&self) -> Vec<RenderOutput> {
        let view = self.current_view();
        self.renderers
            .iter()
            .map(|renderer| renderer.render(&view))
            .collect()
    }

    /// Handles a click on a symbol toggle.
    ///
    /// # Returns
    /// The new version, or the rejection if the symbol is unknown
    pub fn on_toggle_symbol(&mut self, symbol: &Symbol) -> Result<u64, SelectionError> {
        match self.selection.toggle(symbol) {
            Ok(active) => {
                debug!(%symbol, active, "Toggled symbol");
                Ok(self.recompute())
            }
            Err(err) => {
                warn!(%symbol, error = %err, "Rejected symbol toggle");
                Err(err)
            }
        }
    }

    /// Handles a change of the date picker.
    ///
    /// # Returns
    /// The new version, or `InvalidRange` when `start` is after `end`
    pub fn on_set_date_range(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<u64, SelectionError> {
        match self.selection.set_date_range(start, end) {
            Ok(()) => {
                debug!(range = %self.selection.date_range(), "Changed date range");
                Ok(self.recompute())
            }
            Err(err) => {
                warn!(error = %err, "Rejected date range");
                Err(err)
            }
        }
    }

    /// Activates every symbol.
    pub fn on_select_all(&mut self) -> u64 {
        if !self.selection.select_all() {
            debug!("Nothing to select");
            return self.version();
        }
        debug!("Selected all symbols");
        self.recompute()
    }

    /// Deactivates every symbol.
    pub fn on_clear(&mut self) -> u64 {
        self.selection.clear();
        debug!("Cleared selection");
        self.recompute()
    }

    fn recompute(&self) -> u64 {
        let version = self.selection.version();
        if !self.has_demand() {
            trace!(version, "No listeners, skipping recompute");
            return version;
        }

        let view = self.current_view();
        debug!(version, rows = view.len(), "Recomputing outputs");

        for renderer in &self.renderers {
            let kind = renderer.kind();
            let sinks = match self.sinks.get(&kind) {
                Some(sinks) if !sinks.is_empty() => sinks,
                _ => continue,
            };

            let output = renderer.render(&view);
            trace!(%kind, sinks = sinks.len(), "Rendered output");
            self.invoke_sinks(kind, sinks, version, &output);
        }

        version
    }

    /// Sink panics are caught and logged; the remaining sinks still run.
    fn invoke_sinks(&self, kind: RendererKind, sinks: &[Sink], version: u64, output: &RenderOutput) {
        for sink in sinks {
            if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| sink(version, output)))
                .is_err()
            {
                warn!(%kind, version, "Sink panicked while handling output");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_series::{DateRange, InMemoryDataProvider, StockRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn sym(name: &str) -> Symbol {
        Symbol::new(name).unwrap()
    }

    fn records() -> Vec<StockRecord> {
        vec![
            StockRecord::new(sym("A"), date(1), 10.0, 100),
            StockRecord::new(sym("B"), date(1), 50.0, 10),
            StockRecord::new(sym("A"), date(2), 11.0, 100),
            StockRecord::new(sym("B"), date(2), 55.0, 10),
            StockRecord::new(sym("A"), date(3), 9.0, 100),
            StockRecord::new(sym("C"), date(3), 7.0, 1),
        ]
    }

    fn session() -> DashboardSession {
        let provider = InMemoryDataProvider::with_records(records());
        DashboardSession::from_provider(&provider, &DashboardConfig::default()).unwrap()
    }

    fn counting_sink(counter: &Arc<AtomicUsize>) -> Sink {
        let counter = Arc::clone(counter);
        Box::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_new_session_defaults() {
        let session = session();
        assert_eq!(session.version(), 0);
        assert_eq!(
            session.selection().date_range(),
            DateRange::new(date(1), date(3))
        );
        assert_eq!(session.selection().active_symbols().len(), 3);
        assert_eq!(session.symbols(), vec![sym("A"), sym("B"), sym("C")]);
    }

    #[test]
    fn test_empty_provider_is_a_load_error() {
        let provider = InMemoryDataProvider::new();
        let result = DashboardSession::from_provider(&provider, &DashboardConfig::default());
        assert!(matches!(result, Err(SessionError::DataLoad(_))));
    }

    #[test]
    fn test_empty_table_is_rejected() {
        let table = compute_derived(Vec::new(), ReturnOrdering::RowOrder);
        let result = DashboardSession::new(table, &DashboardConfig::default());
        assert_eq!(result.unwrap_err(), SessionError::EmptyDataset);
    }

    #[test]
    fn test_toggle_pushes_to_sinks_with_version() {
        let mut session = session();
        let seen: Arc<Mutex<Vec<(u64, RenderOutput)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        session.register_sink(
            RendererKind::Summary,
            Box::new(move |version, output| {
                seen_clone.lock().unwrap().push((version, output.clone()));
            }),
        );

        let version = session.on_toggle_symbol(&sym("C")).unwrap();
        assert_eq!(version, 1);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, 1);
        match &seen[0].1 {
            RenderOutput::Summary(stats) => assert_eq!(stats.total_stocks, 2),
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_rejected_events_push_nothing() {
        let mut session = session();
        let counter = Arc::new(AtomicUsize::new(0));
        session.register_sink(RendererKind::DetailTable, counting_sink(&counter));

        let before = session.selection().clone();
        assert!(session.on_set_date_range(date(3), date(1)).is_err());
        assert!(matches!(
            session.on_toggle_symbol(&sym("ZZZ")),
            Err(SelectionError::UnknownSymbol(_))
        ));

        assert_eq!(session.selection(), &before);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panicking_sink_does_not_halt_others() {
        let mut session = session();
        let counter = Arc::new(AtomicUsize::new(0));
        session.register_sink(
            RendererKind::VolatilityBars,
            Box::new(|_, _| panic!("sink failure")),
        );
        session.register_sink(RendererKind::VolatilityBars, counting_sink(&counter));
        session.register_sink(RendererKind::Summary, counting_sink(&counter));

        let version = session.on_clear();
        assert_eq!(version, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(session.selection().active_symbols().is_empty());
    }

    #[test]
    fn test_only_kinds_with_sinks_are_pushed() {
        let mut session = session();
        let counter = Arc::new(AtomicUsize::new(0));
        session.register_sink(RendererKind::PriceEvolution, counting_sink(&counter));
        assert_eq!(session.sink_count(RendererKind::PriceEvolution), 1);
        assert_eq!(session.sink_count(RendererKind::Summary), 0);

        session.on_select_all();
        session.on_set_date_range(date(2), date(2)).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(session.version(), 2);
    }

    #[test]
    fn test_idle_demand_skips_rendering() {
        let mut session = session();
        let counter = Arc::new(AtomicUsize::new(0));
        let listening = Arc::new(AtomicUsize::new(0));
        let listening_clone = Arc::clone(&listening);
        session.register_sink(RendererKind::DetailTable, counting_sink(&counter));
        session.set_demand(Box::new(move || listening_clone.load(Ordering::SeqCst) > 0));

        assert_eq!(session.on_toggle_symbol(&sym("C")).unwrap(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(session.cache_stats(), Some((0, 0)));

        listening.store(1, Ordering::SeqCst);
        assert_eq!(session.on_clear(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(session.cache_stats(), Some((0, 1)));
    }

    #[test]
    fn test_end_to_end_summary() {
        let mut session = session();
        session.on_clear();
        session.on_toggle_symbol(&sym("A")).unwrap();
        session.on_set_date_range(date(1), date(2)).unwrap();

        let view = session.current_view();
        assert_eq!(view.len(), 2);

        match session.render(RendererKind::Summary) {
            RenderOutput::Summary(stats) => {
                assert_eq!(stats.total_stocks, 1);
                assert_eq!(stats.total_volume, 200);
                assert!((stats.average_return.unwrap() - 10.0).abs() < 1e-9);
                assert_eq!(stats.labels()[2].1, "10.00%");
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_render_all_covers_every_kind() {
        let session = session();
        let kinds: Vec<RendererKind> = session.render_all().iter().map(RenderOutput::kind).collect();
        assert_eq!(kinds, RendererKind::ALL.to_vec());
    }

    #[test]
    fn test_view_cache_reused_between_renders() {
        let session = session();
        session.render(RendererKind::Summary);
        session.render(RendererKind::DetailTable);
        assert_eq!(session.cache_stats(), Some((1, 1)));

        let config = DashboardConfig {
            cache_views: false,
            ..DashboardConfig::default()
        };
        let uncached = DashboardSession::new(session.table().clone(), &config).unwrap();
        assert_eq!(uncached.cache_stats(), None);
    }

    #[test]
    fn test_top_n_from_config() {
        let config = DashboardConfig {
            top_n: 1,
            ..DashboardConfig::default()
        };
        let table = compute_derived(records(), ReturnOrdering::RowOrder);
        let session = DashboardSession::new(table, &config).unwrap();
        let active: Vec<&Symbol> = session.selection().active_symbols().iter().collect();
        assert_eq!(active, vec![&sym("A")]);
    }
}
