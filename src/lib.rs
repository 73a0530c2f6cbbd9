pub mod symbol;
pub mod time_series;
pub mod csv_provider;
pub mod analytics;
pub mod selection;
pub mod view;
pub mod renderers;
pub mod session;
pub mod server;


pub use symbol::{Symbol, SymbolError};
pub use time_series::{StockRecord, DateRange, DataProvider, DataLoadError, InMemoryDataProvider};
pub use csv_provider::{CsvDataProvider, LoaderConfig};
pub use analytics::{compute_derived, DerivedRow, MetricsTable, ReturnOrdering, SymbolMetrics};
pub use selection::{initial_top_n, SelectionError, SelectionState, DEFAULT_TOP_N};
pub use view::{filter_view, FilteredView, ViewCache};
pub use renderers::{
    default_renderers,
    ColumnHeader,
    DetailTable,
    PriceSeries,
    RenderOutput,
    Renderer,
    RendererKind,
    ReturnVolatilityScatter,
    SortDirection,
    SummaryStats,
    TableColumn,
    VolatilityBars,
};
pub use session::{load_table, DashboardConfig, DashboardSession, Demand, SessionError, Sink};
pub use server::{run_server, ServerConfig, AppState, ApiError};
