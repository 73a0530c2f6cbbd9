//! REST API server with Server-Sent Events support

mod error;
mod handlers;
mod routes;
mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, OutputEnvelope, SessionEntry};

use crate::csv_provider::{CsvDataProvider, LoaderConfig};
use crate::session::{load_table, DashboardConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host address (default: "127.0.0.1")
    pub host: String,
    /// Server port (default: 3000)
    pub port: u16,
    /// Path to the CSV dataset
    pub data_path: String,
    /// Maximum number of concurrent sessions (default: 10)
    pub max_sessions: usize,
    /// Settings applied to every new session
    pub dashboard: DashboardConfig,
    /// CSV parsing options
    pub loader: LoaderConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            data_path: "stocks.csv".to_string(),
            max_sessions: 10,
            dashboard: DashboardConfig::default(),
            loader: LoaderConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a new server configuration
    pub fn new(host: impl Into<String>, port: u16, data_path: impl Into<String>) -> Self {
        ServerConfig {
            host: host.into(),
            port,
            data_path: data_path.into(),
            ..ServerConfig::default()
        }
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    pub fn with_dashboard(mut self, dashboard: DashboardConfig) -> Self {
        self.dashboard = dashboard;
        self
    }
}

/// Runs the API server
///
/// Loads the dataset once, derives its metrics, then serves sessions over it.
///
/// # Arguments
/// * `config` - Server configuration
///
/// # Returns
/// Returns an error if the dataset cannot be loaded, the server fails to
/// start, or it encounters a fatal error
///
/// # Example
/// ```rust,no_run
/// use stock_dashboard::server::{run_server, ServerConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ServerConfig::default();
///     run_server(config).await?;
///     Ok(())
/// }
/// ```
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let provider = CsvDataProvider::new(&config.data_path, config.loader.clone());
    let table = load_table(&provider, config.dashboard.ordering)?;

    let state = Arc::new(AppState::new(table, config.dashboard, config.max_sessions));
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
