//! Stock Dashboard API Server Binary
//!
//! Run with: `cargo run --bin dashboard-server`

use stock_dashboard::{run_server, DashboardConfig, ReturnOrdering, ServerConfig, DEFAULT_TOP_N};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Tracing is initialized in run_server(); RUST_LOG controls the level:
    //   RUST_LOG=debug cargo run --bin dashboard-server
    //   RUST_LOG=stock_dashboard::session=trace cargo run --bin dashboard-server

    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .unwrap_or(3000);
    let data_path = std::env::var("DATA_PATH").unwrap_or_else(|_| "stocks.csv".to_string());
    let max_sessions = std::env::var("MAX_SESSIONS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(10);
    let top_n = std::env::var("TOP_N")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(DEFAULT_TOP_N);
    let ordering = std::env::var("RETURN_ORDERING")
        .ok()
        .and_then(|value| ReturnOrdering::from_str(&value))
        .unwrap_or_default();

    let config = ServerConfig::new(host, port, data_path)
        .with_max_sessions(max_sessions)
        .with_dashboard(DashboardConfig {
            top_n,
            ordering,
            ..DashboardConfig::default()
        });

    println!("Starting Stock Dashboard API Server...");
    println!("   Host: {}", config.host);
    println!("   Port: {}", config.port);
    println!("   Data: {}", config.data_path);
    println!("   Top N: {}", config.dashboard.top_n);
    println!("   Return ordering: {:?}", config.dashboard.ordering);
    println!();
    println!(
        "Server will be available at: http://{}:{}",
        config.host, config.port
    );
    println!();
    println!("Available endpoints:");
    println!("  GET    /health                          - Health check");
    println!("  GET    /symbols                         - Per-symbol metrics");
    println!("  POST   /sessions                        - Create session");
    println!("  GET    /sessions/:id                    - Session selection");
    println!("  DELETE /sessions/:id                    - Close session");
    println!("  POST   /sessions/:id/toggle/:symbol     - Toggle symbol");
    println!("  PUT    /sessions/:id/range              - Set date range");
    println!("  POST   /sessions/:id/select-all         - Select all symbols");
    println!("  POST   /sessions/:id/clear              - Clear selection");
    println!("  GET    /sessions/:id/summary            - Summary statistics");
    println!("  GET    /sessions/:id/price              - Price evolution");
    println!("  GET    /sessions/:id/volatility         - Volatility by symbol");
    println!("  GET    /sessions/:id/scatter            - Return vs volatility");
    println!("  GET    /sessions/:id/table              - Detail table");
    println!("  GET    /sessions/:id/stream             - SSE stream");
    println!();

    run_server(config).await?;

    Ok(())
}
