//! Dashboard Walkthrough Example
//!
//! Loads a small inline dataset, registers printing sinks, and replays a
//! scripted sequence of UI events against one dashboard session.
//!
//! Run with: cargo run --example dashboard_walkthrough

use chrono::NaiveDate;
use stock_dashboard::{
    CsvDataProvider, DashboardConfig, DashboardSession, InMemoryDataProvider, LoaderConfig,
    RenderOutput, RendererKind, SortDirection, Symbol, TableColumn,
};

const DATASET: &str = "\
Symbol,Date,Close,Volume
AAPL,2024-01-02,185.6,82488700
MSFT,2024-01-02,370.9,25258600
NVDA,2024-01-02,481.7,41125400
TSLA,2024-01-02,248.4,104654200
AAPL,2024-01-03,184.3,58414500
MSFT,2024-01-03,370.6,23083500
NVDA,2024-01-03,475.7,32089600
TSLA,2024-01-03,238.5,121082600
AAPL,2024-01-04,182.0,71983600
MSFT,2024-01-04,368.0,20901500
NVDA,2024-01-04,479.9,30653500
TSLA,2024-01-04,237.9,102629300
AAPL,2024-01-05,181.2,62303300
MSFT,2024-01-05,367.8,20987000
NVDA,2024-01-05,490.9,41883600
TSLA,2024-01-05,237.5,92488900
KO,2024-01-05,60.1,11983400
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    println!("=== Stock Dashboard Walkthrough ===\n");

    let records =
        CsvDataProvider::from_reader(DATASET.as_bytes(), "walkthrough.csv", &LoaderConfig::default())?;
    log::info!("Parsed {} records", records.len());
    let provider = InMemoryDataProvider::with_records(records);

    let config = DashboardConfig {
        top_n: 3,
        ..DashboardConfig::default()
    };
    let mut session = DashboardSession::from_provider(&provider, &config)?;

    println!("Symbols in dataset:");
    for metrics in session.table().symbol_metrics() {
        println!(
            "  {:<5} rows={} avg value={:>16.0} volatility={}",
            metrics.symbol,
            metrics.rows,
            metrics.avg_value,
            metrics
                .volatility
                .map(|v| format!("{:.3}", v))
                .unwrap_or_else(|| "N/A".to_string())
        );
    }
    println!(
        "\nInitially active: {:?}\n",
        session
            .selection()
            .active_symbols()
            .iter()
            .map(Symbol::as_str)
            .collect::<Vec<_>>()
    );

    session.register_sink(
        RendererKind::Summary,
        Box::new(|version, output| {
            if let RenderOutput::Summary(stats) = output {
                let labels: Vec<String> = stats
                    .labels()
                    .into_iter()
                    .map(|(label, value)| format!("{}: {}", label, value))
                    .collect();
                println!("  [v{}] {}", version, labels.join(" | "));
            }
        }),
    );
    session.register_sink(
        RendererKind::ReturnVolatility,
        Box::new(|version, output| {
            if let RenderOutput::ReturnVolatility(scatter) = output {
                for point in &scatter.points {
                    println!(
                        "  [v{}] {:<5} mean return {:>7.3}%  volatility {:.3}",
                        version, point.symbol, point.mean_return, point.volatility
                    );
                }
                if !scatter.skipped.is_empty() {
                    println!("  [v{}] not enough data: {:?}", version, scatter.skipped);
                }
            }
        }),
    );

    let date = |d: u32| NaiveDate::from_ymd_opt(2024, 1, d).ok_or("invalid date");

    println!("> toggle KO");
    session.on_toggle_symbol(&Symbol::new("KO")?)?;

    println!("> narrow range to 2024-01-03..2024-01-05");
    session.on_set_date_range(date(3)?, date(5)?)?;

    println!("> inverted range (rejected)");
    if let Err(err) = session.on_set_date_range(date(5)?, date(3)?) {
        println!("  rejected: {}", err);
    }

    println!("> toggle an unknown symbol (rejected)");
    if let Err(err) = session.on_toggle_symbol(&Symbol::new("IBM")?) {
        println!("  rejected: {}", err);
    }

    println!("> clear selection");
    session.on_clear();

    println!("> select all");
    session.on_select_all();

    if let RenderOutput::DetailTable(table) = session.render(RendererKind::DetailTable) {
        let top = table
            .search("2024-01-05")
            .sorted_by(TableColumn::Close, SortDirection::Descending);
        println!("\nClosing prices on 2024-01-05:");
        for row in top.rows {
            println!("  {:<5} {:>8.2}", row.symbol, row.close);
        }
    }

    println!("\nFinal version: {}", session.version());
    Ok(())
}
