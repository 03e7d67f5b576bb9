// Main entry point - Dependency injection and server setup
use anyhow::Context;
use perf_charts::application::admission::AdmissionGate;
use perf_charts::application::chart_service::ChartRenderer;
use perf_charts::application::clock::SystemClock;
use perf_charts::application::registry::ChartRegistry;
use perf_charts::infrastructure::config::load_app_config;
use perf_charts::infrastructure::query_client::HttpMetricQueryService;
use perf_charts::presentation::app_state::AppState;
use perf_charts::presentation::router;
use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_app_config()?;

    // Create query client (infrastructure layer)
    let repository = Arc::new(HttpMetricQueryService::new(&config.query_service)?);
    tracing::info!("Querying metrics at {}", repository.endpoint());

    // Create services (application layer)
    let renderer =
        ChartRenderer::new(repository, Arc::new(SystemClock), config.charts.render_options());
    let gate = AdmissionGate::new(config.charts.max_concurrent_updates);
    let registry = ChartRegistry::new(renderer.clone(), gate);

    for definition in &config.charts.definitions {
        if let Err(e) = registry.upsert(&definition.name, definition.config.clone()).await {
            tracing::warn!("Skipping chart '{}': {}", definition.name, e);
        }
    }

    // Build router (presentation layer)
    let state = Arc::new(AppState { registry, renderer });
    let app = router(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", config.server.bind))?;
    tracing::info!("Starting perf-charts service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}
