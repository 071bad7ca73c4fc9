use clap::Parser;
use host_agent::adapters::metrics_handler::MetricsCollector;
use host_agent::agents::HealthMonitor;
use host_agent::cli::Cli;
use host_agent::config::Settings;
use host_agent::orchestration::Orchestrator;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Load configuration
    let settings = Settings::new_with_cli(&cli)?;
    let host = settings.server.host.clone();
    let port = settings.server.port;

    info!("Starting Host Agent on {}:{}", host, port);

    let metrics = Arc::new(MetricsCollector::new()?);
    let orchestrator = Arc::new(Orchestrator::from_settings(&settings, Some(metrics.clone())).await);

    let agents = orchestrator.get_all_agents_status().await;
    info!(
        "Registered {} agents: {}",
        agents.len(),
        agents.iter().map(|a| a.id.as_str()).collect::<Vec<_>>().join(", ")
    );

    // Background health refresh
    let _monitor = settings.health.interval().map(|interval| {
        info!("Refreshing agent health every {:?}", interval);
        HealthMonitor::new(orchestrator.registry().clone(), interval).spawn()
    });

    // Create application using the library function
    let app = host_agent::create_app(orchestrator, metrics);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
