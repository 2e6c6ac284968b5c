use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use server::config::AppConfig;
use server::database::init_db;
use server::ingest::{IngestOptions, IngestService, IngestionCoordinator};
use server::state::AppState;
use server::store::{ReportStore, SeaOrmReportStore};
use wcl::ReportFetcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("Failed to load config")?;

    let db = init_db(&config.database)
        .await
        .context("Failed to initialize database")?;
    info!("Database ready");

    let fetcher = ReportFetcher::from_config(&config.wcl).context("Failed to build HTTP client")?;
    let store: Arc<dyn ReportStore> = Arc::new(SeaOrmReportStore::new(db.clone()));
    let coordinator = IngestionCoordinator::new(
        Arc::new(fetcher),
        Arc::clone(&store),
        IngestOptions::from(&config.ingest),
    );
    let ingest = Arc::new(IngestService::new(db.clone(), coordinator, store));
    ingest
        .recover()
        .await
        .context("Failed to recover interrupted runs")?;

    info!(
        mode = %config.ingest.mode,
        fight_concurrency = config.ingest.fight_concurrency,
        "Ingestion service ready"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let state = AppState {
        db,
        config,
        ingest: Arc::clone(&ingest),
    };
    let app = server::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    ingest.shutdown().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
