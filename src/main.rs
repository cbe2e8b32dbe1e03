use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use quire::app::{router, AppState};
use quire::config::{AppConfig, StoreBackend};
use quire::content::service::DocumentService;
use quire::db::memory::InMemoryDocumentStore;
use quire::db::repository::{DocumentStore, MongoDocumentStore};

/// Content API with unique slugs and validated page hierarchies.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, env = "QUIRE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quire=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    tracing::info!("Starting Quire server...");

    let store: Arc<dyn DocumentStore> = match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store, documents are lost on restart");
            Arc::new(InMemoryDocumentStore::new())
        }
        StoreBackend::Mongo => {
            let client = mongodb::Client::with_uri_str(&config.store.mongodb_uri).await?;
            let db = client.database(&config.store.database);
            tracing::info!("Connected to MongoDB database '{}'", config.store.database);
            Arc::new(MongoDocumentStore::new(&db))
        }
    };

    let service = DocumentService::new(
        store,
        config.collections.clone(),
        config.slug.clone(),
        config.hierarchy.clone(),
    );
    service.ensure_indexes().await?;

    let app = router(AppState {
        service: Arc::new(service),
    });

    tracing::info!("Listening on http://{}", config.server.addr);
    let listener = tokio::net::TcpListener::bind(&config.server.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    tracing::info!("Shutting down");
}
