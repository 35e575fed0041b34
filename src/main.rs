//! Asset Vault Server
//!
//! Registers digital assets by fingerprint, pins their bytes to a content
//! store and records ownership on a ledger.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use asset_vault::config::{Config, LedgerProvider};
use asset_vault::ledger::{HttpLedger, Ledger, MemoryLedger};
use asset_vault::pipeline::{AssetPipeline, PipelineOptions};
use asset_vault::routes;
use asset_vault::session::{AccountSession, LedgerContext};
use asset_vault::state::AppState;
use asset_vault::store::{ContentStore, PinataStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "asset_vault=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Invalid configuration")?;

    tracing::info!("Starting Asset Vault Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Content store: {}", config.store.api_url);
    tracing::info!("Ledger network: {}", config.ledger.network);

    if !config.store.has_credentials() {
        tracing::warn!("Pinata credentials not set, uploads will fail");
    }
    if config.store.mock_fallback {
        tracing::warn!("Synthetic address fallback enabled, failed uploads will not be pinned");
    }

    // Initialize ledger
    let ledger: Arc<dyn Ledger> = match config.ledger.provider {
        LedgerProvider::Memory => {
            tracing::info!("Using in-memory ledger");
            Arc::new(MemoryLedger::new())
        }
        LedgerProvider::Http => {
            let url = config
                .ledger
                .url
                .as_deref()
                .context("LEDGER_URL is required for the http ledger")?;
            tracing::info!("Ledger gateway: {}", url);
            Arc::new(HttpLedger::new(url, &config.ledger.contract_address))
        }
    };

    let session = AccountSession::new(config.ledger.network.clone());
    let ledger_ctx = LedgerContext::connect(ledger, session)
        .await
        .context("Failed to read ledger capabilities")?;
    tracing::info!(
        version = ledger_ctx.capabilities().version,
        operations = ledger_ctx.capabilities().operations.len(),
        "Ledger connected"
    );

    // Initialize content store
    let store: Arc<dyn ContentStore> = Arc::new(PinataStore::new(&config.store));

    // Create application state
    let pipeline = AssetPipeline::new(store, ledger_ctx, PipelineOptions::from_config(&config));
    let app_state = AppState::new(config.clone(), pipeline);

    let app = routes::app(app_state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    tracing::info!("Asset Vault Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
