use std::sync::Arc;

use arbor_core::config::StorageBackend;
use arbor_core::{ArborConfig, GraphStore, InMemoryGraphStore, PgGraphStore};
use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use arbor_server::server;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "arbor.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match ArborConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG overrides the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.service.log_level.as_str()));
    fmt().with_env_filter(filter).init();

    let store: Arc<dyn GraphStore> = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on shutdown");
            Arc::new(InMemoryGraphStore::new())
        }
        StorageBackend::Postgres => {
            let pool = match arbor_core::db::create_pool(&config.database).await {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("Failed to connect to database: {}", e);
                    std::process::exit(1);
                }
            };
            if !args.health {
                arbor_core::db::init_schema(&pool).await?;
            }
            Arc::new(PgGraphStore::new(pool))
        }
    };

    if args.health {
        match store.health().await {
            Ok(v) => println!("✅ {} storage reachable: {}", store.name(), v),
            Err(e) => {
                println!("❌ {} storage check failed: {}", store.name(), e);
                std::process::exit(1);
            }
        }

        println!("✅ Arbor health check passed");
        return Ok(());
    }

    // IPC Server
    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!("Failed to listen for Ctrl+C: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    // HTTP REST API server if enabled
    if config.http.enabled {
        let http_store = store.clone();
        let http_config = config.clone();
        let http_shutdown = tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) =
                arbor_server::http::start_http_server(http_store, http_config, http_shutdown).await
            {
                tracing::error!("HTTP server error: {}", e);
            }
        });
    }

    let socket_path = config.service.socket_path.clone();
    server::run_unix_server(&socket_path, store, config, tx.subscribe()).await?;

    Ok(())
}
