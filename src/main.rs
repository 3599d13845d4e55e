use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use contacts_api::config::CacheBackendKind;
use contacts_api::revocation::RevocationStore;
use contacts_api::tokens::PasswordHasher;
use contacts_api::{api, config::Config, expiration, storage::Database, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "contacts-api starting");

    // Load configuration; a missing JWT_SECRET stops here
    let config = Config::load()?;
    info!(
        backend = ?config.cache.backend,
        policy = ?config.cache.policy,
        revocation_enabled = config.cache.enabled,
        "Loaded configuration"
    );

    // Initialize database
    let db = Database::open(&config.server.data_dir)?;
    info!("Database opened at: {}", config.server.data_dir);

    // Revocation store: connect eagerly so the first request does not pay for
    // the handshake. An unreachable cache is logged, not fatal.
    let revocations = RevocationStore::from_config(&config.cache);
    let status = revocations.connect().await;
    info!(status = status.as_str(), "Revocation store initialized");

    let passwords = PasswordHasher::new()?;

    // Create shared state
    let state = Arc::new(AppState::new(
        config.clone(),
        db,
        passwords,
        revocations,
    )?);

    // Start background tasks
    let sweeper_handle = if config.cache.backend == CacheBackendKind::Memory {
        expiration::start_revocation_sweeper(Arc::clone(&state))
    } else {
        None
    };

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    info!("Listening on: {}", config.server.bind_address);
    info!("CORS allowed for: {}", config.server.front_origin);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup: abort background tasks, release the cache connection
    info!("Shutting down background tasks");
    if let Some(handle) = sweeper_handle {
        handle.abort();
    }
    state.revocations.shutdown().await;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
