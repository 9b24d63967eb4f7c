//! # Authorization HTTP Server
//!
//! Side-car HTTP server for the Casegate authorization engine.
//! Serves authorization checks, query predicates, permission lookups, health
//! and metrics. See [`casegate_authz::server`] for the endpoint list.
//!
//! ## Configuration
//!
//! TOML file read from `CASEGATE_CONFIG` (default `casegate.toml` when present).
//! Environment variables:
//! - `PORT` - HTTP server port (overrides `server.port`)
//! - `DATABASE_URL` - PostgreSQL URL (overrides `storage.database_url`)
//! - `RUST_LOG` - Log filter (default: `server.log_level`)

use anyhow::Context;
use axum::serve;
use casegate_authz::config::{AuthzConfig, StorageBackend};
use casegate_authz::server::{create_metrics_router, create_router, AppState};
use casegate_authz::{
    Evaluator, EvaluatorConfig, GrantStore, InMemoryGrantStore, NoResolver, QueryPredicateBuilder,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }

    info!("Starting graceful shutdown");
}

/// Grant store selected by `storage.backend`
async fn open_grant_store(
    config: &AuthzConfig,
    registry: Arc<casegate_authz::PermissionRegistry>,
) -> anyhow::Result<Arc<dyn GrantStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            let store = InMemoryGrantStore::new(registry);
            config
                .seed(&store, chrono::Utc::now())
                .await
                .context("Failed to seed memory grant store")?;
            info!(
                "Memory grant store seeded with {} roles and {} profiles",
                config.roles.len(),
                config.profiles.len()
            );
            Ok(Arc::new(store))
        }
        #[cfg(feature = "postgres")]
        StorageBackend::Postgres => {
            let url = config
                .storage
                .database_url
                .as_deref()
                .context("storage.database_url is required for the postgres backend")?;
            let store = casegate_authz::grant::PostgresGrantStore::new(url, registry)
                .await
                .context("Failed to connect grant store")?;
            store.run_migrations().await.context("Failed to run migrations")?;
            if !config.roles.is_empty() || !config.profiles.is_empty() {
                warn!("Seed roles and profiles are ignored by the postgres backend");
            }
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        StorageBackend::Postgres => {
            anyhow::bail!("Built without the `postgres` feature")
        }
    }
}

/// Main server entrypoint
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AuthzConfig::from_env().context("Failed to load configuration")?;

    // Initialize tracing subscriber
    let default_filter = config.server.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Casegate Authorization Server v{}", casegate_authz::VERSION);

    info!("Configuration:");
    info!("  Port: {}", config.server.port);
    info!("  Metrics Port: {}", config.server.metrics_port);
    info!("  Storage: {:?}", config.storage.backend);

    let registry = Arc::new(config.build_registry()?);
    info!("Registered {} permissions", registry.len());

    let grants = open_grant_store(&config, registry.clone()).await?;

    // Attributes arrive inline with each request; there is no upstream registry to ask
    let resolver = Arc::new(NoResolver);

    let evaluator = Evaluator::new(EvaluatorConfig::default(), registry.clone(), grants.clone(), resolver);
    let predicates = QueryPredicateBuilder::new(registry, grants);

    info!("Authorization engine initialized successfully");

    let state = AppState::new(Arc::new(evaluator), Arc::new(predicates));

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid server.host: {}", config.server.host))?;

    let app = create_router(state.clone());
    let addr = SocketAddr::new(host, config.server.port);

    let metrics_app = create_metrics_router(state);
    let metrics_addr = SocketAddr::new(host, config.server.metrics_port);

    info!("Starting HTTP server on {}", addr);
    info!("Starting metrics server on {}", metrics_addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server on {}", addr))?;

    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr)
        .await
        .with_context(|| format!("Failed to bind metrics server on {}", metrics_addr))?;

    let server = serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    let metrics_server = serve(metrics_listener, metrics_app.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    let result = tokio::try_join!(
        async {
            server.await.map_err(|e| {
                error!("HTTP server error: {}", e);
                e
            })
        },
        async {
            metrics_server.await.map_err(|e| {
                error!("Metrics server error: {}", e);
                e
            })
        }
    );

    match result {
        Ok(_) => {
            info!("Servers shut down gracefully");
            Ok(())
        }
        Err(e) => {
            error!("Server error: {}", e);
            Err(e.into())
        }
    }
}
