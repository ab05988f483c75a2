use std::{str::FromStr, sync::Arc, time::Duration};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::{api, config::Settings, service::ServiceContext};

const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!("Starting storefront server on {}:{}", settings.server.host, settings.server.port);

    // Initialize database
    let connect_options = SqliteConnectOptions::from_str(&settings.database.url)?
        .foreign_keys(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect_with(connect_options)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    tokio::fs::create_dir_all(&settings.server.uploads_dir).await?;

    let (service_context, expired_rx) = ServiceContext::new(db_pool.clone(), &settings);
    let service_context = Arc::new(service_context);

    let expiration_worker = service_context.spawn_expiration_worker(expired_rx, &settings);

    let shutdown = CancellationToken::new();
    spawn_session_cleanup(service_context.clone(), shutdown.clone());

    let app = api::create_app(service_context.clone(), Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    shutdown.cancel();
    service_context.expirations.shutdown();
    expiration_worker.abort();
    db_pool.close().await;

    Ok(())
}

fn spawn_session_cleanup(service_context: Arc<ServiceContext>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    match service_context.auth_service.cleanup_expired_sessions().await {
                        Ok(0) => {}
                        Ok(removed) => tracing::info!(removed, "Cleaned up expired sessions"),
                        Err(e) => tracing::warn!(error = %e, "Session cleanup failed"),
                    }
                }
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
