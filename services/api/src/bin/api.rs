//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, MemoryAdapter, OpenAiGenerationAdapter},
    config::{Config, ConfigError},
    error::ApiError,
    web::{router, AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use reading_club_core::FixedWindowLimiter;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize the Generation Backend ---
    let api_key = config
        .openai_api_key
        .as_ref()
        .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;
    let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(api_base) = &config.openai_api_base {
        openai_config = openai_config.with_api_base(api_base);
    }
    let generator = Arc::new(OpenAiGenerationAdapter::new(Client::with_config(
        openai_config,
    )));

    // --- 3. Connect to Storage & Build the Shared AppState ---
    let app_state = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let db_adapter = Arc::new(DbAdapter::new(db_pool));
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            AppState::new(
                config.clone(),
                db_adapter.clone(),
                db_adapter.clone(),
                db_adapter,
                generator,
            )
        }
        None => {
            warn!("DATABASE_URL is not set; using in-memory storage. Nothing will survive a restart.");
            let memory = Arc::new(MemoryAdapter::new());
            AppState::new(
                config.clone(),
                memory.clone(),
                memory.clone(),
                memory,
                generator,
            )
        }
    };
    let app_state = Arc::new(app_state);

    // --- 4. Background Work & Shutdown Wiring ---
    let shutdown = CancellationToken::new();
    if let Some(interval) = config.rate_limit_prune_interval {
        tokio::spawn(prune_rate_limits(
            app_state.limiters(),
            interval,
            shutdown.clone(),
        ));
    }

    // --- 5. Create the Web Router ---
    let cors_origin = config.cors_origin.parse::<HeaderValue>().map_err(|_| {
        ConfigError::InvalidValue(
            "CORS_ORIGIN".to_string(),
            format!("'{}' is not a valid origin", config.cors_origin),
        )
    })?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT])
        .expose_headers([
            HeaderName::from_static("x-conversation-id"),
            HeaderName::from_static("x-summary-available"),
        ]);
    let app = router(app_state).layer(cors);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Server stopped.");
    Ok(())
}

/// Resolves on ctrl-c and cancels the background tasks.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for the shutdown signal: {}", e);
    }
    info!("Shutdown signal received.");
    shutdown.cancel();
}

/// Drops expired rate-limit records on a fixed interval until shutdown.
async fn prune_rate_limits(
    limiters: [Arc<FixedWindowLimiter>; 2],
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let now = Instant::now();
                let pruned: usize = limiters.iter().map(|l| l.prune_expired(now)).sum();
                if pruned > 0 {
                    info!("Pruned {} expired rate-limit records.", pruned);
                }
            }
        }
    }
}
