//! API Process Entry Point
//!
//! Builds the economy and abuse-control services and keeps the background
//! sweeper running until shutdown. Uses `anyhow` for startup errors;
//! request-level errors are `kernel::error::AppError`.

use std::sync::Arc;

use api::config::AppConfig;
use api::state::AppState;
use economy::PgEconomyStore;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,economy=info,guard=info,platform=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    tracing::info!("Connected to database");

    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let sweep_interval = config.guard.sweep_interval;
    let economy_fee_bps = config.economy.platform_fee_bps;
    let state = AppState::new(
        Arc::new(PgEconomyStore::new(pool.clone())),
        config.economy,
        config.guard,
    );

    let sweeper = guard::spawn_sweeper(state.guard.clone(), sweep_interval);

    match state.guard.stats().await {
        Ok(stats) => {
            tracing::info!(
                platform_fee_bps = economy_fee_bps,
                rate_limit_entries = stats.rate_limit_entries,
                captcha_entries = stats.captcha_entries,
                "Economy and guard services ready"
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "Guard stats unavailable, continuing anyway");
        }
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    sweeper.abort();
    pool.close().await;

    Ok(())
}
