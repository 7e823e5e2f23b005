//! # Tallyboard Worker
//!
//! Runs the maintenance sweeps on a fixed interval:
//!
//! - Sent invoices past their due date become overdue
//! - Expired invitations are revoked
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/tallyboard \
//! SWEEP_INTERVAL_SECS=300 \
//! cargo run -p tallyboard-worker
//! ```

use tallyboard_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use tallyboard_worker::{config::WorkerConfig, runner::SweepRunner, sweeps::default_sweeps};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tallyboard_worker=debug,tallyboard_shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Tallyboard Worker v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = WorkerConfig::from_env()?;

    let pool = create_pool(DatabaseConfig {
        max_connections: config.max_connections,
        min_connections: 0,
        ..DatabaseConfig::from_url(&config.database_url)
    })
    .await?;

    let runner = SweepRunner::new(pool.clone(), default_sweeps(), config.sweep_interval);

    let shutdown = runner.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
        shutdown.cancel();
    });

    runner.run().await;

    close_pool(pool).await;
    Ok(())
}
