//! # OTask Delivery Worker
//!
//! Drains the email outbox and delivers invitation emails over SMTP.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p otask-worker
//! ```

use otask_worker::{
    config::WorkerConfig,
    mailer::SmtpMailer,
    orchestrator::DeliveryOrchestrator,
    queue::OutboxQueue,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "otask_worker=info,otask_shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("OTask Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;

    let pool = otask_shared::db::create_pool(otask_shared::db::DatabaseConfig {
        url: config.database_url.clone(),
        max_connections: config.database_max_connections,
        ..Default::default()
    })
    .await?;

    let mailer = Arc::new(SmtpMailer::new(&config.smtp)?);
    let queue = OutboxQueue::with_limits(
        pool,
        config.orchestrator.batch_size,
        config.max_attempts,
    );

    let orchestrator =
        DeliveryOrchestrator::with_config(queue, mailer, config.orchestrator.clone());
    let shutdown = orchestrator.shutdown_token();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        shutdown.cancel();
    });

    orchestrator.run().await?;

    Ok(())
}
