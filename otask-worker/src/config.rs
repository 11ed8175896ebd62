/// Configuration management for the delivery worker
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `SMTP_HOST`: SMTP relay host (empty = no-op mode)
/// - `SMTP_PORT`: SMTP relay port (default: 587)
/// - `SMTP_USERNAME`: Optional SMTP AUTH username
/// - `SMTP_PASSWORD`: Optional SMTP AUTH password
/// - `SMTP_FROM`: Sender address (default: OTask <noreply@otask.dev>)
/// - `SMTP_STARTTLS`: Use STARTTLS instead of implicit TLS (default: true)
/// - `WORKER_POLL_INTERVAL_SECS`: Outbox poll interval (default: 1)
/// - `WORKER_BATCH_SIZE`: Jobs claimed per poll (default: 10)
/// - `EMAIL_MAX_ATTEMPTS`: Retry cap before parking as failed (default: 5)
/// - `RUST_LOG`: Log level (default: info)

use crate::mailer::SmtpConfig;
use crate::orchestrator::OrchestratorConfig;
use std::env;

/// Complete worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// PostgreSQL connection URL
    pub database_url: String,

    /// Maximum number of connections in pool
    pub database_max_connections: u32,

    /// SMTP transport configuration
    pub smtp: SmtpConfig,

    /// Poll loop configuration
    pub orchestrator: OrchestratorConfig,

    /// Attempts after which a job is parked as failed
    pub max_attempts: i32,
}

impl WorkerConfig {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or have invalid
    /// values.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()?;

        let smtp = SmtpConfig {
            host: env::var("SMTP_HOST").unwrap_or_default(),
            port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse::<u16>()?,
            username: env::var("SMTP_USERNAME").ok(),
            password: env::var("SMTP_PASSWORD").ok(),
            from: env::var("SMTP_FROM")
                .unwrap_or_else(|_| "OTask <noreply@otask.dev>".to_string()),
            use_starttls: env::var("SMTP_STARTTLS")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        };

        let orchestrator = OrchestratorConfig {
            poll_interval_secs: env::var("WORKER_POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "1".to_string())
                .parse::<u64>()?,
            batch_size: env::var("WORKER_BATCH_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse::<usize>()?,
        };

        let max_attempts = env::var("EMAIL_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<i32>()?;

        Ok(Self {
            database_url,
            database_max_connections,
            smtp,
            orchestrator,
            max_attempts,
        })
    }
}
