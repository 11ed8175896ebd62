/// SMTP delivery
///
/// The orchestrator talks to a [`Mailer`] trait so tests can swap in a mock.
/// The real implementation wraps lettre's async SMTP transport. When no SMTP
/// host is configured it runs in no-op mode and only logs, which keeps
/// development environments working without mail infrastructure.

use async_trait::async_trait;
use lettre::{
    message::{header, Mailbox, Message},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use otask_shared::models::email_job::EmailJob;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Mailer error
#[derive(Debug, Error)]
pub enum MailerError {
    /// Malformed sender or recipient address
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Failed to assemble the message
    #[error("Failed to build email message: {0}")]
    Build(#[from] lettre::error::Error),

    /// SMTP transport failure
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Delivery backend for outbox jobs
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers a single outbox job
    async fn send(&self, job: &EmailJob) -> Result<(), MailerError>;
}

/// SMTP configuration for the worker
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP relay host (empty = no-op mode)
    pub host: String,

    /// SMTP relay port
    pub port: u16,

    /// Optional username for SMTP AUTH
    pub username: Option<String>,

    /// Optional password for SMTP AUTH
    pub password: Option<String>,

    /// Sender address for all outgoing mail
    pub from: String,

    /// Use STARTTLS instead of implicit TLS
    pub use_starttls: bool,
}

/// lettre-backed SMTP mailer
#[derive(Clone)]
pub struct SmtpMailer {
    transport: Option<Arc<AsyncSmtpTransport<Tokio1Executor>>>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds a mailer from configuration
    ///
    /// If the SMTP host is empty, the mailer operates in no-op mode (logs
    /// only). Useful for development and testing without email
    /// infrastructure.
    pub fn new(config: &SmtpConfig) -> Result<Self, MailerError> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| MailerError::InvalidAddress(format!("SMTP_FROM: {}", e)))?;

        let transport = if config.host.trim().is_empty() {
            warn!("SMTP host not configured; mailer will operate in no-op mode");
            None
        } else {
            let builder = if config.use_starttls {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            } else {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            }?
            .port(config.port);

            let builder = if let (Some(username), Some(password)) =
                (&config.username, &config.password)
            {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            } else {
                builder
            };

            Some(Arc::new(builder.build()))
        };

        Ok(Self { transport, from })
    }

    /// Whether a real SMTP transport is configured
    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, job: &EmailJob) -> Result<(), MailerError> {
        let Some(transport) = &self.transport else {
            info!(
                job_id = %job.id,
                recipient = %job.recipient,
                "Mailer in no-op mode; skipping actual send"
            );
            return Ok(());
        };

        let to = job
            .recipient
            .parse::<Mailbox>()
            .map_err(|e| MailerError::InvalidAddress(format!("recipient: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&job.subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(job.body.clone())?;

        transport.send(message).await?;
        info!(job_id = %job.id, "Email sent");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn noop_config() -> SmtpConfig {
        SmtpConfig {
            host: String::new(),
            port: 587,
            username: None,
            password: None,
            from: "OTask <noreply@otask.dev>".to_string(),
            use_starttls: true,
        }
    }

    #[test]
    fn test_noop_mode_when_host_empty() {
        let mailer = SmtpMailer::new(&noop_config()).unwrap();
        assert!(!mailer.is_enabled());
    }

    #[test]
    fn test_invalid_from_address_rejected() {
        let mut config = noop_config();
        config.from = "not an address".to_string();

        assert!(matches!(
            SmtpMailer::new(&config),
            Err(MailerError::InvalidAddress(_))
        ));
    }

    fn sample_job() -> EmailJob {
        use chrono::Utc;
        use otask_shared::models::email_job::EmailStatus;
        use uuid::Uuid;

        EmailJob {
            id: Uuid::new_v4(),
            recipient: "someone@example.com".to_string(),
            subject: "Hello".to_string(),
            body: "World".to_string(),
            status: EmailStatus::Sending,
            attempts: 1,
            last_error: None,
            created_at: Utc::now(),
            claimed_at: None,
            sent_at: None,
        }
    }

    #[tokio::test]
    async fn test_noop_send_succeeds() {
        let mailer = SmtpMailer::new(&noop_config()).unwrap();
        mailer.send(&sample_job()).await.unwrap();
    }

    #[tokio::test]
    async fn test_mock_mailer_records_sends() {
        let mailer = mock::MockMailer::new();
        let job = sample_job();

        mailer.send(&job).await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, job.id);
    }

    #[tokio::test]
    async fn test_mock_mailer_failing_mode() {
        let mailer = mock::MockMailer::failing();

        let result = mailer.send(&sample_job()).await;

        assert!(matches!(result, Err(MailerError::InvalidAddress(_))));
        assert!(mailer.sent.lock().unwrap().is_empty());
    }
}
