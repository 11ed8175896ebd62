/// Delivery orchestrator
///
/// This module implements the main worker loop that coordinates email
/// delivery. It polls the outbox, hands claimed jobs to the mailer, and
/// records the outcome.
///
/// # Architecture
///
/// ```text
/// DeliveryOrchestrator
///   ├─> OutboxQueue: Claim pending jobs
///   ├─> Mailer: Deliver each job
///   └─> OutboxQueue: mark_sent / mark_failed
/// ```
///
/// Jobs in a batch are delivered sequentially; throughput here is bounded
/// by the SMTP relay, not the worker. Failed jobs go back to pending until
/// the retry cap, after which they are parked as failed.

use crate::mailer::Mailer;
use crate::queue::OutboxQueue;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

/// Delivery orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Poll interval in seconds
    pub poll_interval_secs: u64,

    /// Job claim batch size
    pub batch_size: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            poll_interval_secs: 1,
            batch_size: 10,
        }
    }
}

/// Delivery orchestrator
///
/// Coordinates email delivery by polling the outbox, dispatching to the
/// mailer, and recording outcomes.
pub struct DeliveryOrchestrator {
    /// Outbox queue
    queue: OutboxQueue,

    /// Delivery backend
    mailer: Arc<dyn Mailer>,

    /// Configuration
    config: OrchestratorConfig,

    /// Shutdown token
    shutdown_token: CancellationToken,
}

impl DeliveryOrchestrator {
    /// Creates a new delivery orchestrator
    pub fn new(queue: OutboxQueue, mailer: Arc<dyn Mailer>) -> Self {
        Self::with_config(queue, mailer, OrchestratorConfig::default())
    }

    /// Creates a new delivery orchestrator with custom configuration
    pub fn with_config(
        queue: OutboxQueue,
        mailer: Arc<dyn Mailer>,
        config: OrchestratorConfig,
    ) -> Self {
        DeliveryOrchestrator {
            queue,
            mailer,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Gets shutdown token
    ///
    /// Used to signal graceful shutdown from external handlers.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs the worker loop
    ///
    /// Continuously polls for jobs and delivers them until shutdown. The
    /// current batch is always finished before the loop exits, so a claimed
    /// job is never abandoned in "sending".
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!("Delivery orchestrator starting");

        loop {
            if self.shutdown_token.is_cancelled() {
                tracing::info!("Delivery orchestrator shut down");
                break;
            }

            let jobs = match self.queue.claim_jobs(Some(self.config.batch_size)).await {
                Ok(jobs) => jobs,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim email jobs");
                    sleep(Duration::from_secs(self.config.poll_interval_secs)).await;
                    continue;
                }
            };

            if jobs.is_empty() {
                tokio::select! {
                    _ = self.shutdown_token.cancelled() => {}
                    _ = sleep(Duration::from_secs(self.config.poll_interval_secs)) => {}
                }
                continue;
            }

            for job in jobs {
                self.deliver(job).await;
            }
        }

        Ok(())
    }

    /// Delivers one claimed job and records the outcome
    async fn deliver(&self, job: otask_shared::models::email_job::EmailJob) {
        let job_id = job.id;

        match self.mailer.send(&job).await {
            Ok(()) => {
                if let Err(e) = self.queue.mark_sent(job_id).await {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to mark job as sent");
                }
            }
            Err(e) => {
                tracing::warn!(
                    job_id = %job_id,
                    attempts = job.attempts,
                    error = %e,
                    "Email delivery failed"
                );
                if let Err(e) = self.queue.mark_failed(job_id, e.to_string()).await {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to record delivery failure");
                }
            }
        }
    }
}
