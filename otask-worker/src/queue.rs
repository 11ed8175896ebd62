/// Email outbox reader
///
/// This module handles polling the database for pending outbox rows and
/// providing them to the delivery orchestrator.
///
/// # Architecture
///
/// The outbox reader:
/// 1. Polls database for jobs in "pending" state
/// 2. Claims jobs atomically (updates state to "sending")
/// 3. Returns claimed jobs to the orchestrator
///
/// # Polling Strategy
///
/// - Poll interval: 1 second (configurable)
/// - Batch size: 10 jobs (configurable)
/// - Ordering: FIFO (created_at ASC)
///
/// Claiming uses `FOR UPDATE SKIP LOCKED` so multiple worker processes can
/// run against the same outbox without handing the same row to two of them.
/// A claim stamps `claimed_at`; rows left in "sending" past the stale-claim
/// window (a worker died mid-send) become claimable again.

use otask_shared::models::email_job::{EmailJob, EmailStatus};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

/// Outbox queue error
#[derive(Debug, Error)]
pub enum QueueError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Job not found (or no longer in the expected state)
    #[error("Email job not found: {0}")]
    JobNotFound(Uuid),
}

/// Email outbox reader
///
/// Polls the outbox for pending jobs and claims them for delivery.
pub struct OutboxQueue {
    /// Database connection pool
    db: PgPool,

    /// Maximum jobs to claim in one batch
    batch_size: usize,

    /// Attempts after which a job is parked as failed
    max_attempts: i32,

    /// Age after which a "sending" claim is considered abandoned
    stale_claim_seconds: f64,
}

/// A claim older than this belongs to a worker that died mid-send
const DEFAULT_STALE_CLAIM_SECONDS: f64 = 300.0;

impl OutboxQueue {
    /// Creates a new outbox queue with default batch size and retry cap
    pub fn new(db: PgPool) -> Self {
        OutboxQueue {
            db,
            batch_size: 10,
            max_attempts: 5,
            stale_claim_seconds: DEFAULT_STALE_CLAIM_SECONDS,
        }
    }

    /// Creates a new outbox queue with custom batch size and retry cap
    pub fn with_limits(db: PgPool, batch_size: usize, max_attempts: i32) -> Self {
        OutboxQueue {
            db,
            batch_size,
            max_attempts,
            stale_claim_seconds: DEFAULT_STALE_CLAIM_SECONDS,
        }
    }

    /// Claims pending jobs for delivery
    ///
    /// Atomically transitions jobs from "pending" to "sending" and returns
    /// them. Each claim also bumps the attempt counter, so a worker that
    /// crashes mid-send leaves an accurate count behind. Rows stranded in
    /// "sending" by such a crash are reclaimed once their claim is older
    /// than the stale-claim window.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn claim_jobs(&self, limit: Option<usize>) -> Result<Vec<EmailJob>, QueueError> {
        let limit = limit.unwrap_or(self.batch_size) as i64;

        let jobs = sqlx::query_as::<_, EmailJob>(
            r#"
            WITH claimable AS (
                SELECT id
                FROM email_outbox
                WHERE status = $1
                   OR (status = $3 AND claimed_at < NOW() - $4 * interval '1 second')
                ORDER BY created_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE email_outbox
            SET
                status = $3,
                attempts = email_outbox.attempts + 1,
                claimed_at = NOW()
            FROM claimable
            WHERE email_outbox.id = claimable.id
            RETURNING
                email_outbox.id,
                email_outbox.recipient,
                email_outbox.subject,
                email_outbox.body,
                email_outbox.status,
                email_outbox.attempts,
                email_outbox.last_error,
                email_outbox.created_at,
                email_outbox.claimed_at,
                email_outbox.sent_at
            "#,
        )
        .bind(EmailStatus::Pending)
        .bind(limit)
        .bind(EmailStatus::Sending)
        .bind(self.stale_claim_seconds)
        .fetch_all(&self.db)
        .await?;

        if !jobs.is_empty() {
            tracing::info!(count = jobs.len(), "Claimed email jobs");
        }

        Ok(jobs)
    }

    /// Marks a job as delivered
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::JobNotFound`] if the job is not in "sending"
    pub async fn mark_sent(&self, job_id: Uuid) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE email_outbox
            SET
                status = $2,
                sent_at = NOW(),
                last_error = NULL
            WHERE id = $1 AND status = $3
            "#,
        )
        .bind(job_id)
        .bind(EmailStatus::Sent)
        .bind(EmailStatus::Sending)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::JobNotFound(job_id));
        }

        tracing::info!(job_id = %job_id, "Email marked as sent");
        Ok(())
    }

    /// Records a delivery failure
    ///
    /// Jobs below the retry cap go back to "pending" to be retried on a
    /// later poll; jobs at the cap are parked as "failed".
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::JobNotFound`] if the job is not in "sending"
    pub async fn mark_failed(&self, job_id: Uuid, error: String) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE email_outbox
            SET
                status = CASE WHEN attempts >= $4 THEN $5 ELSE $2 END,
                last_error = $3
            WHERE id = $1 AND status = $6
            "#,
        )
        .bind(job_id)
        .bind(EmailStatus::Pending)
        .bind(error)
        .bind(self.max_attempts)
        .bind(EmailStatus::Failed)
        .bind(EmailStatus::Sending)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::JobNotFound(job_id));
        }

        tracing::warn!(job_id = %job_id, "Email delivery failed");
        Ok(())
    }
}
