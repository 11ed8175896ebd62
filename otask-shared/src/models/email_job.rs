/// Email outbox model
///
/// Outbox rows are the durable handoff between the API and the delivery
/// worker. The API appends a row after the business transaction commits; the
/// worker claims batches and transitions them through
/// `pending -> sending -> sent` (or `failed` after the retry cap).
///
/// # Schema
///
/// ```sql
/// CREATE TYPE email_status AS ENUM ('pending', 'sending', 'sent', 'failed');
///
/// CREATE TABLE email_outbox (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     recipient CITEXT NOT NULL,
///     subject VARCHAR(512) NOT NULL,
///     body TEXT NOT NULL,
///     status email_status NOT NULL DEFAULT 'pending',
///     attempts INT NOT NULL DEFAULT 0,
///     last_error TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     claimed_at TIMESTAMPTZ,
///     sent_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Delivery state of an outbox row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "email_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    /// Waiting to be claimed by a worker
    Pending,

    /// Claimed, delivery in progress
    Sending,

    /// Delivered to the SMTP relay
    Sent,

    /// Gave up after exhausting the retry cap
    Failed,
}

impl EmailStatus {
    /// Converts status to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Pending => "pending",
            EmailStatus::Sending => "sending",
            EmailStatus::Sent => "sent",
            EmailStatus::Failed => "failed",
        }
    }
}

/// An email queued for delivery
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EmailJob {
    /// Unique job ID (UUID v4)
    pub id: Uuid,

    /// Recipient address
    pub recipient: String,

    /// Message subject
    pub subject: String,

    /// Plain-text message body
    pub body: String,

    /// Delivery state
    pub status: EmailStatus,

    /// Delivery attempts so far
    pub attempts: i32,

    /// Error from the most recent failed attempt
    pub last_error: Option<String>,

    /// When the job was enqueued
    pub created_at: DateTime<Utc>,

    /// When the job was last claimed by a worker (None until claimed)
    pub claimed_at: Option<DateTime<Utc>>,

    /// When the job was delivered (None until sent)
    pub sent_at: Option<DateTime<Utc>>,
}

/// Input for enqueueing an email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEmailJob {
    /// Recipient address
    pub recipient: String,

    /// Message subject
    pub subject: String,

    /// Plain-text message body
    pub body: String,
}

impl EmailJob {
    /// Appends a new pending job to the outbox
    pub async fn enqueue(pool: &PgPool, data: CreateEmailJob) -> Result<Self, sqlx::Error> {
        let job = sqlx::query_as::<_, EmailJob>(
            r#"
            INSERT INTO email_outbox (recipient, subject, body)
            VALUES ($1, $2, $3)
            RETURNING id, recipient, subject, body, status, attempts,
                      last_error, created_at, claimed_at, sent_at
            "#,
        )
        .bind(data.recipient)
        .bind(data.subject)
        .bind(data.body)
        .fetch_one(pool)
        .await?;

        Ok(job)
    }

    /// Finds a job by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let job = sqlx::query_as::<_, EmailJob>(
            r#"
            SELECT id, recipient, subject, body, status, attempts,
                   last_error, created_at, claimed_at, sent_at
            FROM email_outbox
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_as_str() {
        assert_eq!(EmailStatus::Pending.as_str(), "pending");
        assert_eq!(EmailStatus::Sending.as_str(), "sending");
        assert_eq!(EmailStatus::Sent.as_str(), "sent");
        assert_eq!(EmailStatus::Failed.as_str(), "failed");
    }
}
