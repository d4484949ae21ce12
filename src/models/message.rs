//! Message model
//!
//! Guardian/staff notifications with one status column per channel.
//! The overall `status` is always the rollup computed by the dispatcher,
//! never set directly by delivery code.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub student_id: Uuid,
    pub guardian_id: Option<Uuid>,
    pub recipient_name: String,
    pub recipient_phone: Option<String>,
    pub recipient_email: Option<String>,
    pub channel: String,
    pub alert_kind: String,
    pub subject: Option<String>,
    pub body: String,
    pub status: String,
    pub sms_status: Option<String>,
    pub email_status: Option<String>,
    pub retry_count: i32,
    pub sent_by: Option<Uuid>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields persisted when a message is first created, before any attempt
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub student_id: Uuid,
    pub guardian_id: Option<Uuid>,
    pub recipient_name: String,
    pub recipient_phone: Option<String>,
    pub recipient_email: Option<String>,
    pub channel: String,
    pub alert_kind: String,
    pub subject: Option<String>,
    pub body: String,
    pub sms_status: Option<String>,
    pub email_status: Option<String>,
    pub sent_by: Option<Uuid>,
}

#[derive(Debug, Deserialize, Default)]
pub struct MessageFilter {
    pub student_id: Option<Uuid>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Message {
    pub async fn create(pool: &PgPool, data: NewMessage) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages
                (student_id, guardian_id, recipient_name, recipient_phone, recipient_email,
                 channel, alert_kind, subject, body, sms_status, email_status, sent_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#
        )
        .bind(data.student_id)
        .bind(data.guardian_id)
        .bind(&data.recipient_name)
        .bind(&data.recipient_phone)
        .bind(&data.recipient_email)
        .bind(&data.channel)
        .bind(&data.alert_kind)
        .bind(&data.subject)
        .bind(&data.body)
        .bind(&data.sms_status)
        .bind(&data.email_status)
        .bind(data.sent_by)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool, filter: MessageFilter) -> Result<Vec<Self>, sqlx::Error> {
        let limit = filter.limit.unwrap_or(50);
        let offset = filter.offset.unwrap_or(0);

        sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE ($1::uuid IS NULL OR student_id = $1)
              AND ($2::varchar IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        )
        .bind(filter.student_id)
        .bind(&filter.status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Messages the background sweep should re-attempt
    pub async fn list_retryable(
        pool: &PgPool,
        max_retries: i32,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE status = 'PENDING' AND retry_count < $1
            ORDER BY created_at ASC
            LIMIT $2
            "#
        )
        .bind(max_retries)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Persist the outcome of one delivery round: channel statuses, the
    /// rolled-up overall status and the attempt counter.
    pub async fn record_attempt(
        pool: &PgPool,
        id: Uuid,
        status: &str,
        sms_status: Option<&str>,
        email_status: Option<&str>,
        retry_count: i32,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"
            UPDATE messages
            SET status = $2,
                sms_status = $3,
                email_status = $4,
                retry_count = $5,
                sent_at = CASE WHEN $2 = 'SENT' AND sent_at IS NULL THEN NOW() ELSE sent_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(status)
        .bind(sms_status)
        .bind(email_status)
        .bind(retry_count)
        .fetch_optional(pool)
        .await
    }

    /// Manual retry: back to PENDING with a fresh attempt budget, channel
    /// statuses reset for every requested channel.
    pub async fn reset_for_retry(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"
            UPDATE messages
            SET status = 'PENDING',
                retry_count = 0,
                sms_status = CASE WHEN sms_status IS NULL THEN NULL ELSE 'PENDING' END,
                email_status = CASE WHEN email_status IS NULL THEN NULL ELSE 'PENDING' END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
