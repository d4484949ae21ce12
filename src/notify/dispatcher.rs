//! Notification dispatcher
//!
//! Renders and sends guardian alerts, one delivery attempt per requested
//! channel, each with its own status column. Channel failures are
//! absorbed here: the only way they surface is the status fields and the
//! log, never an error to the operation that asked for the alert.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Guardian, Message, NewMessage, Student};
use super::channels::{attempt, ChannelStatus};
use super::templates::{render, AlertKind};
use super::Notifier;

/// Requested delivery channel set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Sms,
    Email,
    Both,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "SMS",
            Channel::Email => "EMAIL",
            Channel::Both => "BOTH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SMS" => Some(Channel::Sms),
            "EMAIL" => Some(Channel::Email),
            "BOTH" => Some(Channel::Both),
            _ => None,
        }
    }

    pub fn wants_sms(&self) -> bool {
        matches!(self, Channel::Sms | Channel::Both)
    }

    pub fn wants_email(&self) -> bool {
        matches!(self, Channel::Email | Channel::Both)
    }
}

/// Overall message status, always derived from the channel statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Pending,
    Sent,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "PENDING",
            MessageStatus::Sent => "SENT",
            MessageStatus::Failed => "FAILED",
        }
    }
}

/// Monotone rollup of channel statuses: SENT as soon as any requested
/// channel succeeded, FAILED only once every requested channel failed and
/// the attempt budget is spent, PENDING otherwise.
pub fn rollup(
    channel: Channel,
    sms: Option<ChannelStatus>,
    email: Option<ChannelStatus>,
    retry_count: i32,
    max_retries: i32,
) -> MessageStatus {
    let mut requested = Vec::new();
    if channel.wants_sms() {
        requested.push(sms.unwrap_or(ChannelStatus::Pending));
    }
    if channel.wants_email() {
        requested.push(email.unwrap_or(ChannelStatus::Pending));
    }

    if requested.iter().any(|s| *s == ChannelStatus::Sent) {
        MessageStatus::Sent
    } else if !requested.is_empty()
        && requested.iter().all(|s| *s == ChannelStatus::Failed)
        && retry_count >= max_retries
    {
        MessageStatus::Failed
    } else {
        MessageStatus::Pending
    }
}

/// Which channels the next round should attempt: requested ones that have
/// not yet succeeded. Retries are channel-scoped; a SENT channel is done.
pub fn channels_to_attempt(
    channel: Channel,
    sms: Option<ChannelStatus>,
    email: Option<ChannelStatus>,
) -> (bool, bool) {
    (
        channel.wants_sms() && sms != Some(ChannelStatus::Sent),
        channel.wants_email() && email != Some(ChannelStatus::Sent),
    )
}

/// An explicit alert request from a handler or the detection pipeline
#[derive(Debug, Clone)]
pub struct AlertRequest {
    pub student_id: Uuid,
    pub channel: Channel,
    pub alert_kind: AlertKind,
    pub variables: HashMap<String, String>,
    pub actor_id: Option<Uuid>,
}

/// Resolve the guardian, render the template, persist the message and run
/// the first delivery round.
pub async fn send_alert(
    pool: &PgPool,
    notifier: &Notifier,
    req: AlertRequest,
) -> AppResult<Message> {
    let student = Student::find_by_id(pool, req.student_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;

    let guardian = Guardian::primary_contact(pool, student.id)
        .await?
        .ok_or_else(|| {
            AppError::ValidationError("Student has no guardian contact on file".to_string())
        })?;

    let reachable = (req.channel.wants_sms() && guardian.phone.as_deref().is_some_and(|p| !p.is_empty()))
        || (req.channel.wants_email() && guardian.email.as_deref().is_some_and(|e| !e.is_empty()));
    if !reachable {
        return Err(AppError::ValidationError(
            "Guardian has no contact details for the requested channel".to_string(),
        ));
    }

    let mut vars = req.variables;
    vars.insert("student_name".to_string(), student.full_name());
    vars.insert("guardian_name".to_string(), guardian.name.clone());
    let (subject, body) = render(req.alert_kind, &vars);

    let message = Message::create(
        pool,
        NewMessage {
            student_id: student.id,
            guardian_id: Some(guardian.id),
            recipient_name: guardian.name.clone(),
            recipient_phone: guardian.phone.clone(),
            recipient_email: guardian.email.clone(),
            channel: req.channel.as_str().to_string(),
            alert_kind: req.alert_kind.as_str().to_string(),
            subject: Some(subject),
            body,
            sms_status: req.channel.wants_sms().then(|| ChannelStatus::Pending.as_str().to_string()),
            email_status: req.channel.wants_email().then(|| ChannelStatus::Pending.as_str().to_string()),
            sent_by: req.actor_id,
        },
    )
    .await?;

    let message = deliver_round(pool, notifier, &message, false).await?;
    Ok(message)
}

/// Manual retry: fresh attempt budget, every requested channel re-attempted
pub async fn retry_message(pool: &PgPool, notifier: &Notifier, id: Uuid) -> AppResult<Message> {
    let message = Message::reset_for_retry(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found".to_string()))?;

    let message = deliver_round(pool, notifier, &message, false).await?;
    Ok(message)
}

/// Summary of one pending-message sweep
#[derive(Debug, Default, serde::Serialize)]
pub struct PendingSummary {
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
    pub still_pending: usize,
}

/// Re-attempt messages that are still PENDING with retry budget left.
/// Each message is isolated: a database error on one is logged and the
/// sweep moves on.
pub async fn process_pending(
    pool: &PgPool,
    notifier: &Notifier,
    batch_size: i64,
) -> AppResult<PendingSummary> {
    let pending = Message::list_retryable(pool, notifier.max_retries, batch_size).await?;

    let mut summary = PendingSummary::default();
    for message in pending {
        summary.processed += 1;
        match deliver_round(pool, notifier, &message, true).await {
            Ok(updated) => match updated.status.as_str() {
                "SENT" => summary.sent += 1,
                "FAILED" => summary.failed += 1,
                _ => summary.still_pending += 1,
            },
            Err(err) => {
                tracing::warn!("Retry of message {} failed: {:?}", message.id, err);
                summary.still_pending += 1;
            }
        }
    }

    if summary.processed > 0 {
        tracing::info!(
            "Pending sweep: {} processed, {} sent, {} failed, {} still pending",
            summary.processed, summary.sent, summary.failed, summary.still_pending
        );
    }
    Ok(summary)
}

/// One delivery round: attempt each requested, not-yet-sent channel,
/// update its status, roll up and persist. `increment` distinguishes the
/// background sweep (which spends retry budget) from first sends and
/// manual retries (which do not).
async fn deliver_round(
    pool: &PgPool,
    notifier: &Notifier,
    message: &Message,
    increment: bool,
) -> Result<Message, sqlx::Error> {
    let Some(channel) = Channel::parse(&message.channel) else {
        tracing::error!("Message {} has unknown channel '{}'", message.id, message.channel);
        return Ok(message.clone());
    };

    let mut sms = message.sms_status.as_deref().and_then(ChannelStatus::parse);
    let mut email = message.email_status.as_deref().and_then(ChannelStatus::parse);

    let (try_sms, try_email) = channels_to_attempt(channel, sms, email);

    if try_sms {
        sms = Some(
            attempt(
                &notifier.transports.sms,
                "sms",
                message.recipient_phone.as_deref(),
                None,
                &message.body,
            )
            .await,
        );
    }
    if try_email {
        email = Some(
            attempt(
                &notifier.transports.email,
                "email",
                message.recipient_email.as_deref(),
                message.subject.as_deref(),
                &message.body,
            )
            .await,
        );
    }

    let retry_count = if increment { message.retry_count + 1 } else { message.retry_count };
    let status = rollup(channel, sms, email, retry_count, notifier.max_retries);

    let updated = Message::record_attempt(
        pool,
        message.id,
        status.as_str(),
        sms.map(|s| s.as_str()),
        email.map(|s| s.as_str()),
        retry_count,
    )
    .await?;

    Ok(updated.unwrap_or_else(|| message.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sent_on_any_channel_wins() {
        // SMS delivered, email down: the message is SENT overall while the
        // email column keeps its FAILED status for a channel-scoped retry.
        let status = rollup(
            Channel::Both,
            Some(ChannelStatus::Sent),
            Some(ChannelStatus::Failed),
            0,
            3,
        );
        assert_eq!(status, MessageStatus::Sent);
    }

    #[test]
    fn failed_only_after_budget_is_spent() {
        let all_failed = (Some(ChannelStatus::Failed), Some(ChannelStatus::Failed));

        let status = rollup(Channel::Both, all_failed.0, all_failed.1, 1, 3);
        assert_eq!(status, MessageStatus::Pending);

        let status = rollup(Channel::Both, all_failed.0, all_failed.1, 3, 3);
        assert_eq!(status, MessageStatus::Failed);
    }

    #[test]
    fn single_channel_rollup_ignores_the_other() {
        let status = rollup(Channel::Sms, Some(ChannelStatus::Sent), None, 0, 3);
        assert_eq!(status, MessageStatus::Sent);

        let status = rollup(Channel::Email, None, Some(ChannelStatus::Failed), 3, 3);
        assert_eq!(status, MessageStatus::Failed);
    }

    #[test]
    fn fresh_message_is_pending() {
        let status = rollup(Channel::Both, Some(ChannelStatus::Pending), Some(ChannelStatus::Pending), 0, 3);
        assert_eq!(status, MessageStatus::Pending);
    }

    #[test]
    fn retry_skips_delivered_channels() {
        let (try_sms, try_email) = channels_to_attempt(
            Channel::Both,
            Some(ChannelStatus::Sent),
            Some(ChannelStatus::Failed),
        );
        assert!(!try_sms);
        assert!(try_email);
    }

    #[test]
    fn attempt_plan_respects_requested_channel() {
        let (try_sms, try_email) = channels_to_attempt(Channel::Sms, Some(ChannelStatus::Pending), None);
        assert!(try_sms);
        assert!(!try_email);
    }

    #[test]
    fn channel_codes_round_trip() {
        for channel in [Channel::Sms, Channel::Email, Channel::Both] {
            assert_eq!(Channel::parse(channel.as_str()), Some(channel));
        }
        assert_eq!(Channel::parse("FAX"), None);
    }
}
