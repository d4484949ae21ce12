//! Notification pipeline
//!
//! Alert dispatch is decoupled from the operations that trigger it: the
//! detection pipeline hands sends to a bounded spawner and moves on, and
//! a background loop re-attempts messages that are still pending.

pub mod channels;
pub mod templates;
pub mod dispatcher;

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::Semaphore;

use crate::config::Config;
use channels::{Transport, Transports};
use dispatcher::AlertRequest;

/// Messages picked up per pending-sweep round
const RETRY_BATCH_SIZE: i64 = 50;
/// Concurrent best-effort sends in flight at once
const SEND_PERMITS: usize = 16;

/// Shared handle for everything that sends alerts
#[derive(Debug, Clone)]
pub struct Notifier {
    pub transports: Transports,
    pub max_retries: i32,
    send_permits: Arc<Semaphore>,
}

impl Notifier {
    pub fn from_config(config: &Config) -> Self {
        let production = config.is_production();
        Self {
            transports: Transports {
                sms: Transport::from_config(config.sms_gateway_url.as_deref(), production),
                email: Transport::from_config(config.email_gateway_url.as_deref(), production),
            },
            max_retries: config.message_max_retries,
            send_permits: Arc::new(Semaphore::new(SEND_PERMITS)),
        }
    }

    /// Fire-and-track alert send: bounded, logged, never surfaced to the
    /// caller. This is the only path detection uses to notify.
    pub fn spawn_alert(&self, pool: PgPool, req: AlertRequest) {
        let notifier = self.clone();
        tokio::spawn(async move {
            let _permit = match notifier.send_permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            let student_id = req.student_id;
            if let Err(err) = dispatcher::send_alert(&pool, &notifier, req).await {
                tracing::warn!(
                    "Best-effort alert for student {} not sent: {:?}",
                    student_id, err
                );
            }
        });
    }
}

/// Background pending-message sweep, started once from main
pub fn start_retry_loop(notifier: Arc<Notifier>, pool: PgPool, interval_secs: u64) {
    if interval_secs == 0 {
        tracing::info!("Message retry loop disabled");
        return;
    }

    tokio::spawn(async move {
        tracing::info!("Message retry loop started ({}s interval)", interval_secs);
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = dispatcher::process_pending(&pool, &notifier, RETRY_BATCH_SIZE).await {
                tracing::error!("Pending-message sweep failed: {:?}", err);
            }
        }
    });
}
