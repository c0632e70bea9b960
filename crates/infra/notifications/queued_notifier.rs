use std::{sync::Arc, time::Duration};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::{
    domain::{
        repositories::notifications::SubscriptionNotifier,
        value_objects::notifications::SubscriptionNotification,
    },
    infra::notifications::delivery::NotificationDelivery,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt + 1`, doubling each time.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Accepts notifications without waiting for delivery. A background task
/// drains the queue and retries per `RetryPolicy`.
#[derive(Clone)]
pub struct QueuedNotifier {
    tx: mpsc::Sender<SubscriptionNotification>,
}

impl QueuedNotifier {
    pub const DEFAULT_CAPACITY: usize = 512;

    /// Must be called from inside a tokio runtime.
    pub fn spawn(delivery: Arc<dyn NotificationDelivery>, policy: RetryPolicy) -> Self {
        Self::with_capacity(delivery, policy, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(
        delivery: Arc<dyn NotificationDelivery>,
        policy: RetryPolicy,
        capacity: usize,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<SubscriptionNotification>(capacity.max(1));

        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                deliver_with_retry(delivery.as_ref(), &notification, policy).await;
            }
        });

        Self { tx }
    }
}

async fn deliver_with_retry(
    delivery: &dyn NotificationDelivery,
    notification: &SubscriptionNotification,
    policy: RetryPolicy,
) -> bool {
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        match delivery.deliver(notification).await {
            Ok(()) => {
                debug!(
                    user_id = %notification.user_id,
                    kind = %notification.kind,
                    attempt,
                    "notifications: delivered"
                );
                return true;
            }
            Err(err) if attempt < attempts => {
                warn!(
                    user_id = %notification.user_id,
                    kind = %notification.kind,
                    provider = delivery.name(),
                    attempt,
                    error = %err,
                    "notifications: delivery failed, retrying"
                );
                tokio::time::sleep(policy.backoff_after(attempt)).await;
            }
            Err(err) => {
                error!(
                    user_id = %notification.user_id,
                    subscription_id = %notification.subscription_id,
                    kind = %notification.kind,
                    provider = delivery.name(),
                    attempts,
                    error = %err,
                    "notifications: giving up on delivery"
                );
            }
        }
    }

    false
}

#[async_trait]
impl SubscriptionNotifier for QueuedNotifier {
    async fn notify(&self, notification: SubscriptionNotification) -> Result<()> {
        self.tx.try_send(notification).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => anyhow!("notification queue is full"),
            mpsc::error::TrySendError::Closed(_) => anyhow!("notification queue is closed"),
        })
    }
}
