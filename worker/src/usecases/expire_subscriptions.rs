use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use subscription_core::domain::{
    entities::subscriptions::SubscriptionEntity,
    repositories::{
        notifications::{SubscriptionNotifier, notify_best_effort},
        subscriptions::SubscriptionRepository,
    },
    value_objects::notifications::{NotificationKind, SubscriptionNotification},
};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SweepItemError {
    pub subscription_id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SweepReport {
    pub processed_count: usize,
    pub errors: Vec<SweepItemError>,
}

pub struct ExpirySweepUseCase {
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    notifier: Arc<dyn SubscriptionNotifier + Send + Sync>,
}

impl ExpirySweepUseCase {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
        notifier: Arc<dyn SubscriptionNotifier + Send + Sync>,
    ) -> Self {
        Self {
            subscription_repo,
            notifier,
        }
    }

    /// Closes every instance whose renewal date passed without a provider event.
    /// A failing row is reported and the rest of the batch still runs.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let due = self.subscription_repo.list_due_for_expiry(now).await?;
        info!(candidates = due.len(), "expiry_sweep: starting sweep");

        let mut report = SweepReport::default();
        for subscription in due {
            match self.close(&subscription).await {
                Ok(true) => report.processed_count += 1,
                Ok(false) => {
                    info!(
                        subscription_id = %subscription.id,
                        "expiry_sweep: already closed by another writer"
                    );
                }
                Err(err) => {
                    error!(
                        subscription_id = %subscription.id,
                        error = ?err,
                        "expiry_sweep: failed to close subscription"
                    );
                    report.errors.push(SweepItemError {
                        subscription_id: subscription.id,
                        message: err.to_string(),
                    });
                }
            }
        }

        info!(
            processed_count = report.processed_count,
            errors = report.errors.len(),
            "expiry_sweep: sweep finished"
        );
        Ok(report)
    }

    async fn close(&self, subscription: &SubscriptionEntity) -> Result<bool> {
        let ended_by_request = subscription.cancel_at_period_end;
        let changed = self
            .subscription_repo
            .close_due_subscription(subscription.id, ended_by_request)
            .await?;
        if !changed {
            return Ok(false);
        }

        let kind = if ended_by_request {
            NotificationKind::CancelledAtPeriodEnd
        } else {
            NotificationKind::Expired
        };
        info!(
            subscription_id = %subscription.id,
            user_id = %subscription.user_id,
            %kind,
            "expiry_sweep: subscription closed"
        );
        notify_best_effort(
            self.notifier.as_ref(),
            SubscriptionNotification::new(
                subscription.user_id,
                subscription.id,
                kind,
                subscription.plan_name.clone(),
            ),
        )
        .await;

        Ok(true)
    }
}
