use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use tracing::warn;

use crate::domain::value_objects::notifications::SubscriptionNotification;

#[automock]
#[async_trait]
pub trait SubscriptionNotifier {
    async fn notify(&self, notification: SubscriptionNotification) -> Result<()>;
}

/// Delivery problems never fail the state change that triggered them.
pub async fn notify_best_effort<N>(notifier: &N, notification: SubscriptionNotification)
where
    N: SubscriptionNotifier + ?Sized + Sync,
{
    let user_id = notification.user_id;
    let subscription_id = notification.subscription_id;
    let kind = notification.kind;

    if let Err(err) = notifier.notify(notification).await {
        warn!(
            %user_id,
            %subscription_id,
            %kind,
            error = ?err,
            "notifications: failed to hand off subscription notification"
        );
    }
}
