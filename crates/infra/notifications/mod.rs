pub mod delivery;
pub mod queued_notifier;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use url::Url;

use delivery::{HttpNotificationDelivery, LogOnlyDelivery, NotificationDelivery};
use queued_notifier::{QueuedNotifier, RetryPolicy};

/// Builds the process-wide notifier. Without a service URL notifications are only logged.
pub fn queued_notifier(service_url: Option<Url>, token: Option<String>) -> Result<QueuedNotifier> {
    let delivery: Arc<dyn NotificationDelivery> = match service_url {
        Some(url) => {
            info!(endpoint = %url, "notifications: delivering over HTTP");
            Arc::new(HttpNotificationDelivery::new(url, token)?)
        }
        None => Arc::new(LogOnlyDelivery),
    };

    Ok(QueuedNotifier::spawn(delivery, RetryPolicy::default()))
}
