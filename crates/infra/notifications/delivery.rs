use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::domain::value_objects::notifications::{NotificationKind, SubscriptionNotification};

/// Wire shape posted to the notification service.
#[derive(Debug, Serialize, PartialEq)]
pub struct NotificationPayload {
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
}

impl From<&SubscriptionNotification> for NotificationPayload {
    fn from(value: &SubscriptionNotification) -> Self {
        Self {
            user_id: value.user_id,
            subscription_id: value.subscription_id,
            kind: value.kind,
            title: value.title().to_string(),
            body: value.body(),
        }
    }
}

#[async_trait]
pub trait NotificationDelivery: Send + Sync {
    async fn deliver(&self, notification: &SubscriptionNotification) -> Result<()>;
    fn name(&self) -> &'static str;
}

pub struct HttpNotificationDelivery {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpNotificationDelivery {
    pub fn new(endpoint: Url, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("failed to build notification http client")?;

        Ok(Self {
            client,
            endpoint,
            token,
        })
    }
}

#[async_trait]
impl NotificationDelivery for HttpNotificationDelivery {
    async fn deliver(&self, notification: &SubscriptionNotification) -> Result<()> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&NotificationPayload::from(notification));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| anyhow!("notification service unreachable: {err}"))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "notification service returned {}",
                response.status()
            ));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Used when no notification service is configured.
pub struct LogOnlyDelivery;

#[async_trait]
impl NotificationDelivery for LogOnlyDelivery {
    async fn deliver(&self, notification: &SubscriptionNotification) -> Result<()> {
        info!(
            user_id = %notification.user_id,
            subscription_id = %notification.subscription_id,
            kind = %notification.kind,
            title = notification.title(),
            "notifications: no delivery service configured, logging only"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
