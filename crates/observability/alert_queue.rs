use std::{collections::BTreeMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{Level, warn};

use super::config::AlertSource;

const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub(crate) struct SpanSnapshot {
    pub(crate) name: String,
    pub(crate) fields: BTreeMap<String, String>,
}

/// A log event promoted to an admin alert.
#[derive(Debug, Clone)]
pub(crate) struct AdminAlert {
    pub(crate) level: Level,
    pub(crate) at: DateTime<Utc>,
    pub(crate) source: AlertSource,
    pub(crate) target: String,
    pub(crate) location: Option<String>,
    pub(crate) message: Option<String>,
    pub(crate) fields: BTreeMap<String, String>,
    pub(crate) spans: Vec<SpanSnapshot>,
}

#[async_trait]
pub(crate) trait AlertSink: Send + Sync {
    async fn deliver(&self, alert: &AdminAlert) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Hands alerts to a background task. Never blocks the caller; a full queue
/// drops the alert.
#[derive(Clone)]
pub(crate) struct AlertQueue {
    tx: mpsc::Sender<AdminAlert>,
}

impl AlertQueue {
    pub(crate) fn spawn(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        let (tx, mut rx) = mpsc::channel::<AdminAlert>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(alert) = rx.recv().await {
                for sink in &sinks {
                    if let Err(err) = sink.deliver(&alert).await {
                        // Target is excluded from the alert layer to avoid feedback loops.
                        warn!(
                            target: "observability::delivery",
                            sink = sink.name(),
                            error = %err,
                            "observability: admin alert delivery failed"
                        );
                    }
                }
            }
        });

        Self { tx }
    }

    pub(crate) fn push(&self, alert: AdminAlert) {
        if let Err(err) = self.tx.try_send(alert) {
            let reason = match err {
                mpsc::error::TrySendError::Full(_) => "full",
                mpsc::error::TrySendError::Closed(_) => "closed",
            };
            warn!(
                target: "observability::delivery",
                reason,
                "observability: admin alert dropped"
            );
        }
    }
}
