mod alert_layer;
mod alert_queue;
mod config;
mod discord;

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use alert_layer::AdminAlertLayer;
use alert_queue::AlertQueue;
use config::ObservabilityConfig;
use discord::DiscordAlertSink;

/// Installs the global tracing subscriber: `RUST_LOG` filtering (default
/// `info`), local-time fmt output and, when configured, admin alerts to Discord.
/// Must be called from inside a tokio runtime.
pub fn init_observability(component: &str) -> Result<()> {
    let mut config = ObservabilityConfig::from_env(component);

    let alert_layer = match config.admin_alerts.as_ref() {
        Some(alerts) => match DiscordAlertSink::new(alerts.webhook_url.clone()) {
            Ok(sink) => {
                let queue = AlertQueue::spawn(vec![Arc::new(sink)]);
                Some(
                    AdminAlertLayer::new(queue, config.source.clone(), alerts.min_level)
                        .with_filter(LevelFilter::from_level(alerts.min_level)),
                )
            }
            Err(err) => {
                config
                    .warnings
                    .push(format!("admin alerts disabled: {err}"));
                None
            }
        },
        None => None,
    };
    let alerts_enabled = alert_layer.is_some();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    for warning in &config.warnings {
        warn!(
            service = %config.source.service,
            stage = %config.source.stage,
            warning = %warning,
            "observability: config warning"
        );
    }

    info!(
        service = %config.source.service,
        stage = %config.source.stage,
        component = %config.source.component,
        admin_alerts = alerts_enabled,
        "observability: tracing initialised"
    );

    Ok(())
}
