use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use super::config_model::{Database, DotEnvyConfig, Notifications, Sweep, WorkerServer};

pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    from_lookup(|key| std::env::var(key).ok())
}

pub fn from_lookup<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let optional = |key: &str| {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    let required = |key: &str| optional(key).with_context(|| format!("{key} is invalid"));

    let worker_server = WorkerServer {
        port: required("SERVER_PORT_WORKER")?
            .parse()
            .context("SERVER_PORT_WORKER is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
    };

    let interval_secs = match optional("SWEEP_INTERVAL_SECS") {
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .context("SWEEP_INTERVAL_SECS is invalid")?,
        None => DEFAULT_SWEEP_INTERVAL_SECS,
    };

    let sweep = Sweep {
        interval: Duration::from_secs(interval_secs),
        run_on_start: optional("SWEEP_RUN_ON_START")
            .map(|raw| raw.parse::<bool>())
            .transpose()
            .context("SWEEP_RUN_ON_START is invalid")?
            .unwrap_or(true),
        internal_token: optional("INTERNAL_SWEEP_TOKEN"),
    };

    let notifications = Notifications {
        service_url: optional("NOTIFICATION_SERVICE_URL")
            .map(|raw| Url::parse(&raw))
            .transpose()
            .context("NOTIFICATION_SERVICE_URL is invalid")?,
        service_token: optional("NOTIFICATION_SERVICE_TOKEN"),
    };

    Ok(DotEnvyConfig {
        worker_server,
        database,
        sweep,
        notifications,
    })
}
