use std::time::Duration;

use anyhow::{Context, Result};
use subscription_core::payments::{
    errors::DEFAULT_ALREADY_INACTIVE_MARKERS,
    paystack_client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT},
};
use url::Url;

use super::config_model::{
    Admin, BackendServer, Billing, Database, DotEnvyConfig, Notifications, UserAuth,
};

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

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
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

    let user_auth = UserAuth {
        jwt_secret: required("JWT_USER_SECRET")?,
    };

    let timeout = match optional("BILLING_TIMEOUT_SECS") {
        Some(raw) => Duration::from_secs(raw.parse().context("BILLING_TIMEOUT_SECS is invalid")?),
        None => DEFAULT_TIMEOUT,
    };

    let billing = Billing {
        secret_key: required("BILLING_SECRET_KEY")?,
        base_url: Url::parse(
            &optional("BILLING_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        )
        .context("BILLING_BASE_URL is invalid")?,
        timeout,
        callback_base_url: Url::parse(&required("BILLING_CALLBACK_BASE_URL")?)
            .context("BILLING_CALLBACK_BASE_URL is invalid")?,
        already_inactive_markers: optional("BILLING_ALREADY_INACTIVE_MARKERS")
            .unwrap_or_else(|| DEFAULT_ALREADY_INACTIVE_MARKERS.join(",")),
    };

    let notifications = Notifications {
        service_url: optional("NOTIFICATION_SERVICE_URL")
            .map(|raw| Url::parse(&raw))
            .transpose()
            .context("NOTIFICATION_SERVICE_URL is invalid")?,
        service_token: optional("NOTIFICATION_SERVICE_TOKEN"),
    };

    let admin = Admin {
        token: optional("ADMIN_TOKEN"),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        user_auth,
        billing,
        notifications,
        admin,
    })
}
