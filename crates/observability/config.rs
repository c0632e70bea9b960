use std::env;

use tracing::Level;
use url::Url;

/// Identifies the emitting process in admin alerts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AlertSource {
    pub(crate) service: String,
    pub(crate) stage: String,
    pub(crate) component: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AdminAlertConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

#[derive(Debug, Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) source: AlertSource,
    pub(crate) admin_alerts: Option<AdminAlertConfig>,
    /// Collected while parsing and logged once the subscriber is installed.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(component: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let component = component.trim().to_string();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let source = AlertSource {
            service: non_empty("SERVICE_NAME").unwrap_or_else(|| component.clone()),
            stage: non_empty("STAGE").unwrap_or_else(|| "unknown".to_string()),
            component,
        };

        let mut warnings = Vec::new();
        let admin_alerts = admin_alerts(&non_empty, &mut warnings);

        Self {
            source,
            admin_alerts,
            warnings,
        }
    }
}

fn admin_alerts<F>(non_empty: &F, warnings: &mut Vec<String>) -> Option<AdminAlertConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let enabled = match non_empty("ADMIN_ALERTS_ENABLED") {
        Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
            warnings.push(format!(
                "ADMIN_ALERTS_ENABLED has unrecognised value `{raw}`; treating as enabled"
            ));
            true
        }),
        None => true,
    };
    if !enabled {
        return None;
    }

    let raw_url = non_empty("ADMIN_ALERT_WEBHOOK_URL")?;
    let webhook_url = match Url::parse(raw_url.trim()) {
        Ok(url) => url,
        Err(err) => {
            // The URL embeds the webhook secret, only the parse error is reported.
            warnings.push(format!(
                "ADMIN_ALERT_WEBHOOK_URL is invalid ({err}); admin alerts disabled"
            ));
            return None;
        }
    };

    let min_level = match non_empty("ADMIN_ALERT_LEVEL") {
        Some(raw) => parse_level(&raw).unwrap_or_else(|| {
            warnings.push(format!(
                "ADMIN_ALERT_LEVEL `{raw}` is not a log level; using error"
            ));
            Level::ERROR
        }),
        None => Level::ERROR,
    };

    Some(AdminAlertConfig {
        webhook_url,
        min_level,
    })
}

fn parse_level(input: &str) -> Option<Level> {
    match input.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ObservabilityConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ObservabilityConfig::from_lookup("worker", |key| vars.get(key).cloned())
    }

    #[test]
    fn alerts_are_off_without_webhook_url() {
        let config = config(&[("STAGE", "production")]);

        assert!(config.admin_alerts.is_none());
        assert!(config.warnings.is_empty());
        assert_eq!(config.source.service, "worker");
        assert_eq!(config.source.stage, "production");
    }

    #[test]
    fn alerts_use_configured_level() {
        let config = config(&[
            ("ADMIN_ALERT_WEBHOOK_URL", "https://discord.test/api/webhooks/1/abc"),
            ("ADMIN_ALERT_LEVEL", "warn"),
        ]);

        assert_eq!(config.admin_alerts.unwrap().min_level, Level::WARN);
    }

    #[test]
    fn invalid_values_warn_without_leaking_url() {
        let config = config(&[
            ("ADMIN_ALERT_WEBHOOK_URL", "not a url secret123"),
            ("ADMIN_ALERT_LEVEL", "loud"),
        ]);

        assert!(config.admin_alerts.is_none());
        assert_eq!(config.warnings.len(), 1);
        assert!(!config.warnings[0].contains("secret123"));
    }

    #[test]
    fn explicit_disable_wins() {
        let config = config(&[
            ("ADMIN_ALERTS_ENABLED", "off"),
            ("ADMIN_ALERT_WEBHOOK_URL", "https://discord.test/api/webhooks/1/abc"),
        ]);

        assert!(config.admin_alerts.is_none());
    }
}
