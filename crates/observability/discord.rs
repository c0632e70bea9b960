use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::json;
use url::Url;

use super::alert_queue::{AdminAlert, AlertSink};

const CONTENT_LIMIT: usize = 2000;
const TRUNCATED_SUFFIX: &str = "\n… (truncated)";

pub(crate) struct DiscordAlertSink {
    webhook_url: Url,
    client: Client,
}

impl DiscordAlertSink {
    pub(crate) fn new(webhook_url: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .context("failed to build admin alert http client")?;

        Ok(Self {
            webhook_url,
            client,
        })
    }
}

pub(crate) fn render(alert: &AdminAlert) -> String {
    let mut lines = vec![format!(
        "**{}** `{}` `{}` `{}`",
        alert.source.service,
        alert.source.stage,
        alert.source.component,
        alert.level.as_str()
    )];

    let mut origin = format!(
        "`{}` `{}`",
        alert.at.to_rfc3339_opts(SecondsFormat::Secs, true),
        alert.target
    );
    if let Some(location) = &alert.location {
        origin.push_str(&format!(" `{location}`"));
    }
    lines.push(origin);

    if let Some(message) = alert.message.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        lines.push(format!("> {message}"));
    }

    for (key, value) in &alert.fields {
        lines.push(format!("- `{key}` = `{value}`"));
    }

    for span in alert.spans.iter().filter(|span| !span.fields.is_empty()) {
        lines.push(format!("span `{}`:", span.name));
        for (key, value) in &span.fields {
            lines.push(format!("- `{key}` = `{value}`"));
        }
    }

    truncate(lines.join("\n"))
}

fn truncate(content: String) -> String {
    if content.chars().count() <= CONTENT_LIMIT {
        return content;
    }

    let keep = CONTENT_LIMIT - TRUNCATED_SUFFIX.chars().count();
    let mut truncated: String = content.chars().take(keep).collect();
    truncated.push_str(TRUNCATED_SUFFIX);
    truncated
}

#[async_trait]
impl AlertSink for DiscordAlertSink {
    async fn deliver(&self, alert: &AdminAlert) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "content": render(alert) }))
            .send()
            .await
            // reqwest errors embed the URL, which carries the webhook secret.
            .map_err(|err| {
                if err.is_timeout() {
                    anyhow!("discord webhook timed out")
                } else {
                    anyhow!("discord webhook request failed")
                }
            })?;

        if !response.status().is_success() {
            return Err(anyhow!("discord webhook returned {}", response.status()));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}
