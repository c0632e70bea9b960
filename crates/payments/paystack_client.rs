use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{error, warn};
use url::Url;

use crate::payments::{
    errors::{AlreadyInactiveMatcher, BillingError},
    models::{
        CreateCustomerBody, CreateSubscriptionBody, DisableSubscriptionBody,
        InitializeTransaction, InitializedTransaction, ProviderCustomer, ProviderEnvelope,
        ProviderErrorBody, ProviderPlan, ProviderSubscription, VerifiedTransaction,
    },
    signature::verify_signature,
};

pub const DEFAULT_BASE_URL: &str = "https://api.paystack.co";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub base_url: Url,
    pub secret_key: String,
    pub timeout: Duration,
    pub already_inactive: AlreadyInactiveMatcher,
}

/// Recurring-billing provider client built on reqwest. One method per remote
/// capability; nothing is retried here.
pub struct PaystackClient {
    http: reqwest::Client,
    config: PaystackConfig,
}

impl PaystackClient {
    pub fn new(config: PaystackConfig) -> Result<Self> {
        if config.base_url.cannot_be_a_base() {
            anyhow::bail!("billing base url `{}` cannot carry a path", config.base_url);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build billing http client")?;

        Ok(Self { http, config })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.config.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send_envelope<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &'static str,
    ) -> Result<ProviderEnvelope<T>, BillingError> {
        let resp = request
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(|err| {
                warn!(context, error = %err, "billing: provider unreachable");
                BillingError::from(err)
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|err| {
            warn!(context, error = %err, "billing: failed to read provider response");
            BillingError::from(err)
        })?;

        if !status.is_success() {
            return Err(self.classify_failure(status, &body, context));
        }

        let envelope: ProviderEnvelope<T> = serde_json::from_str(&body).map_err(|err| {
            error!(context, error = %err, "billing: unexpected provider response shape");
            BillingError::InvalidResponse(format!("{context}: {err}"))
        })?;

        if !envelope.status {
            return Err(self.classify_failure(status, &body, context));
        }

        Ok(envelope)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &'static str,
    ) -> Result<T, BillingError> {
        self.send_envelope::<T>(request, context)
            .await?
            .data
            .ok_or_else(|| BillingError::InvalidResponse(format!("{context}: response has no data")))
    }

    fn classify_failure(&self, status: StatusCode, body: &str, context: &str) -> BillingError {
        let details = serde_json::from_str::<ProviderErrorBody>(body).unwrap_or_default();
        let message = details
            .message
            .clone()
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| match body.trim() {
                "" => "<empty response body>".to_string(),
                text => text.to_string(),
            });
        let probe = match details.code.as_deref() {
            Some(code) => format!("{message} {code}"),
            None => message.clone(),
        };

        if self.config.already_inactive.matches(status.as_u16(), &probe) {
            warn!(
                status = %status,
                provider_message = %message,
                context,
                "billing: provider reports resource missing or already inactive"
            );
            return BillingError::NotFoundOrInactive(message);
        }

        error!(
            status = %status,
            provider_message = %message,
            provider_code = ?details.code,
            context,
            "billing: provider request failed"
        );

        BillingError::Provider {
            status: status.as_u16(),
            message,
        }
    }

    pub async fn create_customer(&self, email: &str) -> Result<ProviderCustomer, BillingError> {
        let request = self
            .http
            .post(self.endpoint(&["customer"]))
            .json(&CreateCustomerBody { email });
        self.send(request, "create customer").await
    }

    pub async fn get_plan(&self, plan_code: &str) -> Result<ProviderPlan, BillingError> {
        let request = self.http.get(self.endpoint(&["plan", plan_code]));
        self.send(request, "fetch plan").await
    }

    pub async fn list_plans(&self) -> Result<Vec<ProviderPlan>, BillingError> {
        let request = self.http.get(self.endpoint(&["plan"]));
        self.send(request, "list plans").await
    }

    /// `customer` is a customer code or email.
    pub async fn create_subscription(
        &self,
        customer: &str,
        plan_code: &str,
    ) -> Result<ProviderSubscription, BillingError> {
        let request = self
            .http
            .post(self.endpoint(&["subscription"]))
            .json(&CreateSubscriptionBody {
                customer,
                plan: plan_code,
            });
        self.send(request, "create subscription").await
    }

    pub async fn cancel_subscription(
        &self,
        subscription_code: &str,
        email_token: &str,
    ) -> Result<(), BillingError> {
        let request = self
            .http
            .post(self.endpoint(&["subscription", "disable"]))
            .json(&DisableSubscriptionBody {
                code: subscription_code,
                token: email_token,
            });
        self.send_envelope::<serde_json::Value>(request, "disable subscription")
            .await?;
        Ok(())
    }

    pub async fn get_subscription_details(
        &self,
        subscription_code: &str,
    ) -> Result<ProviderSubscription, BillingError> {
        let request = self
            .http
            .get(self.endpoint(&["subscription", subscription_code]));
        self.send(request, "fetch subscription").await
    }

    pub async fn initialize_transaction(
        &self,
        body: &InitializeTransaction,
    ) -> Result<InitializedTransaction, BillingError> {
        let request = self
            .http
            .post(self.endpoint(&["transaction", "initialize"]))
            .json(body);
        self.send(request, "initialize transaction").await
    }

    pub async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<VerifiedTransaction, BillingError> {
        let request = self
            .http
            .get(self.endpoint(&["transaction", "verify", reference]));
        self.send(request, "verify transaction").await
    }

    /// Webhooks are signed with the account secret key.
    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        verify_signature(&self.config.secret_key, payload, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> PaystackClient {
        PaystackClient::new(PaystackConfig {
            base_url: Url::parse(base).unwrap(),
            secret_key: "sk_test".to_string(),
            timeout: DEFAULT_TIMEOUT,
            already_inactive: AlreadyInactiveMatcher::default(),
        })
        .unwrap()
    }

    #[test]
    fn endpoint_appends_encoded_segments() {
        let client = client("https://api.paystack.co/");
        assert_eq!(
            client.endpoint(&["transaction", "verify", "ref 1/2"]).as_str(),
            "https://api.paystack.co/transaction/verify/ref%201%2F2"
        );
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let client = client("http://localhost:9000/mock");
        assert_eq!(
            client.endpoint(&["plan", "PLN_1"]).as_str(),
            "http://localhost:9000/mock/plan/PLN_1"
        );
    }

    #[test]
    fn classifies_inactive_responses() {
        let client = client(DEFAULT_BASE_URL);

        let inactive = client.classify_failure(
            StatusCode::BAD_REQUEST,
            r#"{"status":false,"message":"Subscription is already inactive"}"#,
            "disable subscription",
        );
        assert!(inactive.is_not_found_or_inactive());

        let missing = client.classify_failure(StatusCode::NOT_FOUND, "", "fetch plan");
        assert!(missing.is_not_found_or_inactive());

        let other = client.classify_failure(
            StatusCode::UNAUTHORIZED,
            r#"{"status":false,"message":"Invalid key"}"#,
            "fetch plan",
        );
        assert!(matches!(
            other,
            BillingError::Provider { status: 401, ref message } if message == "Invalid key"
        ));
    }

    #[test]
    fn rejects_base_urls_without_path() {
        let result = PaystackClient::new(PaystackConfig {
            base_url: Url::parse("mailto:billing@example.com").unwrap(),
            secret_key: "sk_test".to_string(),
            timeout: DEFAULT_TIMEOUT,
            already_inactive: AlreadyInactiveMatcher::default(),
        });
        assert!(result.is_err());
    }
}
