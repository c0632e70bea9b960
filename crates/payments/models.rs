use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `{status, message, data}` wrapper around every provider response.
#[derive(Debug, Deserialize)]
pub struct ProviderEnvelope<T> {
    pub status: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

/// Error body; `code` is only present on some endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ProviderErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProviderPlan {
    pub plan_code: String,
    /// `"<role>@<planKey>"`, parsed by the plan catalog.
    pub name: String,
    pub amount: i64,
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProviderCustomer {
    pub customer_code: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProviderSubscription {
    pub subscription_code: String,
    #[serde(default)]
    pub email_token: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub next_payment_date: Option<DateTime<Utc>>,
}

impl ProviderSubscription {
    /// Statuses after which the provider will not bill this subscription again.
    pub fn is_ended(&self) -> bool {
        matches!(
            self.status.as_deref(),
            Some("cancelled") | Some("complete") | Some("completed")
        )
    }

    pub fn is_non_renewing(&self) -> bool {
        self.status.as_deref() == Some("non-renewing")
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TransactionMetadata {
    #[serde(rename = "transactionId")]
    pub transaction_id: Uuid,
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    #[serde(rename = "planCode")]
    pub plan_code: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InitializeTransaction {
    pub email: String,
    /// Minor currency units.
    pub amount: i64,
    pub callback_url: String,
    pub metadata: TransactionMetadata,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    #[serde(default)]
    pub access_code: Option<String>,
    pub reference: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VerifiedTransaction {
    pub status: String,
    pub reference: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub fees: Option<i64>,
    #[serde(default, alias = "paidAt")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub customer: Option<ProviderCustomer>,
}

impl VerifiedTransaction {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateCustomerBody<'a> {
    pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateSubscriptionBody<'a> {
    pub customer: &'a str,
    pub plan: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct DisableSubscriptionBody<'a> {
    pub code: &'a str,
    pub token: &'a str,
}
