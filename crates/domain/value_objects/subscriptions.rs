use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::{subscriptions::SubscriptionEntity, transactions::TransactionEntity},
    value_objects::{
        enums::{payment_statuses::PaymentStatus, user_roles::UserRole},
        plans::{BillingPeriod, PlanDetails},
    },
};

/// Who is acting on a direct subscription request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberContext {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

/// Flag-set applied to one subscription row by primary id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionPatch {
    pub amount: Option<i64>,
    pub active: Option<bool>,
    pub cancelled: Option<bool>,
    pub expired: Option<bool>,
    pub status: Option<PaymentStatus>,
    pub code: Option<String>,
    pub email_token: Option<String>,
    pub next_payment_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancel_at_period_end: Option<bool>,
}

impl SubscriptionPatch {
    pub fn cancelled() -> Self {
        Self {
            active: Some(false),
            cancelled: Some(true),
            status: Some(PaymentStatus::Failed),
            ..Default::default()
        }
    }

    pub fn expired() -> Self {
        Self {
            active: Some(false),
            expired: Some(true),
            status: Some(PaymentStatus::Failed),
            ..Default::default()
        }
    }

    pub fn activated(
        code: String,
        email_token: Option<String>,
        next_payment_at: Option<DateTime<Utc>>,
        paid_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            active: Some(true),
            status: Some(PaymentStatus::Success),
            code: Some(code),
            email_token,
            next_payment_at,
            paid_at,
            ..Default::default()
        }
    }

    pub fn reactivated(
        code: String,
        email_token: Option<String>,
        next_payment_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            active: Some(true),
            cancelled: Some(false),
            expired: Some(false),
            status: Some(PaymentStatus::Success),
            code: Some(code),
            email_token,
            next_payment_at,
            cancel_at_period_end: Some(false),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Input for creating a pending subscription together with its funding transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPendingCheckout {
    pub user_id: Uuid,
    pub plan_code: String,
    pub plan_name: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingCheckout {
    pub subscription: SubscriptionEntity,
    pub transaction: TransactionEntity,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub plan_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentCallbackQuery {
    pub subscription_id: Uuid,
    pub reference: Option<String>,
    pub trxref: Option<String>,
}

impl PaymentCallbackQuery {
    pub fn reference(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .or(self.trxref.as_deref())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlanDto {
    pub plan_code: String,
    pub name: String,
    pub display_name: String,
    pub role: UserRole,
    pub amount: i64,
    pub interval: Option<String>,
    pub period: BillingPeriod,
    pub features: Vec<String>,
}

impl PlanDto {
    pub fn new(
        plan_code: String,
        name: String,
        amount: i64,
        interval: Option<String>,
        details: &PlanDetails,
    ) -> Self {
        Self {
            plan_code,
            name,
            display_name: details.display_name.to_string(),
            role: details.role,
            amount,
            interval,
            period: details.period,
            features: details.features.iter().map(|f| f.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckoutSessionDto {
    pub subscription_id: Uuid,
    pub transaction_id: Uuid,
    pub authorization_url: String,
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubscriptionStatusDto {
    pub subscription_id: Uuid,
    pub plan_code: String,
    pub plan_name: String,
    pub active: bool,
    pub cancelled: bool,
    pub expired: bool,
    pub status: PaymentStatus,
    pub cancel_at_period_end: bool,
    pub next_payment_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<&SubscriptionEntity> for SubscriptionStatusDto {
    fn from(value: &SubscriptionEntity) -> Self {
        Self {
            subscription_id: value.id,
            plan_code: value.plan_code.clone(),
            plan_name: value.plan_name.clone(),
            active: value.active,
            cancelled: value.cancelled,
            expired: value.expired,
            status: value.payment_status(),
            cancel_at_period_end: value.cancel_at_period_end,
            next_payment_at: value.next_payment_at,
            paid_at: value.paid_at,
        }
    }
}

/// How the provider responded to a cancellation request.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum RemoteCancellation {
    Confirmed,
    AlreadyInactive,
    /// No provider call was possible or it failed; the local write still happened.
    Unconfirmed(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CancellationDto {
    pub subscription: SubscriptionStatusDto,
    pub remote: RemoteCancellation,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentConfirmation {
    /// Subscription activated by this call.
    Activated,
    /// Already confirmed earlier; only the fee was refreshed.
    Duplicate,
    /// Payment recorded, but the subscription had been superseded meanwhile.
    Superseded,
    UnknownTransaction,
    UnknownSubscription,
    /// Provider reported the payment as not successful.
    NotPaid(String),
}

/// Result of the browser returning from the hosted payment page.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentCallbackDto {
    pub outcome: PaymentConfirmation,
    pub subscription: Option<SubscriptionStatusDto>,
}
