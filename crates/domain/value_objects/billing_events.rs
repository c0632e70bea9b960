use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Points at a provider subscription from a subscription or invoice event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionEventRef {
    pub subscription_code: String,
    pub next_payment_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeSuccess {
    pub reference: Option<String>,
    /// Local transaction id carried in the checkout metadata. Renewal charges
    /// created by the provider itself have none.
    pub transaction_id: Option<Uuid>,
    pub fee: Option<i64>,
    pub customer_email: Option<String>,
    pub customer_code: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceCreated {
    pub subscription: SubscriptionEventRef,
    pub amount: Option<i64>,
}

/// Inbound provider event after the parse step. Every field of the raw payload
/// is treated as optional; anything a handler cannot work without is checked here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
    ChargeSuccess(ChargeSuccess),
    InvoiceCreate(InvoiceCreated),
    InvoicePaymentFailed(SubscriptionEventRef),
    SubscriptionNotRenew(SubscriptionEventRef),
    SubscriptionDisable(SubscriptionEventRef),
    SubscriptionEnable(SubscriptionEventRef),
    SubscriptionExpire(SubscriptionEventRef),
    SubscriptionCancel(SubscriptionEventRef),
    Unhandled(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedEvent {
    #[error("payload is not a JSON object: {0}")]
    InvalidJson(String),
    #[error("payload has no event type")]
    MissingEventType,
    #[error("{event} payload is missing {field}")]
    MissingField {
        event: String,
        field: &'static str,
    },
}

impl BillingEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, MalformedEvent> {
        let root: Value = serde_json::from_slice(payload)
            .map_err(|err| MalformedEvent::InvalidJson(err.to_string()))?;
        if !root.is_object() {
            return Err(MalformedEvent::InvalidJson("top-level value".to_string()));
        }

        let event_type = root
            .get("event")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(MalformedEvent::MissingEventType)?;

        let data = root.get("data").unwrap_or(&Value::Null);

        let event = match event_type {
            "charge.success" => BillingEvent::ChargeSuccess(parse_charge(data)),
            "invoice.create" => {
                BillingEvent::InvoiceCreate(InvoiceCreated {
                    subscription: invoice_subscription_ref(event_type, data)?,
                    amount: data.get("amount").and_then(as_i64),
                })
            }
            "invoice.payment_failed" => {
                BillingEvent::InvoicePaymentFailed(invoice_subscription_ref(event_type, data)?)
            }
            "subscription.not_renew" => {
                BillingEvent::SubscriptionNotRenew(subscription_ref(event_type, data)?)
            }
            "subscription.disable" => {
                BillingEvent::SubscriptionDisable(subscription_ref(event_type, data)?)
            }
            "subscription.enable" => {
                BillingEvent::SubscriptionEnable(subscription_ref(event_type, data)?)
            }
            "subscription.expire" => {
                BillingEvent::SubscriptionExpire(subscription_ref(event_type, data)?)
            }
            "subscription.cancel" => {
                BillingEvent::SubscriptionCancel(subscription_ref(event_type, data)?)
            }
            other => BillingEvent::Unhandled(other.to_string()),
        };

        Ok(event)
    }

    pub fn event_type(&self) -> &str {
        match self {
            BillingEvent::ChargeSuccess(_) => "charge.success",
            BillingEvent::InvoiceCreate(_) => "invoice.create",
            BillingEvent::InvoicePaymentFailed(_) => "invoice.payment_failed",
            BillingEvent::SubscriptionNotRenew(_) => "subscription.not_renew",
            BillingEvent::SubscriptionDisable(_) => "subscription.disable",
            BillingEvent::SubscriptionEnable(_) => "subscription.enable",
            BillingEvent::SubscriptionExpire(_) => "subscription.expire",
            BillingEvent::SubscriptionCancel(_) => "subscription.cancel",
            BillingEvent::Unhandled(event_type) => event_type,
        }
    }
}

fn parse_charge(data: &Value) -> ChargeSuccess {
    let metadata = metadata_object(data.get("metadata"));
    let transaction_id = metadata
        .as_ref()
        .and_then(|meta| meta.get("transactionId").or_else(|| meta.get("transaction_id")))
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok());

    let customer = data.get("customer");

    ChargeSuccess {
        reference: non_empty_str(data.get("reference")),
        transaction_id,
        fee: data.get("fees").and_then(as_i64),
        customer_email: non_empty_str(customer.and_then(|c| c.get("email"))),
        customer_code: non_empty_str(customer.and_then(|c| c.get("customer_code"))),
        paid_at: parse_timestamp(data.get("paid_at").or_else(|| data.get("paidAt"))),
    }
}

/// Subscription events carry the code at the top level of `data`.
fn subscription_ref(event: &str, data: &Value) -> Result<SubscriptionEventRef, MalformedEvent> {
    let subscription_code = non_empty_str(data.get("subscription_code")).ok_or_else(|| {
        MalformedEvent::MissingField {
            event: event.to_string(),
            field: "data.subscription_code",
        }
    })?;

    Ok(SubscriptionEventRef {
        subscription_code,
        next_payment_at: parse_timestamp(data.get("next_payment_date")),
    })
}

/// Invoice events nest the subscription under `data.subscription`; some
/// deliveries flatten it, so both shapes are accepted.
fn invoice_subscription_ref(
    event: &str,
    data: &Value,
) -> Result<SubscriptionEventRef, MalformedEvent> {
    let nested = data.get("subscription");
    let subscription_code = non_empty_str(nested.and_then(|s| s.get("subscription_code")))
        .or_else(|| non_empty_str(data.get("subscription_code")))
        .ok_or_else(|| MalformedEvent::MissingField {
            event: event.to_string(),
            field: "data.subscription.subscription_code",
        })?;

    let next_payment_at = parse_timestamp(nested.and_then(|s| s.get("next_payment_date")))
        .or_else(|| parse_timestamp(data.get("next_payment_date")));

    Ok(SubscriptionEventRef {
        subscription_code,
        next_payment_at,
    })
}

/// Metadata arrives either as an object or as a JSON-encoded string.
fn metadata_object(value: Option<&Value>) -> Option<Value> {
    match value? {
        Value::Object(_) => value.cloned(),
        Value::String(raw) => serde_json::from_str::<Value>(raw)
            .ok()
            .filter(Value::is_object),
        _ => None,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn as_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|raw| raw.trim().parse().ok()))
}

fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let raw = value.and_then(Value::as_str)?;
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}
