use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::payment_statuses::PaymentStatus,
    infra::db::postgres::schema::subscriptions,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, PartialEq)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_code: String,
    pub plan_name: String,
    pub amount: i64,
    pub active: bool,
    pub cancelled: bool,
    pub expired: bool,
    pub status: String,
    pub code: Option<String>,
    pub email_token: Option<String>,
    pub next_payment_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SubscriptionEntity {
    /// Counts toward the one-live-subscription-per-user limit.
    pub fn is_live(&self) -> bool {
        self.active && !self.cancelled && !self.expired
    }

    /// Webhooks, the sweep and payment confirmation never revive these.
    /// Expired instances need a new checkout; cancelled ones return only via reactivate.
    pub fn is_terminal(&self) -> bool {
        self.cancelled || self.expired
    }

    pub fn payment_status(&self) -> PaymentStatus {
        PaymentStatus::from_str(&self.status).unwrap_or(PaymentStatus::Failed)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = subscriptions)]
pub struct InsertSubscriptionEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_code: String,
    pub plan_name: String,
    pub amount: i64,
    pub active: bool,
    pub cancelled: bool,
    pub expired: bool,
    pub status: String,
    pub cancel_at_period_end: bool,
}

/// Column-wise update; `None` leaves a column untouched.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionChangeset {
    pub amount: Option<i64>,
    pub active: Option<bool>,
    pub cancelled: Option<bool>,
    pub expired: Option<bool>,
    pub status: Option<String>,
    pub code: Option<String>,
    pub email_token: Option<String>,
    pub next_payment_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancel_at_period_end: Option<bool>,
    pub updated_at: DateTime<Utc>,
}
