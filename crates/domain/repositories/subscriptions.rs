use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::subscriptions::SubscriptionEntity,
    value_objects::subscriptions::{NewPendingCheckout, PendingCheckout, SubscriptionPatch},
};

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    async fn find_by_id(&self, subscription_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    /// Looks up by the provider-assigned subscription code.
    async fn find_by_code(&self, code: &str) -> Result<Option<SubscriptionEntity>>;

    /// Every non-deleted instance the user ever held, newest first.
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<SubscriptionEntity>>;

    async fn find_live_by_user_and_plan(
        &self,
        user_id: Uuid,
        plan_code: &str,
    ) -> Result<Option<SubscriptionEntity>>;

    async fn apply_patch(&self, subscription_id: Uuid, patch: SubscriptionPatch) -> Result<()>;

    /// Inserts a pending subscription and its funding transaction atomically.
    async fn create_pending_with_transaction(
        &self,
        checkout: NewPendingCheckout,
    ) -> Result<PendingCheckout>;

    /// Instances past their next payment date that are still active or were
    /// scheduled to end at period end, and are not yet terminal.
    async fn list_due_for_expiry(&self, now: DateTime<Utc>) -> Result<Vec<SubscriptionEntity>>;

    /// Closes a due instance unless something else already made it terminal.
    /// `cancelled` picks between the cancelled and the expired end state.
    /// Returns whether a row was changed.
    async fn close_due_subscription(&self, subscription_id: Uuid, cancelled: bool) -> Result<bool>;
}
