use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{subscriptions, transactions},
    },
};
use domain::{
    entities::{
        subscriptions::{InsertSubscriptionEntity, SubscriptionChangeset, SubscriptionEntity},
        transactions::{InsertTransactionEntity, TransactionEntity},
    },
    repositories::subscriptions::SubscriptionRepository,
    value_objects::{
        enums::payment_statuses::PaymentStatus,
        subscriptions::{NewPendingCheckout, PendingCheckout, SubscriptionPatch},
    },
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

fn to_changeset(patch: SubscriptionPatch, now: DateTime<Utc>) -> SubscriptionChangeset {
    SubscriptionChangeset {
        amount: patch.amount,
        active: patch.active,
        cancelled: patch.cancelled,
        expired: patch.expired,
        status: patch.status.map(|status| status.to_string()),
        code: patch.code,
        email_token: patch.email_token,
        next_payment_at: patch.next_payment_at,
        paid_at: patch.paid_at,
        cancel_at_period_end: patch.cancel_at_period_end,
        updated_at: now,
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_by_id(&self, subscription_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::id.eq(subscription_id))
            .filter(subscriptions::deleted_at.is_null())
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Codes are unique at the provider; newest row wins if a code was ever reused locally.
        let result = subscriptions::table
            .filter(subscriptions::code.eq(code))
            .filter(subscriptions::deleted_at.is_null())
            .order(subscriptions::created_at.desc())
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .filter(subscriptions::deleted_at.is_null())
            .order(subscriptions::created_at.desc())
            .select(SubscriptionEntity::as_select())
            .load::<SubscriptionEntity>(&mut conn)?;

        Ok(results)
    }

    async fn find_live_by_user_and_plan(
        &self,
        user_id: Uuid,
        plan_code: &str,
    ) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .filter(subscriptions::plan_code.eq(plan_code))
            .filter(subscriptions::active.eq(true))
            .filter(subscriptions::cancelled.eq(false))
            .filter(subscriptions::expired.eq(false))
            .filter(subscriptions::deleted_at.is_null())
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn apply_patch(&self, subscription_id: Uuid, patch: SubscriptionPatch) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(subscriptions::table)
            .filter(subscriptions::id.eq(subscription_id))
            .set(to_changeset(patch, Utc::now()))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn create_pending_with_transaction(
        &self,
        checkout: NewPendingCheckout,
    ) -> Result<PendingCheckout> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let subscription_row = InsertSubscriptionEntity {
            id: Uuid::new_v4(),
            user_id: checkout.user_id,
            plan_code: checkout.plan_code.clone(),
            plan_name: checkout.plan_name,
            amount: checkout.amount,
            active: false,
            cancelled: false,
            expired: false,
            status: PaymentStatus::Pending.to_string(),
            cancel_at_period_end: false,
        };
        let transaction_row = InsertTransactionEntity {
            id: Uuid::new_v4(),
            user_id: checkout.user_id,
            subscription_id: subscription_row.id,
            plan_code: checkout.plan_code,
            amount: checkout.amount,
            status: PaymentStatus::Pending.to_string(),
        };

        let pair = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let subscription = insert_into(subscriptions::table)
                .values(&subscription_row)
                .returning(SubscriptionEntity::as_returning())
                .get_result::<SubscriptionEntity>(conn)?;

            let transaction = insert_into(transactions::table)
                .values(&transaction_row)
                .returning(TransactionEntity::as_returning())
                .get_result::<TransactionEntity>(conn)?;

            Ok(PendingCheckout {
                subscription,
                transaction,
            })
        })?;

        Ok(pair)
    }

    async fn list_due_for_expiry(&self, now: DateTime<Utc>) -> Result<Vec<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = subscriptions::table
            .filter(subscriptions::deleted_at.is_null())
            .filter(subscriptions::next_payment_at.is_not_null())
            .filter(subscriptions::next_payment_at.lt(now))
            .filter(
                subscriptions::active
                    .eq(true)
                    .or(subscriptions::cancel_at_period_end.eq(true)),
            )
            .filter(subscriptions::cancelled.eq(false))
            .filter(subscriptions::expired.eq(false))
            .order(subscriptions::next_payment_at.asc())
            .select(SubscriptionEntity::as_select())
            .load::<SubscriptionEntity>(&mut conn)?;

        Ok(results)
    }

    async fn close_due_subscription(&self, subscription_id: Uuid, cancelled: bool) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let changed = update(subscriptions::table)
            .filter(subscriptions::id.eq(subscription_id))
            .filter(subscriptions::cancelled.eq(false))
            .filter(subscriptions::expired.eq(false))
            .set((
                subscriptions::active.eq(false),
                subscriptions::expired.eq(!cancelled),
                subscriptions::cancelled.eq(cancelled),
                subscriptions::status.eq(PaymentStatus::Failed.to_string()),
                subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(changed > 0)
    }
}
