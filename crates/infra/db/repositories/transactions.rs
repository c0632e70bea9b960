use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::transactions},
};
use domain::{
    entities::transactions::TransactionEntity,
    repositories::transactions::TransactionRepository,
    value_objects::enums::payment_statuses::PaymentStatus,
};

pub struct TransactionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl TransactionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl TransactionRepository for TransactionPostgres {
    async fn find_by_id(&self, transaction_id: Uuid) -> Result<Option<TransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = transactions::table
            .filter(transactions::id.eq(transaction_id))
            .select(TransactionEntity::as_select())
            .first::<TransactionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<TransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = transactions::table
            .filter(transactions::reference.eq(reference))
            .select(TransactionEntity::as_select())
            .first::<TransactionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn set_reference(&self, transaction_id: Uuid, reference: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(transactions::table)
            .filter(transactions::id.eq(transaction_id))
            .set((
                transactions::reference.eq(Some(reference)),
                transactions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn mark_paid(
        &self,
        transaction_id: Uuid,
        fee: Option<i64>,
        paid_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let changed = update(transactions::table)
            .filter(transactions::id.eq(transaction_id))
            .filter(transactions::paid_at.is_null())
            .set((
                transactions::status.eq(PaymentStatus::Success.to_string()),
                transactions::paid_at.eq(Some(paid_at)),
                transactions::fee.eq(fee),
                transactions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(changed > 0)
    }

    async fn update_fee(&self, transaction_id: Uuid, fee: Option<i64>) -> Result<()> {
        let Some(fee) = fee else {
            return Ok(());
        };

        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(transactions::table)
            .filter(transactions::id.eq(transaction_id))
            .set((
                transactions::fee.eq(Some(fee)),
                transactions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }
}
