use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::transactions::TransactionEntity;

#[automock]
#[async_trait]
pub trait TransactionRepository {
    async fn find_by_id(&self, transaction_id: Uuid) -> Result<Option<TransactionEntity>>;

    async fn find_by_reference(&self, reference: &str) -> Result<Option<TransactionEntity>>;

    async fn set_reference(&self, transaction_id: Uuid, reference: &str) -> Result<()>;

    /// Marks the transaction paid. Only the first call wins; returns false when
    /// it had already been paid.
    async fn mark_paid(
        &self,
        transaction_id: Uuid,
        fee: Option<i64>,
        paid_at: DateTime<Utc>,
    ) -> Result<bool>;

    async fn update_fee(&self, transaction_id: Uuid, fee: Option<i64>) -> Result<()>;
}
