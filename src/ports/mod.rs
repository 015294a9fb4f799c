//! Storage seam for the ledger update flow.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::{Transaction, Wallet};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row".to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepositoryError::Conflict(db.message().to_string())
            }
            other => RepositoryError::Database(other),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// One read-modify-write sequence over a transaction, its wallet and its
/// satellite record.
///
/// Rows returned by the `lock_*` methods stay locked until the unit is
/// committed or dropped. Dropping without `commit` discards every write.
/// A failed `mirror_*` call discards only its own write.
#[async_trait]
pub trait LedgerUnit: Send {
    async fn lock_transaction(&mut self, id: Uuid) -> RepositoryResult<Transaction>;

    async fn lock_wallet(&mut self, id: Uuid) -> RepositoryResult<Wallet>;

    /// True once a balance mutation has been recorded for `transaction_id`.
    async fn has_ledger_entry(&mut self, transaction_id: Uuid) -> RepositoryResult<bool>;

    /// Writes the new balance and a ledger entry keyed by `transaction_id`.
    async fn record_settlement(
        &mut self,
        wallet_id: Uuid,
        transaction_id: Uuid,
        delta: &BigDecimal,
        new_balance: &BigDecimal,
    ) -> RepositoryResult<Wallet>;

    async fn write_transaction_status(&mut self, id: Uuid, status: &str) -> RepositoryResult<Transaction>;

    async fn mirror_deposit_status(&mut self, deposit_id: Uuid, status: &str) -> RepositoryResult<()>;

    async fn mirror_withdrawal_status(
        &mut self,
        withdrawal_id: Uuid,
        status: &str,
        processed_at: Option<DateTime<Utc>>,
    ) -> RepositoryResult<()>;

    /// Updates the linked card and every card bought by `purchase_transaction_id`,
    /// leaving cards that were already used untouched.
    async fn mirror_gift_card_status(
        &mut self,
        card_id: Uuid,
        purchase_transaction_id: Uuid,
        card_status: &str,
    ) -> RepositoryResult<()>;

    async fn commit(self: Box<Self>) -> RepositoryResult<()>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    async fn begin(&self) -> RepositoryResult<Box<dyn LedgerUnit>>;
}
