//! Postgres implementation of LedgerStore.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction as SqlxTransaction};
use uuid::Uuid;

use crate::db::models::{Transaction, Wallet};
use crate::db::queries;
use crate::ports::{LedgerStore, LedgerUnit, RepositoryError, RepositoryResult};

/// Postgres-backed ledger store. Each unit is one database transaction and
/// every row it reads is taken with `FOR UPDATE`.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PostgresLedgerUnit {
    tx: SqlxTransaction<'static, Postgres>,
}

#[async_trait]
impl LedgerUnit for PostgresLedgerUnit {
    async fn lock_transaction(&mut self, id: Uuid) -> RepositoryResult<Transaction> {
        queries::lock_transaction(&mut self.tx, id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Transaction {}", id)))
    }

    async fn lock_wallet(&mut self, id: Uuid) -> RepositoryResult<Wallet> {
        queries::lock_wallet(&mut self.tx, id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Wallet {}", id)))
    }

    async fn has_ledger_entry(&mut self, transaction_id: Uuid) -> RepositoryResult<bool> {
        Ok(queries::ledger_entry_exists(&mut self.tx, transaction_id).await?)
    }

    async fn record_settlement(
        &mut self,
        wallet_id: Uuid,
        transaction_id: Uuid,
        delta: &BigDecimal,
        new_balance: &BigDecimal,
    ) -> RepositoryResult<Wallet> {
        let wallet = queries::apply_wallet_delta(&mut self.tx, wallet_id, transaction_id, delta, new_balance)
            .await
            .map_err(|e| match RepositoryError::from(e) {
                RepositoryError::Conflict(_) => RepositoryError::Conflict(format!(
                    "Transaction {} has already been settled",
                    transaction_id
                )),
                other => other,
            })?;

        wallet.ok_or_else(|| RepositoryError::NotFound(format!("Wallet {}", wallet_id)))
    }

    async fn write_transaction_status(&mut self, id: Uuid, status: &str) -> RepositoryResult<Transaction> {
        queries::set_transaction_status(&mut self.tx, id, status)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Transaction {}", id)))
    }

    async fn mirror_deposit_status(&mut self, deposit_id: Uuid, status: &str) -> RepositoryResult<()> {
        self.begin_mirror().await?;
        let result = match queries::set_deposit_status(&mut self.tx, deposit_id, status).await {
            Ok(0) => Err(RepositoryError::NotFound(format!("Deposit {}", deposit_id))),
            Ok(_) => Ok(()),
            Err(e) => Err(e.into()),
        };
        self.end_mirror(result).await
    }

    async fn mirror_withdrawal_status(
        &mut self,
        withdrawal_id: Uuid,
        status: &str,
        processed_at: Option<DateTime<Utc>>,
    ) -> RepositoryResult<()> {
        self.begin_mirror().await?;
        let result = match queries::set_withdrawal_status(&mut self.tx, withdrawal_id, status, processed_at).await {
            Ok(0) => Err(RepositoryError::NotFound(format!("Withdrawal {}", withdrawal_id))),
            Ok(_) => Ok(()),
            Err(e) => Err(e.into()),
        };
        self.end_mirror(result).await
    }

    async fn mirror_gift_card_status(
        &mut self,
        card_id: Uuid,
        purchase_transaction_id: Uuid,
        card_status: &str,
    ) -> RepositoryResult<()> {
        self.begin_mirror().await?;
        let result = self
            .write_gift_card_status(card_id, purchase_transaction_id, card_status)
            .await;
        self.end_mirror(result).await
    }

    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        let unit = *self;
        unit.tx.commit().await?;
        Ok(())
    }
}

impl PostgresLedgerUnit {
    async fn begin_mirror(&mut self) -> RepositoryResult<()> {
        sqlx::query("SAVEPOINT satellite_mirror").execute(&mut *self.tx).await?;
        Ok(())
    }

    /// Releases the savepoint on success and rolls back to it on failure, so
    /// the primary writes of the unit survive a failed mirror.
    async fn end_mirror(&mut self, result: RepositoryResult<()>) -> RepositoryResult<()> {
        let statement = if result.is_ok() {
            "RELEASE SAVEPOINT satellite_mirror"
        } else {
            "ROLLBACK TO SAVEPOINT satellite_mirror"
        };
        sqlx::query(statement).execute(&mut *self.tx).await?;
        result
    }

    async fn write_gift_card_status(
        &mut self,
        card_id: Uuid,
        purchase_transaction_id: Uuid,
        card_status: &str,
    ) -> RepositoryResult<()> {
        if !queries::gift_card_exists(&mut self.tx, card_id).await? {
            return Err(RepositoryError::NotFound(format!("Gift card {}", card_id)));
        }
        queries::set_purchase_gift_card_status(&mut self.tx, card_id, purchase_transaction_id, card_status).await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> RepositoryResult<Box<dyn LedgerUnit>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresLedgerUnit { tx }))
    }
}
