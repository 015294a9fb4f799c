//! In-process LedgerStore.
//!
//! A unit holds the store mutex for its whole lifetime, so concurrent status
//! updates serialize exactly like row-locked Postgres units do.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::db::models::{DepositRecord, LedgerEntry, Transaction, UserGiftCard, Wallet, WithdrawalRecord};
use crate::domain::gift_card::CARD_USED;
use crate::ports::{LedgerStore, LedgerUnit, RepositoryError, RepositoryResult};

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub transactions: HashMap<Uuid, Transaction>,
    pub wallets: HashMap<Uuid, Wallet>,
    pub ledger: Vec<LedgerEntry>,
    pub deposits: HashMap<Uuid, DepositRecord>,
    pub withdrawals: HashMap<Uuid, WithdrawalRecord>,
    pub gift_cards: HashMap<Uuid, UserGiftCard>,
}

#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
    fail_mirror_writes: Arc<AtomicBool>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every satellite mirror write fail until switched off again.
    pub fn set_fail_mirror_writes(&self, fail: bool) {
        self.fail_mirror_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn insert_wallet(&self, wallet: Wallet) {
        self.state.lock().await.wallets.insert(wallet.id, wallet);
    }

    pub async fn insert_transaction(&self, tx: Transaction) {
        self.state.lock().await.transactions.insert(tx.id, tx);
    }

    pub async fn insert_deposit(&self, deposit: DepositRecord) {
        self.state.lock().await.deposits.insert(deposit.id, deposit);
    }

    pub async fn insert_withdrawal(&self, withdrawal: WithdrawalRecord) {
        self.state.lock().await.withdrawals.insert(withdrawal.id, withdrawal);
    }

    pub async fn insert_gift_card(&self, card: UserGiftCard) {
        self.state.lock().await.gift_cards.insert(card.id, card);
    }

    pub async fn wallet(&self, id: Uuid) -> Option<Wallet> {
        self.state.lock().await.wallets.get(&id).cloned()
    }

    pub async fn transaction(&self, id: Uuid) -> Option<Transaction> {
        self.state.lock().await.transactions.get(&id).cloned()
    }

    pub async fn deposit(&self, id: Uuid) -> Option<DepositRecord> {
        self.state.lock().await.deposits.get(&id).cloned()
    }

    pub async fn withdrawal(&self, id: Uuid) -> Option<WithdrawalRecord> {
        self.state.lock().await.withdrawals.get(&id).cloned()
    }

    pub async fn gift_card(&self, id: Uuid) -> Option<UserGiftCard> {
        self.state.lock().await.gift_cards.get(&id).cloned()
    }

    pub async fn ledger_entries(&self, wallet_id: Uuid) -> Vec<LedgerEntry> {
        self.state
            .lock()
            .await
            .ledger
            .iter()
            .filter(|entry| entry.wallet_id == wallet_id)
            .cloned()
            .collect()
    }
}

pub struct MemoryLedgerUnit {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_mirror_writes: Arc<AtomicBool>,
}

impl MemoryLedgerUnit {
    fn check_mirror_writes(&self) -> RepositoryResult<()> {
        if self.fail_mirror_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerUnit for MemoryLedgerUnit {
    async fn lock_transaction(&mut self, id: Uuid) -> RepositoryResult<Transaction> {
        self.working
            .transactions
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("Transaction {}", id)))
    }

    async fn lock_wallet(&mut self, id: Uuid) -> RepositoryResult<Wallet> {
        self.working
            .wallets
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("Wallet {}", id)))
    }

    async fn has_ledger_entry(&mut self, transaction_id: Uuid) -> RepositoryResult<bool> {
        Ok(self.working.ledger.iter().any(|e| e.transaction_id == transaction_id))
    }

    async fn record_settlement(
        &mut self,
        wallet_id: Uuid,
        transaction_id: Uuid,
        delta: &BigDecimal,
        new_balance: &BigDecimal,
    ) -> RepositoryResult<Wallet> {
        if self.working.ledger.iter().any(|e| e.transaction_id == transaction_id) {
            return Err(RepositoryError::Conflict(format!(
                "Transaction {} has already been settled",
                transaction_id
            )));
        }

        let now = Utc::now();
        let wallet = self
            .working
            .wallets
            .get_mut(&wallet_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Wallet {}", wallet_id)))?;
        wallet.balance = new_balance.clone();
        wallet.updated_at = now;
        let wallet = wallet.clone();

        self.working.ledger.push(LedgerEntry {
            id: Uuid::new_v4(),
            wallet_id,
            transaction_id,
            delta: delta.clone(),
            balance_after: new_balance.clone(),
            created_at: now,
        });

        Ok(wallet)
    }

    async fn write_transaction_status(&mut self, id: Uuid, status: &str) -> RepositoryResult<Transaction> {
        let tx = self
            .working
            .transactions
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Transaction {}", id)))?;
        tx.status = status.to_string();
        tx.updated_at = Utc::now();
        Ok(tx.clone())
    }

    async fn mirror_deposit_status(&mut self, deposit_id: Uuid, status: &str) -> RepositoryResult<()> {
        self.check_mirror_writes()?;
        let deposit = self
            .working
            .deposits
            .get_mut(&deposit_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Deposit {}", deposit_id)))?;
        deposit.status = status.to_string();
        deposit.updated_at = Utc::now();
        Ok(())
    }

    async fn mirror_withdrawal_status(
        &mut self,
        withdrawal_id: Uuid,
        status: &str,
        processed_at: Option<DateTime<Utc>>,
    ) -> RepositoryResult<()> {
        self.check_mirror_writes()?;
        let withdrawal = self
            .working
            .withdrawals
            .get_mut(&withdrawal_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Withdrawal {}", withdrawal_id)))?;
        withdrawal.status = status.to_string();
        withdrawal.processed_at = processed_at;
        withdrawal.updated_at = Utc::now();
        Ok(())
    }

    async fn mirror_gift_card_status(
        &mut self,
        card_id: Uuid,
        purchase_transaction_id: Uuid,
        card_status: &str,
    ) -> RepositoryResult<()> {
        self.check_mirror_writes()?;
        if !self.working.gift_cards.contains_key(&card_id) {
            return Err(RepositoryError::NotFound(format!("Gift card {}", card_id)));
        }

        let now = Utc::now();
        for card in self.working.gift_cards.values_mut() {
            let linked = card.id == card_id || card.purchase_transaction_id == Some(purchase_transaction_id);
            if linked && card.status != CARD_USED {
                card.status = card_status.to_string();
                card.updated_at = now;
            }
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        let MemoryLedgerUnit { mut guard, working, .. } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> RepositoryResult<Box<dyn LedgerUnit>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryLedgerUnit {
            guard,
            working,
            fail_mirror_writes: self.fail_mirror_writes.clone(),
        }))
    }
}
