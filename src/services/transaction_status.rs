use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::models::Transaction;
use crate::domain::gift_card::card_status_for;
use crate::domain::transaction::{requires_settlement, settlement_effect, status_fits, STATUS_COMPLETED};
use crate::error::AppError;
use crate::handlers::ws::TransactionStatusUpdate;
use crate::ports::{LedgerStore, LedgerUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SatelliteKind {
    Deposit,
    Withdrawal,
    GiftCard,
}

/// Result of mirroring the new status onto the linked satellite record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SatelliteOutcome {
    None,
    Updated { kind: SatelliteKind, id: Uuid, status: String },
    Failed { kind: SatelliteKind, id: Uuid, error: String },
}

impl SatelliteOutcome {
    pub fn is_consistent(&self) -> bool {
        !matches!(self, SatelliteOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdateOutcome {
    pub transaction: Transaction,
    pub balance_updated: bool,
    pub wallet_balance: Option<BigDecimal>,
    pub satellite: SatelliteOutcome,
}

/// Settles transactions against their wallets and propagates status changes.
#[derive(Clone)]
pub struct TransactionStatusService {
    store: Arc<dyn LedgerStore>,
    updates: Option<broadcast::Sender<TransactionStatusUpdate>>,
}

impl TransactionStatusService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store, updates: None }
    }

    pub fn with_broadcast(mut self, updates: broadcast::Sender<TransactionStatusUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    pub fn backend_tag(&self) -> &'static str {
        self.store.backend_tag()
    }

    /// Moves a transaction to `new_status`.
    ///
    /// The transaction row and its wallet are read, adjusted and written in a
    /// single unit, so a transaction is credited or debited at most once, even
    /// when it is settled again after a reversal. The satellite mirror runs in
    /// the same unit while the rows are still locked; its failure is reported
    /// in the outcome and never undoes the primary write.
    pub async fn update_status(&self, transaction_id: Uuid, new_status: &str) -> Result<StatusUpdateOutcome, AppError> {
        if !status_fits(new_status) {
            return Err(AppError::Validation("new_status: must be at most 32 characters".to_string()));
        }

        let mut unit = self.store.begin().await?;
        let current = unit.lock_transaction(transaction_id).await?;

        let mut balance_updated = false;
        let mut wallet_balance = None;

        if requires_settlement(&current.status, new_status) {
            let wallet = unit.lock_wallet(current.wallet_id).await?;
            let already_settled = unit.has_ledger_entry(current.id).await?;

            match settlement_effect(&current.transaction_type) {
                Some(_) if already_settled => {
                    info!(
                        transaction_id = %current.id,
                        from = %current.status,
                        "Transaction already settled once, leaving balance untouched"
                    );
                    wallet_balance = Some(wallet.balance);
                }
                Some(effect) => {
                    if let Some(delta) = effect.delta(&current.amount) {
                        let new_balance = &wallet.balance + &delta;
                        if new_balance < BigDecimal::from(0) {
                            return Err(AppError::InsufficientFunds(format!(
                                "wallet {} holds {} but transaction {} needs {}",
                                wallet.id, wallet.balance, current.id, current.amount
                            )));
                        }

                        let updated = unit
                            .record_settlement(wallet.id, current.id, &delta, &new_balance)
                            .await?;
                        balance_updated = true;
                        wallet_balance = Some(updated.balance);
                    } else {
                        wallet_balance = Some(wallet.balance);
                    }
                }
                None => {
                    warn!(
                        transaction_id = %current.id,
                        transaction_type = %current.transaction_type,
                        "Unknown transaction type, settling status without touching balance"
                    );
                    wallet_balance = Some(wallet.balance);
                }
            }
        }

        let updated = unit.write_transaction_status(transaction_id, new_status).await?;
        let satellite = propagate(unit.as_mut(), &updated).await;
        unit.commit().await?;

        info!(
            transaction_id = %updated.id,
            from = %current.status,
            to = %updated.status,
            balance_updated,
            backend = self.store.backend_tag(),
            "Transaction status updated"
        );

        if let Some(updates) = &self.updates {
            // No subscribers is not an error.
            let _ = updates.send(TransactionStatusUpdate {
                transaction_id: updated.id,
                status: updated.status.clone(),
                balance_updated,
                timestamp: Utc::now(),
            });
        }

        Ok(StatusUpdateOutcome {
            transaction: updated,
            balance_updated,
            wallet_balance,
            satellite,
        })
    }
}

/// Mirrors the transaction status onto its first linked satellite record.
async fn propagate(unit: &mut dyn LedgerUnit, tx: &Transaction) -> SatelliteOutcome {
    let (kind, id, status, result) = if let Some(deposit_id) = tx.deposit_id {
        let result = unit.mirror_deposit_status(deposit_id, &tx.status).await;
        (SatelliteKind::Deposit, deposit_id, tx.status.clone(), result)
    } else if let Some(withdrawal_id) = tx.withdrawal_id {
        let processed_at = (tx.status == STATUS_COMPLETED).then(Utc::now);
        let result = unit
            .mirror_withdrawal_status(withdrawal_id, &tx.status, processed_at)
            .await;
        (SatelliteKind::Withdrawal, withdrawal_id, tx.status.clone(), result)
    } else if let Some(card_id) = tx.user_giftcard_id {
        let card_status = card_status_for(&tx.status);
        let result = unit.mirror_gift_card_status(card_id, tx.id, card_status).await;
        (SatelliteKind::GiftCard, card_id, card_status.to_string(), result)
    } else {
        return SatelliteOutcome::None;
    };

    match result {
        Ok(()) => SatelliteOutcome::Updated { kind, id, status },
        Err(e) => {
            error!(
                transaction_id = %tx.id,
                satellite = ?kind,
                satellite_id = %id,
                error = %e,
                "Failed to mirror transaction status onto satellite record"
            );
            SatelliteOutcome::Failed {
                kind,
                id,
                error: e.to_string(),
            }
        }
    }
}
