use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::transaction::STATUS_PENDING;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet_id: Uuid,
    pub transaction_type: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: String,
    pub metadata: Option<serde_json::Value>,
    pub deposit_id: Option<Uuid>,
    pub withdrawal_id: Option<Uuid>,
    pub user_giftcard_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        user_id: Uuid,
        wallet_id: Uuid,
        transaction_type: impl Into<String>,
        amount: BigDecimal,
        currency: impl Into<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            wallet_id,
            transaction_type: transaction_type.into(),
            amount,
            currency: currency.into(),
            status: STATUS_PENDING.to_string(),
            metadata,
            deposit_id: None,
            withdrawal_id: None,
            user_giftcard_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: BigDecimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(user_id: Uuid, currency: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            balance: BigDecimal::from(0),
            currency: currency.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Balance mutation written alongside every wallet update.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub transaction_id: Uuid,
    pub delta: BigDecimal,
    pub balance_after: BigDecimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DepositRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub payment_method: String,
    pub narration_code: String,
    pub reference_number: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WithdrawalRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
    pub reference_number: Option<String>,
    pub status: String,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GiftCardCatalogEntry {
    pub id: Uuid,
    pub brand: String,
    pub face_value: BigDecimal,
    pub currency: String,
    pub discount_percentage: BigDecimal,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserGiftCard {
    pub id: Uuid,
    pub user_id: Uuid,
    pub catalog_id: Uuid,
    pub code: String,
    pub face_value: BigDecimal,
    pub currency: String,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub purchase_transaction_id: Option<Uuid>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
