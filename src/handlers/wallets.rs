use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::db::models::{DepositRecord, Transaction, Wallet, WithdrawalRecord};
use crate::db::queries;
use crate::domain::transaction::STATUS_PENDING;
use crate::domain::TransactionKind;
use crate::error::AppError;
use crate::validation::{
    validate_account_number, validate_currency, validate_enum, validate_positive_amount, validate_text,
    BANK_FIELD_MAX_LEN, NARRATION_CODE_MAX_LEN, PAYMENT_METHOD_MAX_LEN, REFERENCE_MAX_LEN,
};
use crate::AppState;

pub const PAYMENT_METHODS: &[&str] = &["bank_transfer", "card", "ussd"];

#[derive(Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateWalletRequest {
    pub user_id: Uuid,
    pub currency: String,
}

pub async fn create_wallet(
    State(state): State<AppState>,
    Json(payload): Json<CreateWalletRequest>,
) -> Result<impl IntoResponse, AppError> {
    let currency = validate_currency(&payload.currency)?;
    let wallet = Wallet::new(payload.user_id, currency);

    let inserted = queries::insert_wallet(&state.db, &wallet)
        .await
        .map_err(|e| AppError::from_db(e, format!("Wallet for user {}", payload.user_id)))?;

    tracing::info!(wallet_id = %inserted.id, user_id = %inserted.user_id, "Wallet created");
    Ok((StatusCode::CREATED, Json(inserted)))
}

pub async fn get_wallet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let wallet = queries::get_wallet(&state.db, id)
        .await
        .map_err(|e| AppError::from_db(e, format!("Wallet {}", id)))?;

    Ok(Json(wallet))
}

pub async fn list_wallet_transactions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let limit = pagination.limit.unwrap_or(20).clamp(1, 100);
    let offset = pagination.offset.unwrap_or(0).max(0);

    let transactions = queries::list_wallet_transactions(&state.db, id, limit, offset).await?;

    Ok(Json(transactions))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDepositRequest {
    pub amount: BigDecimal,
    pub payment_method: String,
    pub narration_code: Option<String>,
    pub reference_number: Option<String>,
}

/// Narration code quoted on the bank transfer so it can be matched to the deposit.
pub fn generate_narration_code() -> String {
    let raw = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
    format!("DEP-{}", &raw[..10])
}

pub async fn create_deposit(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
    Json(payload): Json<CreateDepositRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_positive_amount(&payload.amount)?;
    let payment_method = validate_text("payment_method", &payload.payment_method, PAYMENT_METHOD_MAX_LEN)?;
    validate_enum("payment_method", &payment_method, PAYMENT_METHODS)?;
    let narration_code = match payload.narration_code {
        Some(code) => validate_text("narration_code", &code, NARRATION_CODE_MAX_LEN)?,
        None => generate_narration_code(),
    };
    let reference_number = payload
        .reference_number
        .map(|reference| validate_text("reference_number", &reference, REFERENCE_MAX_LEN))
        .transpose()?;

    let wallet = queries::get_wallet(&state.db, wallet_id)
        .await
        .map_err(|e| AppError::from_db(e, format!("Wallet {}", wallet_id)))?;

    let now = Utc::now();
    let deposit = DepositRecord {
        id: Uuid::new_v4(),
        user_id: wallet.user_id,
        wallet_id: wallet.id,
        amount: payload.amount.clone(),
        currency: wallet.currency.clone(),
        payment_method,
        narration_code: narration_code.clone(),
        reference_number,
        status: STATUS_PENDING.to_string(),
        created_at: now,
        updated_at: now,
    };

    let mut tx = Transaction::new(
        wallet.user_id,
        wallet.id,
        TransactionKind::Deposit.as_str(),
        payload.amount,
        wallet.currency.clone(),
        Some(json!({ "narration_code": narration_code })),
    );
    tx.deposit_id = Some(deposit.id);

    let (deposit, tx) = queries::create_deposit(&state.db, &deposit, &tx)
        .await
        .map_err(|e| AppError::from_db(e, format!("Deposit with narration code {}", narration_code)))?;

    tracing::info!(deposit_id = %deposit.id, transaction_id = %tx.id, "Deposit requested");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "deposit": deposit, "transaction": tx })),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateWithdrawalRequest {
    pub amount: BigDecimal,
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
}

pub async fn create_withdrawal(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
    Json(payload): Json<CreateWithdrawalRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_positive_amount(&payload.amount)?;
    let bank_name = validate_text("bank_name", &payload.bank_name, BANK_FIELD_MAX_LEN)?;
    let account_name = validate_text("account_name", &payload.account_name, BANK_FIELD_MAX_LEN)?;
    let account_number = validate_account_number(&payload.account_number)?;

    let wallet = queries::get_wallet(&state.db, wallet_id)
        .await
        .map_err(|e| AppError::from_db(e, format!("Wallet {}", wallet_id)))?;

    // Advisory only; the balance is checked again under lock at settlement.
    if wallet.balance < payload.amount {
        return Err(AppError::InsufficientFunds(format!(
            "wallet {} holds {} but {} was requested",
            wallet.id, wallet.balance, payload.amount
        )));
    }

    let now = Utc::now();
    let withdrawal = WithdrawalRecord {
        id: Uuid::new_v4(),
        user_id: wallet.user_id,
        wallet_id: wallet.id,
        amount: payload.amount.clone(),
        currency: wallet.currency.clone(),
        bank_name,
        account_number,
        account_name,
        reference_number: None,
        status: STATUS_PENDING.to_string(),
        processed_at: None,
        created_at: now,
        updated_at: now,
    };

    let mut tx = Transaction::new(
        wallet.user_id,
        wallet.id,
        TransactionKind::Withdrawal.as_str(),
        payload.amount,
        wallet.currency.clone(),
        None,
    );
    tx.withdrawal_id = Some(withdrawal.id);

    let (withdrawal, tx) = queries::create_withdrawal(&state.db, &withdrawal, &tx).await?;

    tracing::info!(withdrawal_id = %withdrawal.id, transaction_id = %tx.id, "Withdrawal requested");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "withdrawal": withdrawal, "transaction": tx })),
    ))
}
