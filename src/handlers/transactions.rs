use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::Transaction;
use crate::db::queries;
use crate::domain::TransactionKind;
use crate::error::AppError;
use crate::handlers::auth::SignedBody;
use crate::services::StatusUpdateOutcome;
use crate::validation::{validate_currency, validate_positive_amount, validate_transaction_type};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusRequest {
    pub transaction_id: Uuid,
    pub new_status: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateStatusResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: StatusUpdateOutcome,
}

/// `{transaction_id, new_status}` in, `{success, transaction, balance_updated, ...}` out.
pub async fn update_status(
    State(state): State<AppState>,
    SignedBody(body): SignedBody,
) -> Result<impl IntoResponse, AppError> {
    let request: UpdateStatusRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?;

    let outcome = state
        .status_service
        .update_status(request.transaction_id, &request.new_status)
        .await?;

    Ok(Json(UpdateStatusResponse {
        success: true,
        outcome,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTransactionRequest {
    pub user_id: Uuid,
    pub wallet_id: Uuid,
    pub transaction_type: String,
    pub amount: BigDecimal,
    pub currency: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Records a pending crypto, bill-payment or mobile top-up transaction.
/// Deposits, withdrawals and gift-card purchases have their own endpoints
/// because they carry a satellite record.
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(payload): Json<CreateTransactionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let kind = validate_transaction_type(&payload.transaction_type)?;
    if matches!(
        kind,
        TransactionKind::Deposit | TransactionKind::Withdrawal | TransactionKind::GiftCardPurchase
    ) {
        return Err(AppError::BadRequest(format!(
            "{} transactions are created through their dedicated endpoint",
            kind
        )));
    }
    validate_positive_amount(&payload.amount)?;

    let wallet = queries::get_wallet(&state.db, payload.wallet_id)
        .await
        .map_err(|e| AppError::from_db(e, format!("Wallet {}", payload.wallet_id)))?;
    if wallet.user_id != payload.user_id {
        return Err(AppError::BadRequest(format!(
            "Wallet {} does not belong to user {}",
            wallet.id, payload.user_id
        )));
    }

    let currency = match payload.currency {
        Some(currency) => validate_currency(&currency)?,
        None => wallet.currency.clone(),
    };

    let tx = Transaction::new(
        payload.user_id,
        wallet.id,
        kind.as_str(),
        payload.amount,
        currency,
        payload.metadata,
    );
    let inserted = insert_standalone(&state.db, &tx).await?;

    tracing::info!(transaction_id = %inserted.id, transaction_type = %kind, "Transaction recorded");
    Ok((StatusCode::CREATED, Json(inserted)))
}

async fn insert_standalone(pool: &PgPool, tx: &Transaction) -> Result<Transaction, AppError> {
    let mut db_tx = pool.begin().await?;
    let inserted = queries::insert_transaction(&mut db_tx, tx).await?;
    db_tx.commit().await?;
    Ok(inserted)
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let tx = queries::get_transaction(&state.db, id)
        .await
        .map_err(|e| AppError::from_db(e, format!("Transaction {}", id)))?;

    Ok(Json(tx))
}
