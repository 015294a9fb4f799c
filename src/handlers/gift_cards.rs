use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::models::GiftCardCatalogEntry;
use crate::db::queries;
use crate::error::AppError;
use crate::services::gift_cards::PurchaseRequest;
use crate::validation::{
    validate_currency, validate_discount_percentage, validate_positive_amount, validate_text, ValidationError,
    BRAND_MAX_LEN,
};
use crate::AppState;

pub async fn list_catalog(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let entries = queries::list_catalog(&state.db).await?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCatalogEntryRequest {
    pub brand: String,
    pub face_value: BigDecimal,
    pub currency: String,
    #[serde(default)]
    pub discount_percentage: Option<BigDecimal>,
    pub stock: i32,
}

pub async fn create_catalog_entry(
    State(state): State<AppState>,
    Json(payload): Json<CreateCatalogEntryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let brand = validate_text("brand", &payload.brand, BRAND_MAX_LEN)?;
    validate_positive_amount(&payload.face_value)?;
    let currency = validate_currency(&payload.currency)?;
    let discount = payload.discount_percentage.unwrap_or_else(|| BigDecimal::from(0));
    validate_discount_percentage(&discount)?;
    if payload.stock < 0 {
        return Err(ValidationError::new("stock", "must not be negative").into());
    }

    let now = Utc::now();
    let entry = GiftCardCatalogEntry {
        id: Uuid::new_v4(),
        brand,
        face_value: payload.face_value,
        currency,
        discount_percentage: discount,
        stock: payload.stock,
        created_at: now,
        updated_at: now,
    };
    let entry = queries::insert_catalog_entry(&state.db, &entry).await?;

    tracing::info!(catalog_id = %entry.id, brand = %entry.brand, stock = entry.stock, "Gift card listed");
    Ok((StatusCode::CREATED, Json(entry)))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PurchaseGiftCardRequest {
    pub user_id: Uuid,
    pub wallet_id: Uuid,
    pub catalog_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

pub async fn purchase(
    State(state): State<AppState>,
    Json(payload): Json<PurchaseGiftCardRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .gift_cards
        .purchase(PurchaseRequest {
            user_id: payload.user_id,
            wallet_id: payload.wallet_id,
            catalog_id: payload.catalog_id,
            quantity: payload.quantity,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn validate(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let report = state.gift_cards.validate(&code).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedeemRequest {
    pub code: String,
    pub user_id: Uuid,
}

pub async fn redeem(
    State(state): State<AppState>,
    Json(payload): Json<RedeemRequest>,
) -> Result<impl IntoResponse, AppError> {
    let card = state.gift_cards.redeem(&payload.code, payload.user_id).await?;
    Ok(Json(card))
}
