use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{Transaction, UserGiftCard};
use crate::db::queries;
use crate::domain::gift_card::{self, CARD_ACTIVE, CARD_PENDING};
use crate::domain::TransactionKind;
use crate::error::AppError;
use crate::validation::validate_quantity;

#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub user_id: Uuid,
    pub wallet_id: Uuid,
    pub catalog_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct PurchaseOutcome {
    pub transaction: Transaction,
    pub cards: Vec<UserGiftCard>,
    pub total_price: BigDecimal,
    pub wallet_balance: BigDecimal,
}

#[derive(Debug, Serialize)]
pub struct GiftCardValidation {
    pub code: String,
    pub status: String,
    pub face_value: BigDecimal,
    pub currency: String,
    pub expires_at: DateTime<Utc>,
    pub valid: bool,
}

impl GiftCardValidation {
    pub fn from_card(card: &UserGiftCard, now: DateTime<Utc>) -> Self {
        let status = gift_card::effective_status(&card.status, card.expires_at, now);
        Self {
            code: card.code.clone(),
            status: status.to_string(),
            face_value: card.face_value.clone(),
            currency: card.currency.clone(),
            expires_at: card.expires_at,
            valid: status == CARD_ACTIVE,
        }
    }
}

#[derive(Clone)]
pub struct GiftCardService {
    pool: PgPool,
    validity: Duration,
}

impl GiftCardService {
    pub fn new(pool: PgPool, validity_days: i64) -> Self {
        Self {
            pool,
            validity: Duration::days(validity_days),
        }
    }

    /// Buys `quantity` cards from the catalog, debiting the wallet immediately.
    ///
    /// Stock is taken with a conditional decrement, so two buyers can never
    /// take the same last unit. The purchase transaction starts `pending` and
    /// its cards become usable once it completes.
    pub async fn purchase(&self, request: PurchaseRequest) -> Result<PurchaseOutcome, AppError> {
        validate_quantity(request.quantity)?;

        let mut tx = self.pool.begin().await?;

        let entry = match queries::decrement_stock(&mut tx, request.catalog_id, request.quantity).await? {
            Some(entry) => entry,
            None => {
                let exists = queries::catalog_entry_exists(&mut tx, request.catalog_id).await?;
                tx.rollback().await?;
                return Err(if exists {
                    AppError::Conflict(format!(
                        "Gift card {} has fewer than {} units in stock",
                        request.catalog_id, request.quantity
                    ))
                } else {
                    AppError::NotFound(format!("Gift card catalog entry {}", request.catalog_id))
                });
            }
        };

        let wallet = queries::lock_wallet(&mut tx, request.wallet_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Wallet {}", request.wallet_id)))?;

        if wallet.user_id != request.user_id {
            return Err(AppError::BadRequest(format!(
                "Wallet {} does not belong to user {}",
                wallet.id, request.user_id
            )));
        }
        if wallet.currency != entry.currency {
            return Err(AppError::BadRequest(format!(
                "Wallet currency {} does not match gift card currency {}",
                wallet.currency, entry.currency
            )));
        }

        let total_price = gift_card::purchase_price(&entry.face_value, &entry.discount_percentage, request.quantity);
        if total_price <= BigDecimal::from(0) {
            return Err(AppError::Validation("amount: purchase price must be greater than zero".to_string()));
        }
        if wallet.balance < total_price {
            return Err(AppError::InsufficientFunds(format!(
                "wallet {} holds {} but the purchase costs {}",
                wallet.id, wallet.balance, total_price
            )));
        }

        let purchase = Transaction::new(
            request.user_id,
            wallet.id,
            TransactionKind::GiftCardPurchase.as_str(),
            total_price.clone(),
            entry.currency.clone(),
            Some(json!({
                "catalog_id": entry.id,
                "brand": entry.brand,
                "quantity": request.quantity,
                "face_value": entry.face_value.to_string(),
                "discount_percentage": entry.discount_percentage.to_string(),
            })),
        );
        let purchase = queries::insert_transaction(&mut tx, &purchase).await?;

        let delta = -total_price.clone();
        let new_balance = &wallet.balance + &delta;
        let wallet = queries::apply_wallet_delta(&mut tx, wallet.id, purchase.id, &delta, &new_balance)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Wallet {}", request.wallet_id)))?;

        let now = Utc::now();
        let mut cards = Vec::with_capacity(request.quantity as usize);
        for _ in 0..request.quantity {
            let card = UserGiftCard {
                id: Uuid::new_v4(),
                user_id: request.user_id,
                catalog_id: entry.id,
                code: gift_card::generate_code(),
                face_value: entry.face_value.clone(),
                currency: entry.currency.clone(),
                status: CARD_PENDING.to_string(),
                expires_at: now + self.validity,
                purchase_transaction_id: Some(purchase.id),
                redeemed_at: None,
                created_at: now,
                updated_at: now,
            };
            cards.push(queries::insert_user_gift_card(&mut tx, &card).await?);
        }

        let purchase = match cards.first() {
            Some(first) => queries::link_transaction_gift_card(&mut tx, purchase.id, first.id).await?,
            None => purchase,
        };

        tx.commit().await?;

        tracing::info!(
            transaction_id = %purchase.id,
            catalog_id = %entry.id,
            quantity = request.quantity,
            total_price = %total_price,
            remaining_stock = entry.stock,
            "Gift cards purchased"
        );

        Ok(PurchaseOutcome {
            transaction: purchase,
            cards,
            total_price,
            wallet_balance: wallet.balance,
        })
    }

    pub async fn validate(&self, code: &str) -> Result<GiftCardValidation, AppError> {
        let card = queries::get_gift_card_by_code(&self.pool, code.trim())
            .await
            .map_err(|e| AppError::from_db(e, format!("Gift card {}", code.trim())))?;

        Ok(GiftCardValidation::from_card(&card, Utc::now()))
    }

    /// Marks a card used. Only active, unexpired cards owned by the caller qualify.
    pub async fn redeem(&self, code: &str, user_id: Uuid) -> Result<UserGiftCard, AppError> {
        let code = code.trim();
        if let Some(card) = queries::redeem_gift_card(&self.pool, code, user_id).await? {
            tracing::info!(card_id = %card.id, user_id = %user_id, "Gift card redeemed");
            return Ok(card);
        }

        let card = queries::get_gift_card_by_code(&self.pool, code)
            .await
            .map_err(|e| AppError::from_db(e, format!("Gift card {}", code)))?;

        if card.user_id != user_id {
            return Err(AppError::NotFound(format!("Gift card {}", code)));
        }

        let status = gift_card::effective_status(&card.status, card.expires_at, Utc::now());
        Err(AppError::Conflict(format!(
            "Gift card {} cannot be redeemed while {}",
            code, status
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gift_card::{CARD_EXPIRED, CARD_USED};

    fn card(status: &str, expires_at: DateTime<Utc>) -> UserGiftCard {
        let now = Utc::now();
        UserGiftCard {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            catalog_id: Uuid::new_v4(),
            code: "GC-ABCD-EF01-2345".to_string(),
            face_value: BigDecimal::from(25),
            currency: "USD".to_string(),
            status: status.to_string(),
            expires_at,
            purchase_transaction_id: None,
            redeemed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn active_unexpired_card_is_valid() {
        let now = Utc::now();
        let report = GiftCardValidation::from_card(&card(CARD_ACTIVE, now + Duration::days(30)), now);
        assert!(report.valid);
        assert_eq!(report.status, CARD_ACTIVE);
    }

    #[test]
    fn expired_card_is_reported_expired() {
        let now = Utc::now();
        let report = GiftCardValidation::from_card(&card(CARD_ACTIVE, now - Duration::minutes(1)), now);
        assert!(!report.valid);
        assert_eq!(report.status, CARD_EXPIRED);
    }

    #[test]
    fn pending_and_used_cards_are_not_valid() {
        let now = Utc::now();
        let later = now + Duration::days(30);
        assert!(!GiftCardValidation::from_card(&card(CARD_PENDING, later), now).valid);
        assert!(!GiftCardValidation::from_card(&card(CARD_USED, later), now).valid);
    }
}
