use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Result, Transaction as SqlxTransaction};
use uuid::Uuid;

use crate::db::models::{
    DepositRecord, GiftCardCatalogEntry, Transaction, UserGiftCard, Wallet, WithdrawalRecord,
};

// --- Wallet Queries ---

pub async fn insert_wallet(pool: &PgPool, wallet: &Wallet) -> Result<Wallet> {
    sqlx::query_as::<_, Wallet>(
        r#"
        INSERT INTO wallets (id, user_id, balance, currency, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(wallet.id)
    .bind(wallet.user_id)
    .bind(&wallet.balance)
    .bind(&wallet.currency)
    .bind(wallet.created_at)
    .bind(wallet.updated_at)
    .fetch_one(pool)
    .await
}

pub async fn get_wallet(pool: &PgPool, id: Uuid) -> Result<Wallet> {
    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
}

pub async fn lock_wallet(executor: &mut SqlxTransaction<'_, Postgres>, id: Uuid) -> Result<Option<Wallet>> {
    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **executor)
        .await
}

/// Writes a new wallet balance together with its ledger entry.
/// A second entry for the same transaction violates `wallet_ledger_entries_transaction_id_key`.
pub async fn apply_wallet_delta(
    executor: &mut SqlxTransaction<'_, Postgres>,
    wallet_id: Uuid,
    transaction_id: Uuid,
    delta: &BigDecimal,
    new_balance: &BigDecimal,
) -> Result<Option<Wallet>> {
    let wallet = sqlx::query_as::<_, Wallet>(
        "UPDATE wallets SET balance = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(new_balance)
    .bind(wallet_id)
    .fetch_optional(&mut **executor)
    .await?;

    if wallet.is_none() {
        return Ok(None);
    }

    sqlx::query(
        r#"
        INSERT INTO wallet_ledger_entries (id, wallet_id, transaction_id, delta, balance_after)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(wallet_id)
    .bind(transaction_id)
    .bind(delta)
    .bind(new_balance)
    .execute(&mut **executor)
    .await?;

    Ok(wallet)
}

pub async fn ledger_entry_exists(
    executor: &mut SqlxTransaction<'_, Postgres>,
    transaction_id: Uuid,
) -> Result<bool> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM wallet_ledger_entries WHERE transaction_id = $1)",
    )
    .bind(transaction_id)
    .fetch_one(&mut **executor)
    .await
}

// --- Transaction Queries ---

pub async fn insert_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    tx: &Transaction,
) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            id, user_id, wallet_id, transaction_type, amount, currency, status, metadata,
            deposit_id, withdrawal_id, user_giftcard_id, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(tx.id)
    .bind(tx.user_id)
    .bind(tx.wallet_id)
    .bind(&tx.transaction_type)
    .bind(&tx.amount)
    .bind(&tx.currency)
    .bind(&tx.status)
    .bind(&tx.metadata)
    .bind(tx.deposit_id)
    .bind(tx.withdrawal_id)
    .bind(tx.user_giftcard_id)
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .fetch_one(&mut **executor)
    .await
}

pub async fn get_transaction(pool: &PgPool, id: Uuid) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
}

pub async fn lock_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **executor)
        .await
}

pub async fn set_transaction_status(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    status: &str,
) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        "UPDATE transactions SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(status)
    .bind(id)
    .fetch_optional(&mut **executor)
    .await
}

pub async fn list_wallet_transactions(
    pool: &PgPool,
    wallet_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE wallet_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(wallet_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

// --- Deposit / Withdrawal Queries ---

/// Inserts the deposit record and its pending transaction in one database transaction.
pub async fn create_deposit(
    pool: &PgPool,
    deposit: &DepositRecord,
    tx: &Transaction,
) -> Result<(DepositRecord, Transaction)> {
    let mut transaction = pool.begin().await?;

    let saved = sqlx::query_as::<_, DepositRecord>(
        r#"
        INSERT INTO wallet_deposit (
            id, user_id, wallet_id, amount, currency, payment_method,
            narration_code, reference_number, status, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(deposit.id)
    .bind(deposit.user_id)
    .bind(deposit.wallet_id)
    .bind(&deposit.amount)
    .bind(&deposit.currency)
    .bind(&deposit.payment_method)
    .bind(&deposit.narration_code)
    .bind(&deposit.reference_number)
    .bind(&deposit.status)
    .bind(deposit.created_at)
    .bind(deposit.updated_at)
    .fetch_one(&mut *transaction)
    .await?;

    let inserted = insert_transaction(&mut transaction, tx).await?;

    transaction.commit().await?;
    Ok((saved, inserted))
}

/// Inserts the withdrawal record and its pending transaction in one database transaction.
pub async fn create_withdrawal(
    pool: &PgPool,
    withdrawal: &WithdrawalRecord,
    tx: &Transaction,
) -> Result<(WithdrawalRecord, Transaction)> {
    let mut transaction = pool.begin().await?;

    let saved = sqlx::query_as::<_, WithdrawalRecord>(
        r#"
        INSERT INTO wallet_withdrawal (
            id, user_id, wallet_id, amount, currency, bank_name, account_number,
            account_name, reference_number, status, processed_at, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(withdrawal.id)
    .bind(withdrawal.user_id)
    .bind(withdrawal.wallet_id)
    .bind(&withdrawal.amount)
    .bind(&withdrawal.currency)
    .bind(&withdrawal.bank_name)
    .bind(&withdrawal.account_number)
    .bind(&withdrawal.account_name)
    .bind(&withdrawal.reference_number)
    .bind(&withdrawal.status)
    .bind(withdrawal.processed_at)
    .bind(withdrawal.created_at)
    .bind(withdrawal.updated_at)
    .fetch_one(&mut *transaction)
    .await?;

    let inserted = insert_transaction(&mut transaction, tx).await?;

    transaction.commit().await?;
    Ok((saved, inserted))
}

pub async fn set_deposit_status(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    status: &str,
) -> Result<u64> {
    let result = sqlx::query("UPDATE wallet_deposit SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(status)
        .bind(id)
        .execute(&mut **executor)
        .await?;
    Ok(result.rows_affected())
}

pub async fn set_withdrawal_status(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    status: &str,
    processed_at: Option<DateTime<Utc>>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE wallet_withdrawal
        SET status = $1, processed_at = $2, updated_at = NOW()
        WHERE id = $3
        "#,
    )
    .bind(status)
    .bind(processed_at)
    .bind(id)
    .execute(&mut **executor)
    .await?;
    Ok(result.rows_affected())
}

// --- Gift Card Queries ---

pub async fn list_catalog(pool: &PgPool) -> Result<Vec<GiftCardCatalogEntry>> {
    sqlx::query_as::<_, GiftCardCatalogEntry>("SELECT * FROM giftcard_catalog ORDER BY brand, face_value")
        .fetch_all(pool)
        .await
}

pub async fn insert_catalog_entry(pool: &PgPool, entry: &GiftCardCatalogEntry) -> Result<GiftCardCatalogEntry> {
    sqlx::query_as::<_, GiftCardCatalogEntry>(
        r#"
        INSERT INTO giftcard_catalog (
            id, brand, face_value, currency, discount_percentage, stock, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(entry.id)
    .bind(&entry.brand)
    .bind(&entry.face_value)
    .bind(&entry.currency)
    .bind(&entry.discount_percentage)
    .bind(entry.stock)
    .bind(entry.created_at)
    .bind(entry.updated_at)
    .fetch_one(pool)
    .await
}

/// Takes `quantity` units out of stock, or returns `None` when fewer are left.
pub async fn decrement_stock(
    executor: &mut SqlxTransaction<'_, Postgres>,
    catalog_id: Uuid,
    quantity: i32,
) -> Result<Option<GiftCardCatalogEntry>> {
    sqlx::query_as::<_, GiftCardCatalogEntry>(
        r#"
        UPDATE giftcard_catalog
        SET stock = stock - $2, updated_at = NOW()
        WHERE id = $1 AND stock >= $2
        RETURNING *
        "#,
    )
    .bind(catalog_id)
    .bind(quantity)
    .fetch_optional(&mut **executor)
    .await
}

pub async fn catalog_entry_exists(executor: &mut SqlxTransaction<'_, Postgres>, catalog_id: Uuid) -> Result<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM giftcard_catalog WHERE id = $1)")
        .bind(catalog_id)
        .fetch_one(&mut **executor)
        .await
}

pub async fn insert_user_gift_card(
    executor: &mut SqlxTransaction<'_, Postgres>,
    card: &UserGiftCard,
) -> Result<UserGiftCard> {
    sqlx::query_as::<_, UserGiftCard>(
        r#"
        INSERT INTO user_giftcards (
            id, user_id, catalog_id, code, face_value, currency, status, expires_at,
            purchase_transaction_id, redeemed_at, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(card.id)
    .bind(card.user_id)
    .bind(card.catalog_id)
    .bind(&card.code)
    .bind(&card.face_value)
    .bind(&card.currency)
    .bind(&card.status)
    .bind(card.expires_at)
    .bind(card.purchase_transaction_id)
    .bind(card.redeemed_at)
    .bind(card.created_at)
    .bind(card.updated_at)
    .fetch_one(&mut **executor)
    .await
}

pub async fn link_transaction_gift_card(
    executor: &mut SqlxTransaction<'_, Postgres>,
    transaction_id: Uuid,
    card_id: Uuid,
) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        "UPDATE transactions SET user_giftcard_id = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(card_id)
    .bind(transaction_id)
    .fetch_one(&mut **executor)
    .await
}

pub async fn gift_card_exists(executor: &mut SqlxTransaction<'_, Postgres>, id: Uuid) -> Result<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM user_giftcards WHERE id = $1)")
        .bind(id)
        .fetch_one(&mut **executor)
        .await
}

/// Sets the status of a card and of every card bought by the same transaction.
/// Cards that were already redeemed keep their `used` status.
pub async fn set_purchase_gift_card_status(
    executor: &mut SqlxTransaction<'_, Postgres>,
    card_id: Uuid,
    purchase_transaction_id: Uuid,
    status: &str,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE user_giftcards
        SET status = $1, updated_at = NOW()
        WHERE (id = $2 OR purchase_transaction_id = $3)
        AND status <> 'used'
        "#,
    )
    .bind(status)
    .bind(card_id)
    .bind(purchase_transaction_id)
    .execute(&mut **executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn get_gift_card_by_code(pool: &PgPool, code: &str) -> Result<UserGiftCard> {
    sqlx::query_as::<_, UserGiftCard>("SELECT * FROM user_giftcards WHERE code = $1")
        .bind(code)
        .fetch_one(pool)
        .await
}

/// Marks an active, unexpired card owned by `user_id` as used.
pub async fn redeem_gift_card(pool: &PgPool, code: &str, user_id: Uuid) -> Result<Option<UserGiftCard>> {
    sqlx::query_as::<_, UserGiftCard>(
        r#"
        UPDATE user_giftcards
        SET status = 'used', redeemed_at = NOW(), updated_at = NOW()
        WHERE code = $1 AND user_id = $2 AND status = 'active' AND expires_at > NOW()
        RETURNING *
        "#,
    )
    .bind(code)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}
