//! Settlement rules for wallet transactions.
//! Pure functions; storage and orchestration live in the status service.

use bigdecimal::BigDecimal;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_APPROVED: &str = "approved";
pub const STATUS_REJECTED: &str = "rejected";
pub const STATUS_FAILED: &str = "failed";
pub const STATUS_CANCELLED: &str = "cancelled";

pub const STATUS_MAX_LEN: usize = 32;

/// Known transaction types. Rows may carry other strings; those parse to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    GiftCardPurchase,
    GiftCardSale,
    CryptoBuy,
    CryptoSell,
    BillPayment,
    MobileTopUp,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 8] = [
        TransactionKind::Deposit,
        TransactionKind::Withdrawal,
        TransactionKind::GiftCardPurchase,
        TransactionKind::GiftCardSale,
        TransactionKind::CryptoBuy,
        TransactionKind::CryptoSell,
        TransactionKind::BillPayment,
        TransactionKind::MobileTopUp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::GiftCardPurchase => "giftcard_purchase",
            TransactionKind::GiftCardSale => "giftcard_sale",
            TransactionKind::CryptoBuy => "crypto_buy",
            TransactionKind::CryptoSell => "crypto_sell",
            TransactionKind::BillPayment => "bill_payment",
            TransactionKind::MobileTopUp => "mobile_topup",
        }
    }

    /// Exact, case-sensitive match on the stored type string.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == raw)
    }

    pub fn balance_effect(&self) -> BalanceEffect {
        match self {
            TransactionKind::Deposit | TransactionKind::GiftCardSale | TransactionKind::CryptoSell => {
                BalanceEffect::Credit
            }
            TransactionKind::Withdrawal
            | TransactionKind::CryptoBuy
            | TransactionKind::BillPayment
            | TransactionKind::MobileTopUp => BalanceEffect::Debit,
            // Debited synchronously when the cards were bought.
            TransactionKind::GiftCardPurchase => BalanceEffect::AlreadyApplied,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What settling a transaction does to its wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceEffect {
    Credit,
    Debit,
    AlreadyApplied,
}

impl BalanceEffect {
    /// Signed change to apply, or `None` when the balance is left untouched.
    pub fn delta(&self, amount: &BigDecimal) -> Option<BigDecimal> {
        match self {
            BalanceEffect::Credit => Some(amount.clone()),
            BalanceEffect::Debit => Some(-amount.clone()),
            BalanceEffect::AlreadyApplied => None,
        }
    }
}

/// Settlement effect of a stored transaction type. Unknown types yield `None`.
pub fn settlement_effect(transaction_type: &str) -> Option<BalanceEffect> {
    TransactionKind::parse(transaction_type).map(|kind| kind.balance_effect())
}

pub fn is_settled(status: &str) -> bool {
    status == STATUS_COMPLETED || status == STATUS_APPROVED
}

/// True when moving from `current` to `new` must touch the wallet.
pub fn requires_settlement(current: &str, new: &str) -> bool {
    is_settled(new) && !is_settled(current)
}

/// Statuses are stored verbatim; only the column width is enforced.
pub fn status_fits(status: &str) -> bool {
    status.chars().count() <= STATUS_MAX_LEN
}
