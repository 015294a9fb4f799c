use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::transaction::STATUS_COMPLETED;

pub const CARD_PENDING: &str = "pending";
pub const CARD_ACTIVE: &str = "active";
pub const CARD_USED: &str = "used";
pub const CARD_EXPIRED: &str = "expired";

/// A purchased card becomes usable only once its funding transaction completes.
pub fn card_status_for(transaction_status: &str) -> &'static str {
    if transaction_status == STATUS_COMPLETED {
        CARD_ACTIVE
    } else {
        CARD_PENDING
    }
}

/// Stored status adjusted for expiry at `now`.
pub fn effective_status<'a>(stored: &'a str, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> &'a str {
    if stored == CARD_ACTIVE && expires_at <= now {
        CARD_EXPIRED
    } else {
        stored
    }
}

/// `face_value * quantity` less the catalog discount, rounded to cents.
pub fn purchase_price(face_value: &BigDecimal, discount_percentage: &BigDecimal, quantity: i32) -> BigDecimal {
    let hundred = BigDecimal::from(100);
    let gross = face_value * BigDecimal::from(quantity);
    let net = gross * (&hundred - discount_percentage) / hundred;
    net.round(2)
}

/// Redeemable code of the form `GC-XXXX-XXXX-XXXX`.
pub fn generate_code() -> String {
    let raw = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
    format!("GC-{}-{}-{}", &raw[0..4], &raw[4..8], &raw[8..12])
}
