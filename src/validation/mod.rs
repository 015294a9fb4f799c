use sqlx::types::BigDecimal;
use std::fmt;

use crate::domain::TransactionKind;

pub const CURRENCY_CODE_LEN: usize = 3;
pub const PAYMENT_METHOD_MAX_LEN: usize = 32;
pub const NARRATION_CODE_MAX_LEN: usize = 64;
pub const REFERENCE_MAX_LEN: usize = 128;
pub const BANK_FIELD_MAX_LEN: usize = 128;
pub const ACCOUNT_NUMBER_MIN_LEN: usize = 6;
pub const ACCOUNT_NUMBER_MAX_LEN: usize = 34;
pub const BRAND_MAX_LEN: usize = 128;
pub const MAX_GIFT_CARD_QUANTITY: i32 = 50;
/// Decimal places stored by every `NUMERIC(_, 2)` column.
pub const AMOUNT_SCALE: i64 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// Required, sanitized free text of bounded length.
pub fn validate_text(field: &'static str, value: &str, max_len: usize) -> Result<String, ValidationError> {
    let value = sanitize_string(value);
    validate_required(field, &value)?;
    validate_max_len(field, &value, max_len)?;
    Ok(value)
}

pub fn validate_enum(field: &'static str, value: &str, allowed: &[&str]) -> ValidationResult {
    if allowed.iter().all(|candidate| value != *candidate) {
        return Err(ValidationError::new(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }

    Ok(())
}

/// ISO-4217 style code: three uppercase ASCII letters.
pub fn validate_currency(currency: &str) -> Result<String, ValidationError> {
    let currency = sanitize_string(currency);
    validate_required("currency", &currency)?;

    if currency.len() != CURRENCY_CODE_LEN || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ValidationError::new(
            "currency",
            format!("must be {} uppercase letters", CURRENCY_CODE_LEN),
        ));
    }

    Ok(currency)
}

pub fn validate_transaction_type(raw: &str) -> Result<TransactionKind, ValidationError> {
    TransactionKind::parse(raw).ok_or_else(|| {
        let allowed: Vec<&str> = TransactionKind::ALL.iter().map(|kind| kind.as_str()).collect();
        ValidationError::new(
            "transaction_type",
            format!("must be one of: {}", allowed.join(", ")),
        )
    })
}

fn fits_scale(value: &BigDecimal) -> bool {
    value.with_scale(AMOUNT_SCALE) == *value
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }
    if !fits_scale(amount) {
        return Err(ValidationError::new(
            "amount",
            format!("must have at most {} decimal places", AMOUNT_SCALE),
        ));
    }

    Ok(())
}

pub fn validate_discount_percentage(discount: &BigDecimal) -> ValidationResult {
    if discount < &BigDecimal::from(0) || discount >= &BigDecimal::from(100) {
        return Err(ValidationError::new(
            "discount_percentage",
            "must be at least 0 and below 100",
        ));
    }
    if !fits_scale(discount) {
        return Err(ValidationError::new(
            "discount_percentage",
            format!("must have at most {} decimal places", AMOUNT_SCALE),
        ));
    }

    Ok(())
}

pub fn validate_quantity(quantity: i32) -> ValidationResult {
    if !(1..=MAX_GIFT_CARD_QUANTITY).contains(&quantity) {
        return Err(ValidationError::new(
            "quantity",
            format!("must be between 1 and {}", MAX_GIFT_CARD_QUANTITY),
        ));
    }

    Ok(())
}

pub fn validate_account_number(account_number: &str) -> Result<String, ValidationError> {
    let account_number = sanitize_string(account_number);
    validate_required("account_number", &account_number)?;

    let len = account_number.len();
    if !(ACCOUNT_NUMBER_MIN_LEN..=ACCOUNT_NUMBER_MAX_LEN).contains(&len) {
        return Err(ValidationError::new(
            "account_number",
            format!(
                "must be between {} and {} characters",
                ACCOUNT_NUMBER_MIN_LEN, ACCOUNT_NUMBER_MAX_LEN
            ),
        ));
    }

    if !account_number.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(ValidationError::new(
            "account_number",
            "must contain only letters and digits",
        ));
    }

    Ok(account_number)
}
