//! Field validators for inbound payment commands.

use bigdecimal::BigDecimal;
use std::fmt;

pub const IDEMPOTENCY_KEY_MAX_LEN: usize = 128;
pub const MERCHANT_ID_MAX_LEN: usize = 64;
pub const CURRENCY_LEN: usize = 3;
pub const BIN_MIN_LEN: usize = 6;
pub const BIN_MAX_LEN: usize = 8;

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

pub fn validate_currency(currency: &str) -> ValidationResult {
    let currency = sanitize_string(currency);
    validate_required("currency", &currency)?;

    if currency.len() != CURRENCY_LEN || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ValidationError::new(
            "currency",
            "must be a 3-letter uppercase ISO code",
        ));
    }

    Ok(())
}

pub fn validate_bank_bin(bin: &str) -> ValidationResult {
    let bin = sanitize_string(bin);
    validate_required("bank_bin", &bin)?;

    if bin.len() < BIN_MIN_LEN || bin.len() > BIN_MAX_LEN || !bin.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ValidationError::new(
            "bank_bin",
            format!("must be {}-{} digits", BIN_MIN_LEN, BIN_MAX_LEN),
        ));
    }

    Ok(())
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}
