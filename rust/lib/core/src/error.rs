use thiserror::Error;

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable, machine-readable identifiers. Callers match on these —
// never on the human-readable message string.

/// Stable error code constants.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const INVALID_AMOUNT: &str = "INVALID_AMOUNT";
    pub const INSUFFICIENT_STOCK: &str = "INSUFFICIENT_STOCK";
    pub const BATCH_EXHAUSTED: &str = "BATCH_EXHAUSTED";
    pub const ALREADY_CONFIRMED: &str = "ALREADY_CONFIRMED";
    pub const NOT_CONFIRMED: &str = "NOT_CONFIRMED";
    pub const MEAL_ALREADY_CONFIRMED: &str = "MEAL_ALREADY_CONFIRMED";
    pub const INTERNAL: &str = "INTERNAL";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
}

// ── ServiceError ────────────────────────────────────────────────────

/// Unified error type used across all larder crates.
///
/// Every variant except `Storage` and `Internal` is a local validation failure
/// raised before anything is written, so none of them is worth retrying.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate key / resource already exists.
    #[error("{0}")]
    Conflict(String),

    /// Input data is invalid.
    #[error("{0}")]
    Validation(String),

    /// Non-positive portions, a percentage outside the allowed set, or a
    /// malformed stock quantity.
    #[error("{0}")]
    InvalidAmount(String),

    /// Direct pantry subtraction would drive `actual` below zero.
    #[error("{0}")]
    InsufficientStock(String),

    /// A batch-mode request exceeds the batch's remaining percentage.
    #[error("{0}")]
    BatchExhausted(String),

    /// `confirm` on a slot that is already confirmed.
    #[error("{0}")]
    AlreadyConfirmed(String),

    /// `unconfirm` on a slot that is not confirmed.
    #[error("{0}")]
    NotConfirmed(String),

    /// Attempt to change the plan of a confirmed slot.
    #[error("{0}")]
    MealAlreadyConfirmed(String),

    /// Storage backend failure.
    #[error("{0}")]
    Storage(String),

    /// Unexpected internal error.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => error_code::NOT_FOUND,
            ServiceError::Conflict(_) => error_code::ALREADY_EXISTS,
            ServiceError::Validation(_) => error_code::VALIDATION_FAILED,
            ServiceError::InvalidAmount(_) => error_code::INVALID_AMOUNT,
            ServiceError::InsufficientStock(_) => error_code::INSUFFICIENT_STOCK,
            ServiceError::BatchExhausted(_) => error_code::BATCH_EXHAUSTED,
            ServiceError::AlreadyConfirmed(_) => error_code::ALREADY_CONFIRMED,
            ServiceError::NotConfirmed(_) => error_code::NOT_CONFIRMED,
            ServiceError::MealAlreadyConfirmed(_) => error_code::MEAL_ALREADY_CONFIRMED,
            ServiceError::Storage(_) => error_code::STORAGE_ERROR,
            ServiceError::Internal(_) => error_code::INTERNAL,
        }
    }

    /// Whether the failure came from the storage layer rather than the caller.
    pub fn is_storage(&self) -> bool {
        matches!(self, ServiceError::Storage(_) | ServiceError::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_mapping() {
        assert_eq!(ServiceError::NotFound("x".into()).error_code(), "NOT_FOUND");
        assert_eq!(ServiceError::Conflict("x".into()).error_code(), "ALREADY_EXISTS");
        assert_eq!(ServiceError::Validation("x".into()).error_code(), "VALIDATION_FAILED");
        assert_eq!(ServiceError::InvalidAmount("x".into()).error_code(), "INVALID_AMOUNT");
        assert_eq!(ServiceError::InsufficientStock("x".into()).error_code(), "INSUFFICIENT_STOCK");
        assert_eq!(ServiceError::BatchExhausted("x".into()).error_code(), "BATCH_EXHAUSTED");
        assert_eq!(ServiceError::AlreadyConfirmed("x".into()).error_code(), "ALREADY_CONFIRMED");
        assert_eq!(ServiceError::NotConfirmed("x".into()).error_code(), "NOT_CONFIRMED");
        assert_eq!(
            ServiceError::MealAlreadyConfirmed("x".into()).error_code(),
            "MEAL_ALREADY_CONFIRMED"
        );
        assert_eq!(ServiceError::Storage("x".into()).error_code(), "STORAGE_ERROR");
        assert_eq!(ServiceError::Internal("x".into()).error_code(), "INTERNAL");
    }

    #[test]
    fn error_display_is_just_message() {
        assert_eq!(ServiceError::NotFound("dish 123".into()).to_string(), "dish 123");
        assert_eq!(
            ServiceError::BatchExhausted("batch b1 has 20% left".into()).to_string(),
            "batch b1 has 20% left"
        );
    }

    #[test]
    fn only_backend_failures_are_storage() {
        assert!(ServiceError::Storage("disk".into()).is_storage());
        assert!(!ServiceError::InsufficientStock("rice".into()).is_storage());
    }
}
