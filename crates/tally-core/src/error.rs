//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Not found, business-rule conflicts             │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (IDs, counts)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// Validation failures are raised before any write; conflicts are raised
/// instead of performing the write.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Sale cannot be found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Installment cannot be found.
    #[error("Installment not found: {0}")]
    InstallmentNotFound(String),

    /// User (salesperson) cannot be found.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Inactive products cannot be picked for new sales.
    #[error("Product {0} is inactive")]
    ProductInactive(String),

    /// Installment was already superseded by a renegotiation.
    ///
    /// ## When This Occurs
    /// - Renegotiating the same installment twice
    /// - Two staff members renegotiating concurrently (the second one loses)
    #[error("Installment {0} is already renegotiated")]
    AlreadyRenegotiated(String),

    /// Renegotiated installments are kept for audit only and cannot be edited.
    #[error("Installment {0} is renegotiated and can no longer be modified")]
    InstallmentFrozen(String),

    /// Regeneration would delete installments whose commission was already
    /// disbursed to the salesperson.
    ///
    /// ## User Workflow
    /// ```text
    /// Edit sale amount 1000.00 → 1200.00
    ///      │
    ///      ▼
    /// Installment #2 has seller_paid = true
    ///      │
    ///      ▼
    /// SellerPaidInstallments { sale_id, count: 1 }
    ///      │
    ///      ▼
    /// UI shows: "Commission already paid on 1 installment(s)"
    /// ```
    #[error("Sale {sale_id} has {count} installment(s) with commission already paid")]
    SellerPaidInstallments { sale_id: String, count: usize },

    /// A lifecycle transition was requested from a status that does not allow it.
    #[error("Cannot apply {input} to installment in status {from}")]
    InvalidTransition { from: String, input: String },

    /// Installment amounts no longer add up to the sale totals.
    #[error("Sale {sale_id}: {field} is {actual} but should be {expected}")]
    InvariantViolated {
        sale_id: String,
        field: String,
        expected: String,
        actual: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date, invalid amount).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::SellerPaidInstallments {
            sale_id: "s1".to_string(),
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "Sale s1 has 2 installment(s) with commission already paid"
        );

        let err = CoreError::AlreadyRenegotiated("i1".to_string());
        assert_eq!(err.to_string(), "Installment i1 is already renegotiated");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "base_cost".to_string(),
        };
        assert_eq!(err.to_string(), "base_cost is required");

        let err = ValidationError::OutOfRange {
            field: "installment_count".to_string(),
            min: 1,
            max: 120,
        };
        assert_eq!(err.to_string(), "installment_count must be between 1 and 120");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "amount".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
