//! # Validation Module
//!
//! Input validation utilities for Tally.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Presentation layer                                           │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (Rust)                                           │
//! │  └── Business rule validation, before any write                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE constraints (email, active installment position)           │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{CommissionRate, CommissionRule, CommissionType, NewSale, NewUser};
use crate::{MAX_INSTALLMENT_COUNT, MAX_SALE_AMOUNT};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (product, user, client).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates an email address (shape only: `local@domain.tld`).
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_email;
///
/// assert!(validate_email("bob@improve.com").is_ok());
/// assert!(validate_email("bob").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@example.com".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a sale amount.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_SALE_AMOUNT
pub fn validate_sale_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    if amount > MAX_SALE_AMOUNT {
        return Err(ValidationError::OutOfRange {
            field: "amount_cents".to_string(),
            min: 1,
            max: MAX_SALE_AMOUNT.cents(),
        });
    }

    Ok(())
}

/// Validates an installment count.
///
/// ## Rules
/// - Must be positive (>= 1)
/// - Must not exceed MAX_INSTALLMENT_COUNT (120)
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_installment_count;
///
/// assert!(validate_installment_count(12).is_ok());
/// assert!(validate_installment_count(0).is_err());
/// ```
pub fn validate_installment_count(count: i64) -> ValidationResult<()> {
    if count <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "installment_count".to_string(),
        });
    }

    if count > MAX_INSTALLMENT_COUNT {
        return Err(ValidationError::OutOfRange {
            field: "installment_count".to_string(),
            min: 1,
            max: MAX_INSTALLMENT_COUNT,
        });
    }

    Ok(())
}

/// Validates a commission rate.
///
/// ## Rules
/// - Between 0 and 10000 bps (0% to 100%)
pub fn validate_commission_rate(rate: CommissionRate) -> ValidationResult<()> {
    if rate.bps() > CommissionRate::MAX_BPS {
        return Err(ValidationError::OutOfRange {
            field: "commission_rate".to_string(),
            min: 0,
            max: CommissionRate::MAX_BPS as i64,
        });
    }

    Ok(())
}

/// Validates a commission rule.
///
/// ## Rules
/// - Rate within 0%..100%
/// - Profit-based rules must carry a base cost
/// - Base cost, when present, must not be negative
pub fn validate_commission_rule(rule: &CommissionRule) -> ValidationResult<()> {
    validate_commission_rate(rule.rate)?;

    if rule.commission_type == CommissionType::PercentageOnProfit && rule.base_cost.is_none() {
        return Err(ValidationError::Required {
            field: "base_cost".to_string(),
        });
    }

    if let Some(base_cost) = rule.base_cost {
        if base_cost.is_negative() {
            return Err(ValidationError::OutOfRange {
                field: "base_cost".to_string(),
                min: 0,
                max: i64::MAX,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Date Validators
// =============================================================================

/// Parses an ISO date (`YYYY-MM-DD`).
///
/// ## Example
/// ```rust
/// use tally_core::validation::parse_date;
///
/// assert!(parse_date("due_date", "2026-02-28").is_ok());
/// assert!(parse_date("due_date", "2026-02-30").is_err());
/// ```
pub fn parse_date(field: &str, value: &str) -> ValidationResult<NaiveDate> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a date like 2026-01-31".to_string(),
    })
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Aggregate Validators
// =============================================================================

/// Validates every field of a new sale before anything is written.
pub fn validate_new_sale(sale: &NewSale) -> ValidationResult<()> {
    validate_sale_amount(sale.amount)?;
    validate_installment_count(sale.installment_count)?;
    validate_uuid("product_id", &sale.product_id)?;
    validate_uuid("salesperson_id", &sale.salesperson_id)?;
    validate_name("client_name", &sale.client_name)?;
    Ok(())
}

pub fn validate_new_user(user: &NewUser) -> ValidationResult<()> {
    validate_name("name", &user.name)?;
    validate_email(&user.email)?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
