//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        Business rule (CoreError)           │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tally-cli (anyhow) ← Printed with context                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tally_core::CoreError;
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and domain errors raised while a
/// repository operation runs.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_one` returns no rows
    /// - Update/delete of an ID that doesn't exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate user email
    /// - A second active installment for the same sale position
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Referencing a non-existent product_id or salesperson_id
    /// - Deleting a product or user that sales still reference
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A bulk toggle stopped short. Applied updates are kept.
    ///
    /// ## User Workflow
    /// ```text
    /// Mark 5 installments as paid to seller
    ///      │
    ///      ├── 4 updated
    ///      └── 1 renegotiated (frozen)
    ///      │
    ///      ▼
    /// PartialBulkUpdate { applied: [4 ids], failed: [1 id] }
    /// ```
    #[error("Bulk update incomplete: {} applied, {} failed", applied.len(), failed.len())]
    PartialBulkUpdate {
        applied: Vec<String>,
        failed: Vec<String>,
    },

    /// Business rule violation raised inside a repository operation.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether the error reports a conflict with current state rather than
    /// bad input or an infrastructure failure.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DbError::UniqueViolation { .. }
                | DbError::Domain(
                    CoreError::AlreadyRenegotiated(_)
                        | CoreError::InstallmentFrozen(_)
                        | CoreError::SellerPaidInstallments { .. }
                )
        )
    }
}

impl From<tally_core::ValidationError> for DbError {
    fn from(err: tally_core::ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>[, <table>.<column>]"
                // "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_bulk_message() {
        let err = DbError::PartialBulkUpdate {
            applied: vec!["a".to_string(), "b".to_string()],
            failed: vec!["c".to_string()],
        };
        assert_eq!(err.to_string(), "Bulk update incomplete: 2 applied, 1 failed");
    }

    #[test]
    fn test_domain_errors_are_transparent() {
        let err: DbError = CoreError::AlreadyRenegotiated("i1".to_string()).into();
        assert_eq!(err.to_string(), "Installment i1 is already renegotiated");
        assert!(err.is_conflict());
        assert!(!DbError::not_found("Sale", "s1").is_conflict());
    }
}
