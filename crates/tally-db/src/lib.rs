//! # tally-db: Database Layer for Tally
//!
//! This crate provides database access for Tally.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Data Flow                                  │
//! │                                                                         │
//! │  tally-cli command (e.g. `tally renegotiate <id> 2026-05-20`)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │   │  (embedded)  │  │   │
//! │  │   │               │    │ UserRepo       │   │              │  │   │
//! │  │   │ SqlitePool    │◄───│ ProductRepo    │   │ 001_initial_ │  │   │
//! │  │   │ reconcile()   │    │ SaleRepo       │   │   schema.sql │  │   │
//! │  │   │               │    │ InstallmentRepo│   │              │  │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘  │   │
//! │  │                              │                                  │   │
//! │  │                              ▼                                  │   │
//! │  │                 tally-core (pure business rules)                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (TALLY_DATABASE_PATH, default ./tally.db)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_core::SystemClock;
//! use tally_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./tally.db")).await?;
//!
//! let sale = db.sales().create_sale(&new_sale).await?;
//! let sales = db.list_sales_reconciled(&SystemClock::utc()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::installment::InstallmentRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
pub use repository::user::UserRepository;
