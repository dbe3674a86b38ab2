//! # Repository Module
//!
//! Database repository implementations for Tally.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Caller (tally-cli, UI backend)                                        │
//! │       │                                                                 │
//! │       │  db.sales().create_sale(&new_sale)                             │
//! │       ▼                                                                 │
//! │  SaleRepository ──► tally-core (validate, split, generate)             │
//! │       │                                                                 │
//! │       │  SQL in one transaction                                         │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Business rules live in tally-core; repositories only load, call the   │
//! │  pure functions, and persist the result.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`UserRepository`](user::UserRepository) - Staff accounts
//! - [`ProductRepository`](product::ProductRepository) - Products and commission rules
//! - [`SaleRepository`](sale::SaleRepository) - Sales and schedule regeneration
//! - [`InstallmentRepository`](installment::InstallmentRepository) - Toggles,
//!   renegotiation, reconcile

pub mod installment;
pub mod product;
pub mod sale;
pub mod user;
