//! # tally-core: Pure Business Logic for Tally
//!
//! This crate is the **heart** of Tally. It contains the commission math and
//! the installment lifecycle as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Presentation layer (web UI / tally-cli)            │   │
//! │  │    Sales list ──► Sale form ──► Commissions ──► Renegotiate     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌────────────┐  │   │
//! │  │   │ commission │ │  schedule  │ │ lifecycle  │ │ renegotia- │  │   │
//! │  │   │ calculator │ │ generator  │ │ reconciler │ │    tion    │  │   │
//! │  │   └────────────┘ └────────────┘ └────────────┘ └────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-db (Database Layer)                    │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (User, Product, Sale, Installment, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`commission`] - Commission calculator and installment split
//! - [`schedule`] - Installment generator and regeneration guard
//! - [`lifecycle`] - Installment status state machine and reconcile rules
//! - [`renegotiation`] - Supersede an installment with a new due date
//! - [`summary`] - Commission totals over active installments
//! - [`clock`] - Injected notion of "today"
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::commission::split_installments;
//! use tally_core::money::Money;
//! use tally_core::types::{CommissionRate, CommissionRule};
//!
//! let rule = CommissionRule::on_sale(CommissionRate::from_bps(1000)); // 10%
//! let shares = split_installments(Money::from_cents(147_400), &rule, 6).unwrap();
//!
//! assert_eq!(shares[0].amount.cents(), 24_566);
//! assert_eq!(shares[5].amount.cents(), 24_570);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod commission;
pub mod error;
pub mod lifecycle;
pub mod money;
pub mod renegotiation;
pub mod schedule;
pub mod summary;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of installments a single sale may be split into.
///
/// ## Business Reason
/// Ten years of monthly installments. Anything larger is a typo
/// (e.g. 1200 instead of 12).
pub const MAX_INSTALLMENT_COUNT: i64 = 120;

/// Largest amount a single sale may carry: 1,000,000,000.00.
///
/// Keeps totals across every sale in the ledger far inside `i64` cents.
pub const MAX_SALE_AMOUNT: Money = Money::from_cents(100_000_000_000);
