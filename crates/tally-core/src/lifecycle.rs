//! # Installment Lifecycle
//!
//! The status state machine, the reconcile rules built on it, and the
//! payment toggles that interact with it.
//!
//! ## State Machine
//! ```text
//!                  MarkOverdue
//!        ┌─────────┐ ──────────► ┌─────────┐
//!        │ Pending │             │ Overdue │
//!        └─────────┘ ◄────────── └─────────┘
//!             │      ClearOverdue     │
//!             │                       │
//!             └───── Renegotiate ─────┘
//!                        │
//!                        ▼
//!                 ┌──────────────┐
//!                 │ Renegotiated │   terminal, accepts no input
//!                 └──────────────┘
//! ```
//!
//! ## Reconcile Rules
//! Applied in order on every pass, idempotent:
//!
//! | Rule    | Predicate                                       | Result  |
//! |---------|-------------------------------------------------|---------|
//! | Promote | Pending, client unpaid, due date before today   | Overdue |
//! | Demote  | Overdue, client paid                            | Pending |
//!
//! Renegotiated rows match neither predicate and are never touched.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::types::{Installment, InstallmentStatus, PaymentUpdate};

// =============================================================================
// State Machine
// =============================================================================

/// Inputs accepted by the status state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleInput {
    /// Due date passed without client payment.
    MarkOverdue,
    /// Client paid a late installment.
    ClearOverdue,
    /// Superseded by a successor with a new due date.
    Renegotiate,
}

impl fmt::Display for LifecycleInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleInput::MarkOverdue => "mark_overdue",
            LifecycleInput::ClearOverdue => "clear_overdue",
            LifecycleInput::Renegotiate => "renegotiate",
        };
        f.write_str(name)
    }
}

impl InstallmentStatus {
    /// Returns the status reached by applying `input`, or an error when the
    /// transition is not allowed.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::lifecycle::LifecycleInput;
    /// use tally_core::types::InstallmentStatus;
    ///
    /// let next = InstallmentStatus::Pending.transition(LifecycleInput::MarkOverdue).unwrap();
    /// assert_eq!(next, InstallmentStatus::Overdue);
    ///
    /// assert!(InstallmentStatus::Renegotiated
    ///     .transition(LifecycleInput::ClearOverdue)
    ///     .is_err());
    /// ```
    pub fn transition(self, input: LifecycleInput) -> CoreResult<InstallmentStatus> {
        use InstallmentStatus::*;
        use LifecycleInput::*;

        match (self, input) {
            (Pending, MarkOverdue) => Ok(Overdue),
            (Overdue, ClearOverdue) => Ok(Pending),
            (Pending | Overdue, Renegotiate) => Ok(Renegotiated),
            (from, input) => Err(CoreError::InvalidTransition {
                from: from.to_string(),
                input: input.to_string(),
            }),
        }
    }
}

// =============================================================================
// Reconcile Rules
// =============================================================================

/// One reconcile rule. The persisted pass in the db layer runs the same
/// predicates as set-based updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileRule {
    Promote,
    Demote,
}

impl ReconcileRule {
    /// Rules in application order.
    pub const ALL: [ReconcileRule; 2] = [ReconcileRule::Promote, ReconcileRule::Demote];

    pub const fn input(self) -> LifecycleInput {
        match self {
            ReconcileRule::Promote => LifecycleInput::MarkOverdue,
            ReconcileRule::Demote => LifecycleInput::ClearOverdue,
        }
    }

    /// Whether this rule matches the installment on `today`.
    pub fn applies(self, installment: &Installment, today: NaiveDate) -> bool {
        match self {
            ReconcileRule::Promote => {
                installment.status == InstallmentStatus::Pending
                    && !installment.client_paid
                    && installment.due_date < today
            }
            ReconcileRule::Demote => {
                installment.status == InstallmentStatus::Overdue && installment.client_paid
            }
        }
    }

    /// Applies the rule if it matches. Returns whether the installment changed.
    pub fn apply(self, installment: &mut Installment, today: NaiveDate) -> CoreResult<bool> {
        if !self.applies(installment, today) {
            return Ok(false);
        }

        installment.status = installment.status.transition(self.input())?;
        Ok(true)
    }
}

/// Counts of a reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub promoted: u64,
    pub demoted: u64,
}

impl ReconcileReport {
    pub fn changed(&self) -> u64 {
        self.promoted + self.demoted
    }
}

/// Runs every reconcile rule over in-memory installments.
pub fn reconcile_in_memory(
    installments: &mut [Installment],
    today: NaiveDate,
) -> CoreResult<ReconcileReport> {
    let mut report = ReconcileReport::default();

    for rule in ReconcileRule::ALL {
        for installment in installments.iter_mut() {
            if rule.apply(installment, today)? {
                match rule {
                    ReconcileRule::Promote => report.promoted += 1,
                    ReconcileRule::Demote => report.demoted += 1,
                }
            }
        }
    }

    Ok(report)
}

// =============================================================================
// Payment Toggles
// =============================================================================

/// Applies a payment flag update.
///
/// ## Rules
/// - Renegotiated installments are frozen
/// - `client_paid = true` stamps `paid_date` (if unset) and clears Overdue
/// - `client_paid = false` clears `paid_date`
/// - `seller_paid` is independent of status
pub fn apply_payment(
    installment: &mut Installment,
    update: PaymentUpdate,
    today: NaiveDate,
) -> CoreResult<()> {
    if installment.status == InstallmentStatus::Renegotiated {
        return Err(CoreError::InstallmentFrozen(installment.id.clone()));
    }

    match update.client_paid {
        Some(true) => {
            installment.client_paid = true;
            installment.paid_date.get_or_insert(today);
            if installment.status == InstallmentStatus::Overdue {
                installment.status = installment
                    .status
                    .transition(LifecycleInput::ClearOverdue)?;
            }
        }
        Some(false) => {
            installment.client_paid = false;
            installment.paid_date = None;
        }
        None => {}
    }

    if let Some(seller_paid) = update.seller_paid {
        installment.seller_paid = seller_paid;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn installment(id: &str, due: NaiveDate, status: InstallmentStatus) -> Installment {
        Installment {
            id: id.to_string(),
            sale_id: "sale-1".to_string(),
            installment_number: 1,
            total_installments: 1,
            due_date: due,
            amount_cents: 10_000,
            commission_cents: 1_000,
            client_paid: false,
            seller_paid: false,
            paid_date: None,
            status,
            original_installment_id: None,
        }
    }

    #[test]
    fn test_transitions() {
        use InstallmentStatus::*;
        use LifecycleInput::*;

        assert_eq!(Pending.transition(MarkOverdue).unwrap(), Overdue);
        assert_eq!(Overdue.transition(ClearOverdue).unwrap(), Pending);
        assert_eq!(Pending.transition(Renegotiate).unwrap(), Renegotiated);
        assert_eq!(Overdue.transition(Renegotiate).unwrap(), Renegotiated);

        assert!(Pending.transition(ClearOverdue).is_err());
        assert!(Overdue.transition(MarkOverdue).is_err());
        for input in [MarkOverdue, ClearOverdue, Renegotiate] {
            assert!(matches!(
                Renegotiated.transition(input),
                Err(CoreError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn test_promote_only_after_due_date() {
        let today = date(2026, 3, 10);

        let mut due_today = installment("a", today, InstallmentStatus::Pending);
        assert!(!ReconcileRule::Promote.apply(&mut due_today, today).unwrap());

        let mut due_yesterday = installment("b", date(2026, 3, 9), InstallmentStatus::Pending);
        assert!(ReconcileRule::Promote.apply(&mut due_yesterday, today).unwrap());
        assert_eq!(due_yesterday.status, InstallmentStatus::Overdue);

        let mut paid = installment("c", date(2026, 3, 9), InstallmentStatus::Pending);
        paid.client_paid = true;
        assert!(!ReconcileRule::Promote.apply(&mut paid, today).unwrap());
    }

    #[test]
    fn test_promote_then_demote() {
        let today = date(2026, 3, 10);
        let mut rows = vec![installment("a", date(2026, 3, 9), InstallmentStatus::Pending)];

        let report = reconcile_in_memory(&mut rows, today).unwrap();
        assert_eq!(report.promoted, 1);
        assert_eq!(rows[0].status, InstallmentStatus::Overdue);

        // client pays outside the toggle path (e.g. a direct edit)
        rows[0].client_paid = true;
        let report = reconcile_in_memory(&mut rows, today).unwrap();
        assert_eq!(report.demoted, 1);
        assert_eq!(rows[0].status, InstallmentStatus::Pending);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let today = date(2026, 3, 10);
        let mut rows = vec![
            installment("a", date(2026, 1, 10), InstallmentStatus::Pending),
            installment("b", date(2026, 2, 10), InstallmentStatus::Pending),
            installment("c", date(2026, 4, 10), InstallmentStatus::Pending),
        ];

        let first = reconcile_in_memory(&mut rows, today).unwrap();
        assert_eq!(first.promoted, 2);

        let snapshot = rows.clone();
        let second = reconcile_in_memory(&mut rows, today).unwrap();
        assert_eq!(second.changed(), 0);
        assert_eq!(rows, snapshot);
    }

    #[test]
    fn test_reconcile_skips_renegotiated() {
        let today = date(2026, 3, 10);
        let mut old = installment("a", date(2026, 1, 10), InstallmentStatus::Renegotiated);
        old.client_paid = true;
        let mut rows = vec![old.clone()];

        let report = reconcile_in_memory(&mut rows, today).unwrap();
        assert_eq!(report.changed(), 0);
        assert_eq!(rows[0], old);
    }

    #[test]
    fn test_client_payment_clears_overdue() {
        let today = date(2026, 3, 10);
        let mut row = installment("a", date(2026, 2, 10), InstallmentStatus::Overdue);

        apply_payment(&mut row, PaymentUpdate { client_paid: Some(true), seller_paid: None }, today)
            .unwrap();
        assert!(row.client_paid);
        assert_eq!(row.paid_date, Some(today));
        assert_eq!(row.status, InstallmentStatus::Pending);

        apply_payment(&mut row, PaymentUpdate { client_paid: Some(false), seller_paid: None }, today)
            .unwrap();
        assert!(!row.client_paid);
        assert_eq!(row.paid_date, None);
    }

    #[test]
    fn test_payment_keeps_existing_paid_date() {
        let mut row = installment("a", date(2026, 2, 10), InstallmentStatus::Pending);
        row.client_paid = true;
        row.paid_date = Some(date(2026, 2, 8));

        let update = PaymentUpdate { client_paid: Some(true), seller_paid: Some(true) };
        apply_payment(&mut row, update, date(2026, 3, 10)).unwrap();
        assert_eq!(row.paid_date, Some(date(2026, 2, 8)));
        assert!(row.seller_paid);
    }

    #[test]
    fn test_renegotiated_is_frozen() {
        let mut row = installment("a", date(2026, 2, 10), InstallmentStatus::Renegotiated);
        let err = apply_payment(
            &mut row,
            PaymentUpdate { client_paid: None, seller_paid: Some(true) },
            date(2026, 3, 10),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InstallmentFrozen(id) if id == "a"));
        assert!(!row.seller_paid);
    }
}
