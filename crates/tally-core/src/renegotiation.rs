//! # Renegotiation
//!
//! Moving an installment to a new due date never edits it in place. The
//! original is marked `Renegotiated` and kept for audit; a successor with
//! the same position and value carries the new date.
//!
//! ```text
//! before                              after
//! ┌──────────────────────────┐        ┌──────────────────────────┐
//! │ #3/6  due 2026-03-05     │        │ #3/6  due 2026-03-05     │
//! │ 245.66  overdue          │   ──►  │ 245.66  renegotiated     │◄─┐
//! └──────────────────────────┘        └──────────────────────────┘  │
//!                                     ┌──────────────────────────┐  │
//!                                     │ #3/6  due 2026-04-20     │  │
//!                                     │ 245.66  pending          │──┘
//!                                     └──────────────────────────┘
//!                                       original_installment_id
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::lifecycle::LifecycleInput;
use crate::types::{Installment, InstallmentStatus};

/// The two rows a renegotiation writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renegotiation {
    /// The original, now `Renegotiated`. Payment flags untouched.
    pub superseded: Installment,
    /// The new `Pending` installment.
    pub successor: Installment,
}

/// Plans the renegotiation of `original` to `new_due_date`.
///
/// Fails with [`CoreError::AlreadyRenegotiated`] when the original was
/// already superseded.
pub fn plan_renegotiation(original: &Installment, new_due_date: NaiveDate) -> CoreResult<Renegotiation> {
    if original.status == InstallmentStatus::Renegotiated {
        return Err(CoreError::AlreadyRenegotiated(original.id.clone()));
    }

    let mut superseded = original.clone();
    superseded.status = original.status.transition(LifecycleInput::Renegotiate)?;

    let successor = Installment {
        id: Uuid::new_v4().to_string(),
        sale_id: original.sale_id.clone(),
        installment_number: original.installment_number,
        total_installments: original.total_installments,
        due_date: new_due_date,
        amount_cents: original.amount_cents,
        commission_cents: original.commission_cents,
        client_paid: false,
        seller_paid: false,
        paid_date: None,
        status: InstallmentStatus::Pending,
        original_installment_id: Some(original.id.clone()),
    };

    Ok(Renegotiation {
        superseded,
        successor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn overdue() -> Installment {
        Installment {
            id: "inst-3".to_string(),
            sale_id: "sale-1".to_string(),
            installment_number: 3,
            total_installments: 6,
            due_date: date(2026, 3, 5),
            amount_cents: 24_566,
            commission_cents: 2_456,
            client_paid: false,
            seller_paid: true,
            paid_date: None,
            status: InstallmentStatus::Overdue,
            original_installment_id: None,
        }
    }

    #[test]
    fn test_successor_preserves_value() {
        let original = overdue();
        let plan = plan_renegotiation(&original, date(2026, 4, 20)).unwrap();

        assert_eq!(plan.superseded.status, InstallmentStatus::Renegotiated);
        assert!(plan.superseded.seller_paid);
        assert_eq!(plan.superseded.due_date, original.due_date);

        let next = &plan.successor;
        assert_ne!(next.id, original.id);
        assert_eq!(next.sale_id, original.sale_id);
        assert_eq!(next.installment_number, 3);
        assert_eq!(next.total_installments, 6);
        assert_eq!(next.amount_cents, original.amount_cents);
        assert_eq!(next.commission_cents, original.commission_cents);
        assert_eq!(next.due_date, date(2026, 4, 20));
        assert_eq!(next.status, InstallmentStatus::Pending);
        assert!(!next.client_paid && !next.seller_paid);
        assert_eq!(next.paid_date, None);
        assert_eq!(next.original_installment_id.as_deref(), Some("inst-3"));
    }

    #[test]
    fn test_renegotiating_twice_fails() {
        let plan = plan_renegotiation(&overdue(), date(2026, 4, 20)).unwrap();
        let again = plan_renegotiation(&plan.superseded, date(2026, 5, 20));
        assert!(matches!(again, Err(CoreError::AlreadyRenegotiated(id)) if id == "inst-3"));
    }

    #[test]
    fn test_successor_can_be_renegotiated() {
        let first = plan_renegotiation(&overdue(), date(2026, 4, 20)).unwrap();
        let second = plan_renegotiation(&first.successor, date(2026, 5, 20)).unwrap();
        assert_eq!(
            second.successor.original_installment_id.as_deref(),
            Some(first.successor.id.as_str())
        );
    }
}
