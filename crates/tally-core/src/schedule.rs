//! # Installment Generator
//!
//! Builds the installment rows of a sale and decides when an edit has to
//! rebuild them.
//!
//! ## Due Dates
//! Installment `i` (1-based) is due `i − 1` calendar months after the start
//! date. Days that do not exist in the target month clamp to its last day:
//!
//! ```text
//! start 2026-01-31
//!   #1 2026-01-31
//!   #2 2026-02-28   (clamped)
//!   #3 2026-03-31
//!   #4 2026-04-30   (clamped)
//! ```
//!
//! ## Regeneration
//! Editing the amount, count, product or start date of a sale throws the old
//! schedule away and generates a new one. That is refused once any
//! commission has been disbursed (`seller_paid`), since the paid rows would
//! be lost.

use chrono::{Months, NaiveDate};
use uuid::Uuid;

use crate::commission::split_installments;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{CommissionRule, Installment, InstallmentStatus, Sale, SaleUpdate};

/// Due date of the installment at `position` (1-based).
pub fn due_date_for(start_date: NaiveDate, position: i64) -> CoreResult<NaiveDate> {
    let months = u32::try_from(position - 1).map_err(|_| ValidationError::MustBePositive {
        field: "installment_number".to_string(),
    })?;

    start_date
        .checked_add_months(Months::new(months))
        .ok_or_else(|| {
            ValidationError::InvalidFormat {
                field: "installment_start_date".to_string(),
                reason: "schedule runs past the supported date range".to_string(),
            }
            .into()
        })
}

/// Generates a fresh installment schedule for a sale.
///
/// Every row starts `Pending` with both payment flags cleared and a new
/// UUID.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use tally_core::money::Money;
/// use tally_core::schedule::generate_installments;
/// use tally_core::types::{CommissionRate, CommissionRule};
///
/// let rule = CommissionRule::on_sale(CommissionRate::from_bps(1000));
/// let start = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
/// let rows = generate_installments("sale-1", Money::from_cents(30_000), &rule, 3, start).unwrap();
///
/// assert_eq!(rows.len(), 3);
/// assert_eq!(rows[2].due_date, NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
/// ```
pub fn generate_installments(
    sale_id: &str,
    amount: Money,
    rule: &CommissionRule,
    count: i64,
    start_date: NaiveDate,
) -> CoreResult<Vec<Installment>> {
    split_installments(amount, rule, count)?
        .into_iter()
        .map(|share| {
            Ok(Installment {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.to_string(),
                installment_number: share.position,
                total_installments: count,
                due_date: due_date_for(start_date, share.position)?,
                amount_cents: share.amount.cents(),
                commission_cents: share.commission.cents(),
                client_paid: false,
                seller_paid: false,
                paid_date: None,
                status: InstallmentStatus::Pending,
                original_installment_id: None,
            })
        })
        .collect()
}

/// Refuses regeneration when any existing installment has its commission
/// disbursed.
pub fn ensure_regeneration_allowed(sale_id: &str, existing: &[Installment]) -> CoreResult<()> {
    let count = existing.iter().filter(|i| i.seller_paid).count();

    if count > 0 {
        return Err(CoreError::SellerPaidInstallments {
            sale_id: sale_id.to_string(),
            count,
        });
    }

    Ok(())
}

/// Whether applying `update` to `current` changes anything the schedule is
/// derived from.
pub fn needs_regeneration(current: &Sale, update: &SaleUpdate) -> bool {
    let changed = |new: Option<bool>| new.unwrap_or(false);

    changed(update.amount.map(|a| a != current.amount()))
        || changed(update.installment_count.map(|c| c != current.installment_count))
        || changed(update.product_id.as_ref().map(|p| *p != current.product_id))
        || changed(
            update
                .installment_start_date
                .map(|d| d != current.installment_start_date),
        )
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CommissionRate;
    use chrono::Utc;
    use std::collections::HashSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sale() -> Sale {
        let now = Utc::now();
        Sale {
            id: "sale-1".to_string(),
            product_id: "product-1".to_string(),
            salesperson_id: "user-1".to_string(),
            amount_cents: 147_400,
            installment_count: 6,
            installment_start_date: date(2026, 1, 5),
            sale_date: date(2026, 1, 2),
            client_name: "Ana Souza".to_string(),
            student_name: None,
            campaign: None,
            payment_method: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_generate_schedule() {
        let rule = CommissionRule::on_sale(CommissionRate::from_bps(1000));
        let rows =
            generate_installments("sale-1", Money::from_cents(147_400), &rule, 6, date(2026, 1, 5))
                .unwrap();

        assert_eq!(rows.len(), 6);
        assert!(rows.iter().all(|r| r.status == InstallmentStatus::Pending));
        assert!(rows.iter().all(|r| !r.client_paid && !r.seller_paid));
        assert!(rows.iter().all(|r| r.total_installments == 6));
        assert!(rows.iter().all(|r| r.original_installment_id.is_none()));
        assert_eq!(rows[0].due_date, date(2026, 1, 5));
        assert_eq!(rows[5].due_date, date(2026, 6, 5));
        assert_eq!(rows[5].amount_cents, 24_570);
        assert_eq!(rows.iter().map(|r| r.amount_cents).sum::<i64>(), 147_400);

        let ids: HashSet<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn test_month_end_clamping() {
        let start = date(2026, 1, 31);
        assert_eq!(due_date_for(start, 2).unwrap(), date(2026, 2, 28));
        assert_eq!(due_date_for(start, 3).unwrap(), date(2026, 3, 31));
        assert_eq!(due_date_for(start, 4).unwrap(), date(2026, 4, 30));

        // leap year
        assert_eq!(due_date_for(date(2028, 1, 31), 2).unwrap(), date(2028, 2, 29));
    }

    #[test]
    fn test_year_rollover() {
        assert_eq!(due_date_for(date(2026, 11, 15), 3).unwrap(), date(2027, 1, 15));
    }

    #[test]
    fn test_regeneration_guard() {
        let rule = CommissionRule::on_sale(CommissionRate::from_bps(1000));
        let mut rows =
            generate_installments("sale-1", Money::from_cents(90_000), &rule, 3, date(2026, 1, 5))
                .unwrap();

        assert!(ensure_regeneration_allowed("sale-1", &rows).is_ok());

        rows[1].seller_paid = true;
        match ensure_regeneration_allowed("sale-1", &rows) {
            Err(CoreError::SellerPaidInstallments { count, .. }) => assert_eq!(count, 1),
            other => panic!("expected SellerPaidInstallments, got {other:?}"),
        }
    }

    #[test]
    fn test_needs_regeneration() {
        let current = sale();

        assert!(!needs_regeneration(&current, &SaleUpdate::default()));

        let cosmetic = SaleUpdate {
            client_name: Some("Ana S. Souza".to_string()),
            campaign: Some("Back to school".to_string()),
            ..Default::default()
        };
        assert!(!needs_regeneration(&current, &cosmetic));

        let same_amount = SaleUpdate {
            amount: Some(Money::from_cents(147_400)),
            ..Default::default()
        };
        assert!(!needs_regeneration(&current, &same_amount));

        let new_amount = SaleUpdate {
            amount: Some(Money::from_cents(150_000)),
            ..Default::default()
        };
        assert!(needs_regeneration(&current, &new_amount));

        let new_count = SaleUpdate {
            installment_count: Some(12),
            ..Default::default()
        };
        assert!(needs_regeneration(&current, &new_count));

        let new_start = SaleUpdate {
            installment_start_date: Some(date(2026, 2, 5)),
            ..Default::default()
        };
        assert!(needs_regeneration(&current, &new_start));

        let new_product = SaleUpdate {
            product_id: Some("product-2".to_string()),
            ..Default::default()
        };
        assert!(needs_regeneration(&current, &new_product));
    }
}
