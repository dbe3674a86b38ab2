//! # Commission Summaries
//!
//! Totals shown on the commissions screen, always computed over active
//! installments only. Renegotiated rows are history, their successors carry
//! the value.
//!
//! ## Summary Shape
//! ```text
//! total   = Σ commission of active installments
//! paid    = Σ commission where seller_paid
//! pending = total − paid
//! ```

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::commission::total_commission;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{CommissionRule, Installment, InstallmentStatus, Sale, SaleWithInstallments};

// =============================================================================
// Filters
// =============================================================================

/// A calendar month, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DueMonth {
    pub year: i32,
    pub month: u32,
}

impl DueMonth {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl FromStr for DueMonth {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidFormat {
            field: "month".to_string(),
            reason: "expected YYYY-MM".to_string(),
        };

        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;

        if !(1..=12).contains(&month) {
            return Err(ValidationError::OutOfRange {
                field: "month".to_string(),
                min: 1,
                max: 12,
            });
        }

        Ok(DueMonth { year, month })
    }
}

impl fmt::Display for DueMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Narrows the installments a summary or listing covers.
/// Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InstallmentFilter {
    pub due_month: Option<DueMonth>,
    pub salesperson_id: Option<String>,
    pub product_id: Option<String>,
    pub campaign: Option<String>,
    pub status: Option<InstallmentStatus>,
}

impl InstallmentFilter {
    pub fn matches(&self, sale: &Sale, installment: &Installment) -> bool {
        self.due_month.map_or(true, |m| m.contains(installment.due_date))
            && self
                .salesperson_id
                .as_ref()
                .map_or(true, |id| *id == sale.salesperson_id)
            && self
                .product_id
                .as_ref()
                .map_or(true, |id| *id == sale.product_id)
            && self
                .campaign
                .as_ref()
                .map_or(true, |c| sale.campaign.as_ref() == Some(c))
            && self.status.map_or(true, |s| s == installment.status)
    }

    /// Installments of `sales` that pass the filter, paired with their sale.
    pub fn apply<'a>(
        &'a self,
        sales: &'a [SaleWithInstallments],
    ) -> impl Iterator<Item = (&'a Sale, &'a Installment)> + 'a {
        sales.iter().flat_map(move |s| {
            s.installments
                .iter()
                .filter(move |i| self.matches(&s.sale, i))
                .map(move |i| (&s.sale, i))
        })
    }
}

// =============================================================================
// Totals
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommissionSummary {
    pub total: Money,
    pub paid: Money,
    pub pending: Money,
}

impl CommissionSummary {
    /// Adds one installment. Renegotiated rows are ignored.
    pub fn add(&mut self, installment: &Installment) {
        if !installment.is_active() {
            return;
        }

        let commission = installment.commission();
        self.total = self.total.saturating_add(commission);
        if installment.seller_paid {
            self.paid = self.paid.saturating_add(commission);
        } else {
            self.pending = self.pending.saturating_add(commission);
        }
    }

    pub fn from_installments<'a>(installments: impl IntoIterator<Item = &'a Installment>) -> Self {
        let mut summary = CommissionSummary::default();
        for installment in installments {
            summary.add(installment);
        }
        summary
    }
}

/// Summarizes the filtered installments of `sales`.
pub fn summarize(sales: &[SaleWithInstallments], filter: &InstallmentFilter) -> CommissionSummary {
    CommissionSummary::from_installments(filter.apply(sales).map(|(_, i)| i))
}

/// Like [`summarize`], grouped by salesperson id.
pub fn summarize_by_salesperson(
    sales: &[SaleWithInstallments],
    filter: &InstallmentFilter,
) -> BTreeMap<String, CommissionSummary> {
    let mut groups: BTreeMap<String, CommissionSummary> = BTreeMap::new();
    for (sale, installment) in filter.apply(sales) {
        groups
            .entry(sale.salesperson_id.clone())
            .or_default()
            .add(installment);
    }
    groups
}

/// Sum of amount and commission over active installments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ActiveTotals {
    pub amount: Money,
    pub commission: Money,
    pub count: usize,
}

pub fn active_totals<'a>(installments: impl IntoIterator<Item = &'a Installment>) -> ActiveTotals {
    installments
        .into_iter()
        .filter(|i| i.is_active())
        .fold(ActiveTotals::default(), |mut totals, i| {
            totals.amount = totals.amount.saturating_add(i.amount());
            totals.commission = totals.commission.saturating_add(i.commission());
            totals.count += 1;
            totals
        })
}

/// Verifies the sale-level invariants:
///
/// - active amounts add up to the sale amount
/// - active commissions add up to the total commission under `rule`
/// - exactly one active installment per position `1..=N`
pub fn check_sale_invariants(
    sale: &Sale,
    installments: &[Installment],
    rule: &CommissionRule,
) -> CoreResult<()> {
    let violated = |field: &str, expected: String, actual: String| CoreError::InvariantViolated {
        sale_id: sale.id.clone(),
        field: field.to_string(),
        expected,
        actual,
    };

    let totals = active_totals(installments);

    if totals.amount != sale.amount() {
        return Err(violated(
            "amount",
            sale.amount().to_string(),
            totals.amount.to_string(),
        ));
    }

    let expected_commission = total_commission(sale.amount(), rule)?;
    if totals.commission != expected_commission {
        return Err(violated(
            "commission",
            expected_commission.to_string(),
            totals.commission.to_string(),
        ));
    }

    let mut positions: Vec<i64> = installments
        .iter()
        .filter(|i| i.is_active())
        .map(|i| i.installment_number)
        .collect();
    positions.sort_unstable();
    let expected_positions: Vec<i64> = (1..=sale.installment_count).collect();

    if positions != expected_positions {
        return Err(violated(
            "positions",
            format!("{expected_positions:?}"),
            format!("{positions:?}"),
        ));
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
