//! # Commission Calculator
//!
//! Turns a sale amount and a product's commission rule into per-installment
//! shares of both the amount and the commission.
//!
//! ## Split Flow
//! ```text
//! amount 1474.00, N = 6, rule 10% on sale
//!      │
//!      ├── total commission = 1474.00 × 10% = 147.40
//!      │
//!      ├── amount:     floor(147400 / 6) = 24566, remainder 4
//!      │               → 245.66 × 5, last = 245.70
//!      │
//!      └── commission: floor(14740 / 6) = 2456, remainder 4
//!                      → 24.56 × 5, last = 24.60
//! ```
//!
//! Both splits are independent; the remainder always lands on the last
//! position so the shares sum back to the totals exactly.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{CommissionRule, CommissionType};
use crate::validation::{validate_commission_rule, validate_installment_count, validate_sale_amount};

/// One position's share of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InstallmentShare {
    /// 1-based position.
    pub position: i64,
    pub amount: Money,
    pub commission: Money,
}

/// Computes the total commission of a sale.
///
/// ## Rules
/// - `PercentageOnSale`: `amount × rate`
/// - `PercentageOnProfit`: `(amount − base_cost) × rate`, zero when the
///   profit is not positive
///
/// Rounded half up to the cent.
///
/// ## Example
/// ```rust
/// use tally_core::commission::total_commission;
/// use tally_core::money::Money;
/// use tally_core::types::{CommissionRate, CommissionRule};
///
/// let rule = CommissionRule::on_profit(CommissionRate::from_bps(2000), Money::from_cents(60_000));
/// let commission = total_commission(Money::from_cents(100_000), &rule).unwrap();
/// assert_eq!(commission.cents(), 8_000); // (1000 - 600) × 20%
/// ```
pub fn total_commission(amount: Money, rule: &CommissionRule) -> CoreResult<Money> {
    validate_sale_amount(amount)?;
    validate_commission_rule(rule)?;

    let commission = match rule.commission_type {
        CommissionType::PercentageOnSale => amount.apply_rate(rule.rate),
        CommissionType::PercentageOnProfit => {
            let base_cost = rule.base_cost.ok_or_else(|| ValidationError::Required {
                field: "base_cost".to_string(),
            })?;
            let profit = amount - base_cost;
            if profit.is_positive() {
                profit.apply_rate(rule.rate)
            } else {
                Money::zero()
            }
        }
    };

    Ok(commission)
}

/// Splits a sale into `count` ordered shares.
///
/// Each share gets `floor(total / count)`; the last one also takes the
/// remainder. Applied to the amount and the commission separately.
pub fn split_installments(
    amount: Money,
    rule: &CommissionRule,
    count: i64,
) -> CoreResult<Vec<InstallmentShare>> {
    validate_installment_count(count)?;
    let commission = total_commission(amount, rule)?;

    let (amount_base, amount_rest) = amount.split_floor(count);
    let (commission_base, commission_rest) = commission.split_floor(count);

    let shares = (1..=count)
        .map(|position| {
            let last = position == count;
            InstallmentShare {
                position,
                amount: if last {
                    amount_base + amount_rest
                } else {
                    amount_base
                },
                commission: if last {
                    commission_base + commission_rest
                } else {
                    commission_base
                },
            }
        })
        .collect();

    Ok(shares)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::types::CommissionRate;

    fn ten_percent() -> CommissionRule {
        CommissionRule::on_sale(CommissionRate::from_bps(1000))
    }

    #[test]
    fn test_remainder_goes_to_last_installment() {
        let shares = split_installments(Money::from_cents(147_400), &ten_percent(), 6).unwrap();

        assert_eq!(shares.len(), 6);
        for share in &shares[..5] {
            assert_eq!(share.amount.cents(), 24_566);
            assert_eq!(share.commission.cents(), 2_456);
        }
        assert_eq!(shares[5].amount.cents(), 24_570);
        assert_eq!(shares[5].commission.cents(), 2_460);

        let amount: Money = shares.iter().map(|s| s.amount).sum();
        let commission: Money = shares.iter().map(|s| s.commission).sum();
        assert_eq!(amount.cents(), 147_400);
        assert_eq!(commission.cents(), 14_740);
    }

    #[test]
    fn test_positions_are_contiguous() {
        let shares = split_installments(Money::from_cents(100_000), &ten_percent(), 12).unwrap();
        let positions: Vec<i64> = shares.iter().map(|s| s.position).collect();
        assert_eq!(positions, (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn test_single_installment_takes_everything() {
        let shares = split_installments(Money::from_cents(99_999), &ten_percent(), 1).unwrap();
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].amount.cents(), 99_999);
        assert_eq!(shares[0].commission.cents(), 10_000); // 9999.9 rounds up
    }

    #[test]
    fn test_profit_commission() {
        let rule = CommissionRule::on_profit(CommissionRate::from_bps(1500), Money::from_cents(50_000));
        let commission = total_commission(Money::from_cents(80_000), &rule).unwrap();
        assert_eq!(commission.cents(), 4_500);
    }

    #[test]
    fn test_profit_at_or_below_cost_is_zero() {
        let rule = CommissionRule::on_profit(CommissionRate::from_bps(1500), Money::from_cents(50_000));

        assert!(total_commission(Money::from_cents(50_000), &rule).unwrap().is_zero());
        assert!(total_commission(Money::from_cents(30_000), &rule).unwrap().is_zero());

        let shares = split_installments(Money::from_cents(30_000), &rule, 3).unwrap();
        assert!(shares.iter().all(|s| s.commission.is_zero()));
    }

    #[test]
    fn test_rejects_bad_input() {
        let rule = ten_percent();
        assert!(matches!(
            split_installments(Money::from_cents(1000), &rule, 0),
            Err(CoreError::Validation(ValidationError::MustBePositive { .. }))
        ));
        assert!(split_installments(Money::zero(), &rule, 3).is_err());
        assert!(split_installments(Money::from_cents(-500), &rule, 3).is_err());

        let missing_cost = CommissionRule {
            commission_type: CommissionType::PercentageOnProfit,
            rate: CommissionRate::from_bps(1000),
            base_cost: None,
        };
        assert!(matches!(
            total_commission(Money::from_cents(1000), &missing_cost),
            Err(CoreError::Validation(ValidationError::Required { .. }))
        ));
    }

    #[test]
    fn test_amount_smaller_than_count() {
        // 0.05 over 6 installments: five zeros and 0.05 on the last one
        let shares = split_installments(Money::from_cents(5), &ten_percent(), 6).unwrap();
        assert!(shares[..5].iter().all(|s| s.amount.is_zero()));
        assert_eq!(shares[5].amount.cents(), 5);
    }
}
