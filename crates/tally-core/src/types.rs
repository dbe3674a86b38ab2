//! # Domain Types
//!
//! Core domain types used throughout Tally.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │   Installment   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  product_id     │◄──│  sale_id (FK)   │       │
//! │  │  commission     │   │  salesperson_id │   │  number / total │       │
//! │  │   type/rate/    │   │  amount_cents   │   │  due_date       │       │
//! │  │   base_cost     │   │  count, start   │   │  amount/commis. │       │
//! │  └─────────────────┘   └─────────────────┘   │  client_paid    │       │
//! │                                              │  seller_paid    │       │
//! │  ┌─────────────────┐   ┌─────────────────┐   │  status         │       │
//! │  │ CommissionRate  │   │InstallmentStatus│   │  original_id    │       │
//! │  │  bps (u32)      │   │  Pending        │   └─────────────────┘       │
//! │  │  1000 = 10%     │   │  Overdue        │                              │
//! │  └─────────────────┘   │  Renegotiated   │                              │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Installments store their own amount and commission. Editing a product's
//! commission rule never changes installments that were already generated.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Commission Rate
// =============================================================================

/// Commission rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1050 bps = 10.5%
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommissionRate(u32);

impl CommissionRate {
    /// Upper bound: 100%.
    pub const MAX_BPS: u32 = 10_000;

    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        CommissionRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        CommissionRate(0)
    }
}

/// Parses a percentage such as `"10"` or `"7.5"` into basis points.
impl FromStr for CommissionRate {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // A percentage with two decimals has the same digits as an amount in
        // cents: "7.50" → 750 bps.
        let bps = s
            .parse::<Money>()
            .map_err(|_| ValidationError::InvalidFormat {
                field: "commission_rate".to_string(),
                reason: "expected a percentage like 10 or 7.5".to_string(),
            })?
            .cents();

        if !(0..=CommissionRate::MAX_BPS as i64).contains(&bps) {
            return Err(ValidationError::OutOfRange {
                field: "commission_rate".to_string(),
                min: 0,
                max: 100,
            });
        }

        Ok(CommissionRate(bps as u32))
    }
}

impl fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Commission Rule
// =============================================================================

/// How a product's commission is derived from the sale amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CommissionType {
    /// `amount × rate`
    PercentageOnSale,
    /// `(amount − base_cost) × rate`, never below zero.
    PercentageOnProfit,
}

impl Default for CommissionType {
    fn default() -> Self {
        CommissionType::PercentageOnSale
    }
}

/// A product's commission rule, as consumed by the calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommissionRule {
    pub commission_type: CommissionType,
    pub rate: CommissionRate,
    /// Required when `commission_type` is profit-based.
    pub base_cost: Option<Money>,
}

impl CommissionRule {
    /// Percentage of the sale amount.
    pub const fn on_sale(rate: CommissionRate) -> Self {
        CommissionRule {
            commission_type: CommissionType::PercentageOnSale,
            rate,
            base_cost: None,
        }
    }

    /// Percentage of the profit over `base_cost`.
    pub const fn on_profit(rate: CommissionRate, base_cost: Money) -> Self {
        CommissionRule {
            commission_type: CommissionType::PercentageOnProfit,
            rate,
            base_cost: Some(base_cost),
        }
    }
}

// =============================================================================
// User
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Salesperson,
}

impl Default for Role {
    fn default() -> Self {
        Role::Salesperson
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "salesperson" => Ok(Role::Salesperson),
            _ => Err(ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: vec![
                    "admin".to_string(),
                    "manager".to_string(),
                    "salesperson".to_string(),
                ],
            }),
        }
    }
}

/// A staff member. Salespeople own sales and receive commission.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub avatar_url: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user; the repository assigns id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub avatar_url: Option<String>,
}

// =============================================================================
// Product
// =============================================================================

/// A product that can be sold, with its commission rule.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    pub description: Option<String>,

    pub commission_type: CommissionType,

    /// Commission rate in basis points (1000 = 10%).
    pub commission_rate_bps: u32,

    /// Cost in cents, the base for profit-based commission.
    pub base_cost_cents: Option<i64>,

    /// Whether the product can be picked for new sales (soft delete).
    pub active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the commission rule used by the calculator.
    pub fn commission_rule(&self) -> CommissionRule {
        CommissionRule {
            commission_type: self.commission_type,
            rate: CommissionRate::from_bps(self.commission_rate_bps),
            base_cost: self.base_cost_cents.map(Money::from_cents),
        }
    }
}

/// Input for creating a product; the repository assigns id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub rule: CommissionRule,
}

// =============================================================================
// Sale
// =============================================================================

/// A recorded sale. The amount is split into `installment_count` installments
/// starting at `installment_start_date`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub product_id: String,
    pub salesperson_id: String,
    /// Total amount in cents.
    pub amount_cents: i64,
    pub installment_count: i64,
    #[ts(as = "String")]
    pub installment_start_date: NaiveDate,
    /// Date the sale was closed.
    #[ts(as = "String")]
    pub sale_date: NaiveDate,
    /// Paying client (the responsible party for minors).
    pub client_name: String,
    pub student_name: Option<String>,
    pub campaign: Option<String>,
    pub payment_method: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// Input for recording a new sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSale {
    pub product_id: String,
    pub salesperson_id: String,
    pub amount: Money,
    pub installment_count: i64,
    #[ts(as = "String")]
    pub installment_start_date: NaiveDate,
    #[ts(as = "String")]
    pub sale_date: NaiveDate,
    pub client_name: String,
    pub student_name: Option<String>,
    pub campaign: Option<String>,
    pub payment_method: Option<String>,
}

/// Partial update of a sale. `None` leaves the field unchanged.
///
/// Changing `amount`, `installment_count`, `product_id` or
/// `installment_start_date` regenerates the installment schedule.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleUpdate {
    pub product_id: Option<String>,
    pub salesperson_id: Option<String>,
    pub amount: Option<Money>,
    pub installment_count: Option<i64>,
    #[ts(as = "Option<String>")]
    pub installment_start_date: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub sale_date: Option<NaiveDate>,
    pub client_name: Option<String>,
    pub student_name: Option<String>,
    pub campaign: Option<String>,
    pub payment_method: Option<String>,
}

// =============================================================================
// Installment Status
// =============================================================================

/// Lifecycle status of an installment.
///
/// Payment is tracked by the independent `client_paid` / `seller_paid`
/// flags; the status only records lateness and renegotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    /// Not yet due, or paid by the client.
    Pending,
    /// Past due and not paid by the client.
    Overdue,
    /// Superseded by a successor installment (terminal).
    Renegotiated,
}

impl InstallmentStatus {
    /// Active installments count towards sale totals.
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, InstallmentStatus::Renegotiated)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            InstallmentStatus::Pending => "pending",
            InstallmentStatus::Overdue => "overdue",
            InstallmentStatus::Renegotiated => "renegotiated",
        }
    }
}

impl Default for InstallmentStatus {
    fn default() -> Self {
        InstallmentStatus::Pending
    }
}

impl fmt::Display for InstallmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Installment
// =============================================================================

/// One scheduled payment of a sale and its share of the commission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Installment {
    pub id: String,
    pub sale_id: String,
    /// 1-based position within the sale.
    pub installment_number: i64,
    pub total_installments: i64,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    pub amount_cents: i64,
    pub commission_cents: i64,
    /// The client paid this installment.
    pub client_paid: bool,
    /// The commission was disbursed to the salesperson.
    pub seller_paid: bool,
    /// When the client paid.
    #[ts(as = "Option<String>")]
    pub paid_date: Option<NaiveDate>,
    pub status: InstallmentStatus,
    /// Set on installments created by renegotiation.
    pub original_installment_id: Option<String>,
}

impl Installment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    #[inline]
    pub fn commission(&self) -> Money {
        Money::from_cents(self.commission_cents)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Partial update of an installment's payment flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentUpdate {
    pub client_paid: Option<bool>,
    pub seller_paid: Option<bool>,
}

/// Which payment flag a bulk toggle addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentFlag {
    Client,
    Seller,
}

impl PaymentFlag {
    /// Builds the update that sets this flag to `value`.
    pub const fn update(self, value: bool) -> PaymentUpdate {
        match self {
            PaymentFlag::Client => PaymentUpdate {
                client_paid: Some(value),
                seller_paid: None,
            },
            PaymentFlag::Seller => PaymentUpdate {
                client_paid: None,
                seller_paid: Some(value),
            },
        }
    }
}

// =============================================================================
// Sale Aggregate
// =============================================================================

/// A sale together with every installment row it owns, including
/// renegotiated ones kept for audit.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleWithInstallments {
    pub sale: Sale,
    pub installments: Vec<Installment>,
}

impl SaleWithInstallments {
    /// Installments that count towards totals, in position order.
    pub fn active_installments(&self) -> impl Iterator<Item = &Installment> {
        self.installments.iter().filter(|i| i.is_active())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commission_rate_parse() {
        assert_eq!("10".parse::<CommissionRate>().unwrap().bps(), 1000);
        assert_eq!("7.5".parse::<CommissionRate>().unwrap().bps(), 750);
        assert_eq!("100".parse::<CommissionRate>().unwrap().bps(), 10_000);
        assert!("100.01".parse::<CommissionRate>().is_err());
        assert!("-1".parse::<CommissionRate>().is_err());
        assert!("ten".parse::<CommissionRate>().is_err());
    }

    #[test]
    fn test_commission_rate_display() {
        assert_eq!(CommissionRate::from_bps(1050).to_string(), "10.50%");
        assert!((CommissionRate::from_bps(825).percentage() - 8.25).abs() < 0.001);
    }

    #[test]
    fn test_product_commission_rule() {
        let now = Utc::now();
        let product = Product {
            id: "p1".to_string(),
            name: "Enterprise Solution".to_string(),
            description: None,
            commission_type: CommissionType::PercentageOnProfit,
            commission_rate_bps: 1500,
            base_cost_cents: Some(500_000),
            active: true,
            created_at: now,
            updated_at: now,
        };

        let rule = product.commission_rule();
        assert_eq!(
            rule,
            CommissionRule::on_profit(CommissionRate::from_bps(1500), Money::from_cents(500_000))
        );
    }

    #[test]
    fn test_status_helpers() {
        assert_eq!(InstallmentStatus::default(), InstallmentStatus::Pending);
        assert!(InstallmentStatus::Overdue.is_active());
        assert!(!InstallmentStatus::Renegotiated.is_active());
        assert_eq!(InstallmentStatus::Renegotiated.to_string(), "renegotiated");
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&CommissionType::PercentageOnProfit).unwrap(),
            "\"percentage_on_profit\""
        );
        assert_eq!(
            serde_json::to_string(&InstallmentStatus::Overdue).unwrap(),
            "\"overdue\""
        );
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Manager".parse::<Role>().unwrap(), Role::Manager);
        assert!("cashier".parse::<Role>().is_err());
    }

    #[test]
    fn test_payment_flag_update() {
        assert_eq!(
            PaymentFlag::Seller.update(true),
            PaymentUpdate {
                client_paid: None,
                seller_paid: Some(true)
            }
        );
    }
}
