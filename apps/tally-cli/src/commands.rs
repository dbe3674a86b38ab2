//! Subcommand handlers.
//!
//! Each handler takes an open [`Database`], the clock that defines "today"
//! and a writer for its output, so tests can run them against an in-memory
//! database and inspect what was printed.

use std::collections::HashMap;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tally_core::summary::{
    active_totals, summarize, summarize_by_salesperson, CommissionSummary, InstallmentFilter,
};
use tally_core::{Clock, Installment, InstallmentStatus, PaymentFlag, SaleWithInstallments};
use tally_db::Database;
use tracing::info;

// =============================================================================
// Reconcile
// =============================================================================

pub async fn reconcile(db: &Database, clock: &dyn Clock, out: &mut impl Write) -> Result<()> {
    let today = clock.today();
    db.reconcile(clock).await?;

    let overdue = db.installments().by_status(InstallmentStatus::Overdue).await?;
    writeln!(out, "Reconciled as of {}: {} overdue installment(s)", today, overdue.len())?;
    Ok(())
}

// =============================================================================
// Sales
// =============================================================================

pub async fn list_sales(
    db: &Database,
    clock: &dyn Clock,
    detailed: bool,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let sales = db.list_sales_reconciled(clock).await?;

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&sales)?)?;
        return Ok(());
    }

    if sales.is_empty() {
        writeln!(out, "No sales recorded")?;
        return Ok(());
    }

    for entry in &sales {
        write_sale(entry, detailed, out)?;
    }
    Ok(())
}

fn write_sale(entry: &SaleWithInstallments, detailed: bool, out: &mut impl Write) -> Result<()> {
    let sale = &entry.sale;
    let totals = active_totals(&entry.installments);

    writeln!(
        out,
        "{}  {}  {:<24} {:>12}  {}x  commission {:>10}",
        sale.sale_date,
        sale.id,
        sale.client_name,
        sale.amount().to_string(),
        sale.installment_count,
        totals.commission.to_string(),
    )?;

    if detailed {
        for installment in &entry.installments {
            write_installment(installment, out)?;
        }
    }
    Ok(())
}

fn write_installment(installment: &Installment, out: &mut impl Write) -> Result<()> {
    writeln!(
        out,
        "    {:>3}/{:<3} {}  {:>10}  {:>9}  {:<12} client:{} seller:{}  {}",
        installment.installment_number,
        installment.total_installments,
        installment.due_date,
        installment.amount().to_string(),
        installment.commission().to_string(),
        installment.status.to_string(),
        yes_no(installment.client_paid),
        yes_no(installment.seller_paid),
        installment.id,
    )?;
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

// =============================================================================
// Summary
// =============================================================================

#[derive(Debug, Serialize)]
struct SalespersonSummary {
    salesperson_id: String,
    name: String,
    #[serde(flatten)]
    summary: CommissionSummary,
}

pub async fn summary(
    db: &Database,
    clock: &dyn Clock,
    filter: &InstallmentFilter,
    by_salesperson: bool,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let sales = db.list_sales_reconciled(clock).await?;

    if !by_salesperson {
        let totals = summarize(&sales, filter);
        if json {
            writeln!(out, "{}", serde_json::to_string_pretty(&totals)?)?;
        } else {
            write_totals("Commission", &totals, out)?;
        }
        return Ok(());
    }

    let names: HashMap<String, String> = db
        .users()
        .list(true)
        .await?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();

    let groups: Vec<SalespersonSummary> = summarize_by_salesperson(&sales, filter)
        .into_iter()
        .map(|(id, summary)| SalespersonSummary {
            name: names.get(&id).cloned().unwrap_or_else(|| id.clone()),
            salesperson_id: id,
            summary,
        })
        .collect();

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&groups)?)?;
        return Ok(());
    }

    if groups.is_empty() {
        writeln!(out, "No installments match")?;
    }
    for group in &groups {
        write_totals(&group.name, &group.summary, out)?;
    }
    Ok(())
}

fn write_totals(label: &str, totals: &CommissionSummary, out: &mut impl Write) -> Result<()> {
    writeln!(
        out,
        "{:<24} total {:>12}  paid {:>12}  pending {:>12}",
        label,
        totals.total.to_string(),
        totals.paid.to_string(),
        totals.pending.to_string(),
    )?;
    Ok(())
}

// =============================================================================
// Installment Operations
// =============================================================================

pub async fn renegotiate(
    db: &Database,
    id: &str,
    new_due_date: NaiveDate,
    out: &mut impl Write,
) -> Result<()> {
    let successor = db
        .installments()
        .renegotiate(id, new_due_date)
        .await
        .with_context(|| format!("renegotiating installment {}", id))?;

    info!(original = %id, successor = %successor.id, "Renegotiated");
    writeln!(out, "Installment {} superseded by:", id)?;
    write_installment(&successor, out)
}

pub async fn mark(
    db: &Database,
    clock: &dyn Clock,
    flag: PaymentFlag,
    value: bool,
    ids: &[String],
    out: &mut impl Write,
) -> Result<()> {
    let updated = db
        .installments()
        .mark_many(ids, flag, value, clock.today())
        .await?;

    for installment in &updated {
        write_installment(installment, out)?;
    }
    writeln!(out, "{} installment(s) updated", updated.len())?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{
        CommissionRate, CommissionRule, FixedClock, Money, NewProduct, NewSale, NewUser, Role,
    };
    use tally_db::{DbConfig, DbError};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// One 10% product, one salesperson, 1200.00 in 4 installments from 2026-01-10.
    async fn setup() -> (Database, SaleWithInstallments) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let seller = db
            .users()
            .insert(&NewUser {
                name: "João Silva".to_string(),
                email: "joao@improve.com".to_string(),
                role: Role::Salesperson,
                avatar_url: None,
            })
            .await
            .unwrap();
        let product = db
            .products()
            .insert(&NewProduct {
                name: "Preparatório TOEFL".to_string(),
                description: None,
                rule: CommissionRule::on_sale(CommissionRate::from_bps(1000)),
            })
            .await
            .unwrap();
        let sale = db
            .sales()
            .create_sale(&NewSale {
                product_id: product.id,
                salesperson_id: seller.id,
                amount: Money::from_cents(120_000),
                installment_count: 4,
                installment_start_date: date(2026, 1, 10),
                sale_date: date(2026, 1, 3),
                client_name: "Ana Pereira".to_string(),
                student_name: None,
                campaign: Some("Volta às aulas".to_string()),
                payment_method: None,
            })
            .await
            .unwrap();
        (db, sale)
    }

    fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn test_reconcile_reports_overdue() {
        let (db, _) = setup().await;
        let mut buf = Vec::new();

        // Jan 10 and Feb 10 are past
        reconcile(&db, &FixedClock(date(2026, 2, 15)), &mut buf).await.unwrap();

        assert_eq!(output(buf), "Reconciled as of 2026-02-15: 2 overdue installment(s)\n");
    }

    #[tokio::test]
    async fn test_summary_by_salesperson_uses_names() {
        let (db, sale) = setup().await;
        let ids = vec![sale.installments[0].id.clone()];
        db.installments()
            .mark_many(&ids, PaymentFlag::Seller, true, date(2026, 1, 20))
            .await
            .unwrap();

        let mut buf = Vec::new();
        summary(
            &db,
            &FixedClock(date(2026, 1, 20)),
            &InstallmentFilter::default(),
            true,
            false,
            &mut buf,
        )
        .await
        .unwrap();

        let text = output(buf);
        assert!(text.starts_with("João Silva"));
        assert!(text.contains(&format!("total {:>12}", "120.00")));
        assert!(text.contains(&format!("paid {:>12}", "30.00")));
        assert!(text.contains(&format!("pending {:>12}", "90.00")));
    }

    #[tokio::test]
    async fn test_summary_json_respects_month_filter() {
        let (db, _) = setup().await;
        let filter = InstallmentFilter {
            due_month: Some("2026-03".parse().unwrap()),
            ..Default::default()
        };

        let mut buf = Vec::new();
        summary(&db, &FixedClock(date(2026, 1, 1)), &filter, false, true, &mut buf)
            .await
            .unwrap();

        let totals: CommissionSummary = serde_json::from_slice(&buf).unwrap();
        assert_eq!(totals.total, Money::from_cents(3_000));
        assert_eq!(totals.pending, Money::from_cents(3_000));
    }

    #[tokio::test]
    async fn test_renegotiate_prints_successor() {
        let (db, sale) = setup().await;
        let original = &sale.installments[1];

        let mut buf = Vec::new();
        renegotiate(&db, &original.id, date(2026, 5, 20), &mut buf)
            .await
            .unwrap();

        let text = output(buf);
        assert!(text.contains(&format!("Installment {} superseded by:", original.id)));
        assert!(text.contains("2026-05-20"));

        let err = renegotiate(&db, &original.id, date(2026, 6, 20), &mut Vec::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("renegotiating installment"));
    }

    #[tokio::test]
    async fn test_mark_reports_partial_failure() {
        let (db, sale) = setup().await;
        let ids = vec![sale.installments[0].id.clone(), "missing".to_string()];

        let err = mark(
            &db,
            &FixedClock(date(2026, 1, 20)),
            PaymentFlag::Client,
            true,
            &ids,
            &mut Vec::new(),
        )
        .await
        .unwrap_err();

        match err.downcast_ref::<DbError>() {
            Some(DbError::PartialBulkUpdate { applied, failed }) => {
                assert_eq!(applied, &vec![sale.installments[0].id.clone()]);
                assert_eq!(failed, &vec!["missing".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_sales_detailed() {
        let (db, sale) = setup().await;
        let mut buf = Vec::new();

        list_sales(&db, &FixedClock(date(2026, 1, 1)), true, false, &mut buf)
            .await
            .unwrap();

        let text = output(buf);
        assert!(text.contains(&sale.sale.id));
        assert!(text.contains("Ana Pereira"));
        assert_eq!(text.lines().count(), 1 + 4);
    }
}
