//! # Sale Repository
//!
//! Database operations for sales and the installment schedules they own.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CREATE                                                             │
//! │     └── create_sale() → validate → load product rule                   │
//! │         → generate_installments() → tx { INSERT sale, INSERT rows }    │
//! │                                                                         │
//! │  2. EDIT                                                               │
//! │     └── update_sale()                                                  │
//! │         ├── descriptive fields only → UPDATE sale                      │
//! │         └── amount/count/product/start changed → regenerate:           │
//! │             refuse if any seller_paid, else                            │
//! │             tx { DELETE rows, INSERT new rows, UPDATE sale }           │
//! │                                                                         │
//! │  3. DELETE                                                             │
//! │     └── delete_sale() → installments go with it (ON DELETE CASCADE)    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::installment::{delete_for_sale, fetch_all, fetch_for_sale, insert_all};
use tally_core::schedule::{ensure_regeneration_allowed, generate_installments, needs_regeneration};
use tally_core::validation::{
    validate_installment_count, validate_name, validate_new_sale, validate_sale_amount,
    validate_uuid,
};
use tally_core::{CoreError, Installment, NewSale, Product, Sale, SaleUpdate, SaleWithInstallments};

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Lists every sale with its installments, newest sale first.
    pub async fn list_sales(&self) -> DbResult<Vec<SaleWithInstallments>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT
                id, product_id, salesperson_id, amount_cents, installment_count,
                installment_start_date, sale_date, client_name, student_name,
                campaign, payment_method, created_at, updated_at
            FROM sales
            ORDER BY sale_date DESC, created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_sale: HashMap<String, Vec<Installment>> = HashMap::new();
        for row in fetch_all(&self.pool).await? {
            by_sale.entry(row.sale_id.clone()).or_default().push(row);
        }

        let result: Vec<SaleWithInstallments> = sales
            .into_iter()
            .map(|sale| {
                let installments = by_sale.remove(&sale.id).unwrap_or_default();
                SaleWithInstallments { sale, installments }
            })
            .collect();

        debug!(count = result.len(), "Listed sales");
        Ok(result)
    }

    /// Gets a sale and its installments.
    pub async fn get_sale(&self, id: &str) -> DbResult<Option<SaleWithInstallments>> {
        let mut conn = self.pool.acquire().await?;
        fetch_sale_with_installments(&mut conn, id).await
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Records a sale and generates its installment schedule.
    ///
    /// ## Returns
    /// * `Ok(SaleWithInstallments)` - The stored sale and its N installments
    /// * `Err(Domain(Validation))` - Bad input, nothing written
    /// * `Err(Domain(ProductNotFound | ProductInactive | UserNotFound))`
    pub async fn create_sale(&self, new: &NewSale) -> DbResult<SaleWithInstallments> {
        validate_new_sale(new)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let product = fetch_product(&mut tx, &new.product_id).await?;
        if !product.active {
            return Err(CoreError::ProductInactive(product.id).into());
        }
        ensure_salesperson(&mut tx, &new.salesperson_id).await?;

        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            product_id: new.product_id.clone(),
            salesperson_id: new.salesperson_id.clone(),
            amount_cents: new.amount.cents(),
            installment_count: new.installment_count,
            installment_start_date: new.installment_start_date,
            sale_date: new.sale_date,
            client_name: new.client_name.trim().to_string(),
            student_name: new.student_name.clone(),
            campaign: new.campaign.clone(),
            payment_method: new.payment_method.clone(),
            created_at: now,
            updated_at: now,
        };

        let installments = generate_installments(
            &sale.id,
            new.amount,
            &product.commission_rule(),
            new.installment_count,
            new.installment_start_date,
        )?;

        debug!(id = %sale.id, amount = %new.amount, count = new.installment_count, "Creating sale");

        insert_sale(&mut tx, &sale).await?;
        insert_all(&mut tx, &installments).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(id = %sale.id, installments = installments.len(), "Sale created");
        Ok(SaleWithInstallments { sale, installments })
    }

    /// Applies a partial update to a sale.
    ///
    /// When the amount, count, product or start date changes, the schedule
    /// is regenerated inside the same transaction. Regeneration is refused
    /// with `SellerPaidInstallments` if any commission was already paid out;
    /// in that case nothing is written.
    pub async fn update_sale(&self, id: &str, update: &SaleUpdate) -> DbResult<SaleWithInstallments> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let current = fetch_sale(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(id.to_string()))?;

        let regenerate = needs_regeneration(&current, update);
        let sale = merge_update(&current, update)?;

        if sale.salesperson_id != current.salesperson_id {
            ensure_salesperson(&mut tx, &sale.salesperson_id).await?;
        }

        if regenerate {
            let existing = fetch_for_sale(&mut tx, id).await?;
            ensure_regeneration_allowed(id, &existing)?;

            let product = fetch_product(&mut tx, &sale.product_id).await?;
            if sale.product_id != current.product_id && !product.active {
                return Err(CoreError::ProductInactive(product.id).into());
            }
            let installments = generate_installments(
                &sale.id,
                sale.amount(),
                &product.commission_rule(),
                sale.installment_count,
                sale.installment_start_date,
            )?;

            delete_for_sale(&mut tx, id).await?;
            insert_all(&mut tx, &installments).await?;

            info!(
                id = %id,
                removed = existing.len(),
                created = installments.len(),
                "Regenerated installment schedule"
            );
        }

        let result = sqlx::query(
            r#"
            UPDATE sales SET
                product_id = ?2,
                salesperson_id = ?3,
                amount_cents = ?4,
                installment_count = ?5,
                installment_start_date = ?6,
                sale_date = ?7,
                client_name = ?8,
                student_name = ?9,
                campaign = ?10,
                payment_method = ?11,
                updated_at = ?12
            WHERE id = ?1
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.product_id)
        .bind(&sale.salesperson_id)
        .bind(sale.amount_cents)
        .bind(sale.installment_count)
        .bind(sale.installment_start_date)
        .bind(sale.sale_date)
        .bind(&sale.client_name)
        .bind(&sale.student_name)
        .bind(&sale.campaign)
        .bind(&sale.payment_method)
        .bind(sale.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::SaleNotFound(id.to_string()).into());
        }

        let installments = fetch_for_sale(&mut tx, id).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(SaleWithInstallments { sale, installments })
    }

    /// Deletes a sale and all of its installments.
    ///
    /// ## Returns
    /// * `Ok(true)` - Sale deleted
    /// * `Ok(false)` - No sale with that id
    pub async fn delete_sale(&self, id: &str) -> DbResult<bool> {
        debug!(id = %id, "Deleting sale");

        let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Applies `update` over `current` and validates the fields it touched.
fn merge_update(current: &Sale, update: &SaleUpdate) -> DbResult<Sale> {
    let mut sale = current.clone();

    if let Some(product_id) = &update.product_id {
        validate_uuid("product_id", product_id)?;
        sale.product_id = product_id.clone();
    }
    if let Some(salesperson_id) = &update.salesperson_id {
        validate_uuid("salesperson_id", salesperson_id)?;
        sale.salesperson_id = salesperson_id.clone();
    }
    if let Some(amount) = update.amount {
        validate_sale_amount(amount)?;
        sale.amount_cents = amount.cents();
    }
    if let Some(count) = update.installment_count {
        validate_installment_count(count)?;
        sale.installment_count = count;
    }
    if let Some(start) = update.installment_start_date {
        sale.installment_start_date = start;
    }
    if let Some(sale_date) = update.sale_date {
        sale.sale_date = sale_date;
    }
    if let Some(client_name) = &update.client_name {
        validate_name("client_name", client_name)?;
        sale.client_name = client_name.trim().to_string();
    }
    if let Some(student_name) = &update.student_name {
        sale.student_name = Some(student_name.clone()).filter(|s| !s.trim().is_empty());
    }
    if let Some(campaign) = &update.campaign {
        sale.campaign = Some(campaign.clone()).filter(|s| !s.trim().is_empty());
    }
    if let Some(payment_method) = &update.payment_method {
        sale.payment_method = Some(payment_method.clone()).filter(|s| !s.trim().is_empty());
    }

    sale.updated_at = Utc::now();
    Ok(sale)
}

async fn fetch_sale(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
    let sale = sqlx::query_as::<_, Sale>(
        r#"
        SELECT
            id, product_id, salesperson_id, amount_cents, installment_count,
            installment_start_date, sale_date, client_name, student_name,
            campaign, payment_method, created_at, updated_at
        FROM sales
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(sale)
}

async fn fetch_sale_with_installments(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<SaleWithInstallments>> {
    let Some(sale) = fetch_sale(conn, id).await? else {
        return Ok(None);
    };
    let installments = fetch_for_sale(conn, id).await?;
    Ok(Some(SaleWithInstallments { sale, installments }))
}

async fn fetch_product(conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        SELECT
            id, name, description, commission_type, commission_rate_bps,
            base_cost_cents, active, created_at, updated_at
        FROM products
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    product.ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
}

async fn ensure_salesperson(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    let exists: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match exists {
        Some(_) => Ok(()),
        None => Err(CoreError::UserNotFound(id.to_string()).into()),
    }
}

async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales (
            id, product_id, salesperson_id, amount_cents, installment_count,
            installment_start_date, sale_date, client_name, student_name,
            campaign, payment_method, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9,
            ?10, ?11, ?12, ?13
        )
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.product_id)
    .bind(&sale.salesperson_id)
    .bind(sale.amount_cents)
    .bind(sale.installment_count)
    .bind(sale.installment_start_date)
    .bind(sale.sale_date)
    .bind(&sale.client_name)
    .bind(&sale.student_name)
    .bind(&sale.campaign)
    .bind(&sale.payment_method)
    .bind(sale.created_at)
    .bind(sale.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{date, new_sale, product, salesperson, seeded};
    use tally_core::summary::check_sale_invariants;
    use tally_core::{CommissionRate, CommissionRule, Money, PaymentFlag};

    #[tokio::test]
    async fn test_create_sale_generates_schedule() {
        let (db, created) = seeded().await;

        assert_eq!(created.installments.len(), 6);
        assert_eq!(created.installments[5].amount_cents, 24_570);

        let loaded = db.sales().get_sale(&created.sale.id).await.unwrap().unwrap();
        assert_eq!(loaded.installments, created.installments);

        let product = db.products().get_by_id(&loaded.sale.product_id).await.unwrap().unwrap();
        check_sale_invariants(&loaded.sale, &loaded.installments, &product.commission_rule())
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_sale_rejects_bad_input() {
        let db = crate::repository::fixtures::database().await;
        let seller = salesperson(&db).await;
        let item = product(&db, CommissionRule::on_sale(CommissionRate::from_bps(1000))).await;

        let mut zero_count = new_sale(&item.id, &seller.id);
        zero_count.installment_count = 0;
        assert!(matches!(
            db.sales().create_sale(&zero_count).await,
            Err(DbError::Domain(CoreError::Validation(_)))
        ));

        let unknown_product = new_sale(&Uuid::new_v4().to_string(), &seller.id);
        assert!(matches!(
            db.sales().create_sale(&unknown_product).await,
            Err(DbError::Domain(CoreError::ProductNotFound(_)))
        ));

        db.products().deactivate(&item.id).await.unwrap();
        assert!(matches!(
            db.sales().create_sale(&new_sale(&item.id, &seller.id)).await,
            Err(DbError::Domain(CoreError::ProductInactive(_)))
        ));

        assert!(db.sales().list_sales().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_sale_rejects_inactive_product() {
        let (db, created) = seeded().await;
        let retired = product(&db, CommissionRule::on_sale(CommissionRate::from_bps(5000))).await;
        db.products().deactivate(&retired.id).await.unwrap();

        let update = SaleUpdate {
            product_id: Some(retired.id.clone()),
            ..Default::default()
        };
        assert!(matches!(
            db.sales().update_sale(&created.sale.id, &update).await,
            Err(DbError::Domain(CoreError::ProductInactive(id))) if id == retired.id
        ));

        let loaded = db.sales().get_sale(&created.sale.id).await.unwrap().unwrap();
        assert_eq!(loaded.sale.product_id, created.sale.product_id);
        assert_eq!(loaded.installments, created.installments);

        // A sale already on a product that was retired later can still be edited
        db.products().deactivate(&created.sale.product_id).await.unwrap();
        let update = SaleUpdate {
            installment_count: Some(3),
            ..Default::default()
        };
        let regenerated = db.sales().update_sale(&created.sale.id, &update).await.unwrap();
        assert_eq!(regenerated.installments.len(), 3);
    }

    #[tokio::test]
    async fn test_create_sale_rejects_amount_above_limit() {
        let db = crate::repository::fixtures::database().await;
        let seller = salesperson(&db).await;
        let item = product(&db, CommissionRule::on_sale(CommissionRate::from_bps(10_000))).await;

        let mut huge = new_sale(&item.id, &seller.id);
        huge.amount = "50000000000000000.00".parse().unwrap();
        assert!(matches!(
            db.sales().create_sale(&huge).await,
            Err(DbError::Domain(CoreError::Validation(_)))
        ));

        let mut at_limit = new_sale(&item.id, &seller.id);
        at_limit.amount = tally_core::MAX_SALE_AMOUNT;
        let created = db.sales().create_sale(&at_limit).await.unwrap();
        assert_eq!(created.sale.amount(), tally_core::MAX_SALE_AMOUNT);
    }

    #[tokio::test]
    async fn test_cosmetic_update_keeps_schedule() {
        let (db, created) = seeded().await;

        let update = SaleUpdate {
            client_name: Some("Ana Paula Souza".to_string()),
            campaign: Some("Back to school".to_string()),
            ..Default::default()
        };
        let updated = db.sales().update_sale(&created.sale.id, &update).await.unwrap();

        assert_eq!(updated.sale.client_name, "Ana Paula Souza");
        assert_eq!(updated.sale.campaign.as_deref(), Some("Back to school"));
        assert_eq!(updated.installments, created.installments);
    }

    #[tokio::test]
    async fn test_amount_change_regenerates() {
        let (db, created) = seeded().await;

        let update = SaleUpdate {
            amount: Some(Money::from_cents(120_000)),
            installment_count: Some(4),
            ..Default::default()
        };
        let updated = db.sales().update_sale(&created.sale.id, &update).await.unwrap();

        assert_eq!(updated.installments.len(), 4);
        assert!(updated
            .installments
            .iter()
            .all(|i| created.installments.iter().all(|old| old.id != i.id)));
        assert_eq!(
            updated.installments.iter().map(|i| i.amount_cents).sum::<i64>(),
            120_000
        );

        let product = db.products().get_by_id(&updated.sale.product_id).await.unwrap().unwrap();
        check_sale_invariants(&updated.sale, &updated.installments, &product.commission_rule())
            .unwrap();
    }

    #[tokio::test]
    async fn test_regeneration_refused_when_seller_paid() {
        let (db, created) = seeded().await;
        let paid = &created.installments[0];
        db.installments()
            .update_installment(&paid.id, PaymentFlag::Seller.update(true), date(2026, 1, 10))
            .await
            .unwrap();

        let update = SaleUpdate {
            amount: Some(Money::from_cents(200_000)),
            ..Default::default()
        };
        let result = db.sales().update_sale(&created.sale.id, &update).await;
        assert!(matches!(
            result,
            Err(DbError::Domain(CoreError::SellerPaidInstallments { count: 1, .. }))
        ));

        // nothing deleted, nothing changed
        let loaded = db.sales().get_sale(&created.sale.id).await.unwrap().unwrap();
        assert_eq!(loaded.sale.amount_cents, 147_400);
        assert_eq!(loaded.installments.len(), 6);
        assert!(loaded.installments[0].seller_paid);
    }

    #[tokio::test]
    async fn test_update_missing_sale() {
        let (db, _) = seeded().await;
        let result = db.sales().update_sale("missing", &SaleUpdate::default()).await;
        assert!(matches!(result, Err(DbError::Domain(CoreError::SaleNotFound(_)))));
    }

    #[tokio::test]
    async fn test_delete_sale_cascades() {
        let (db, created) = seeded().await;

        assert!(db.sales().delete_sale(&created.sale.id).await.unwrap());
        assert!(!db.sales().delete_sale(&created.sale.id).await.unwrap());
        assert!(db.installments().by_sale(&created.sale.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_sales_groups_installments() {
        let (db, first) = seeded().await;
        let seller = db.users().get_by_id(&first.sale.salesperson_id).await.unwrap().unwrap();

        let mut later = new_sale(&first.sale.product_id, &seller.id);
        later.sale_date = date(2026, 2, 1);
        later.installment_count = 2;
        let second = db.sales().create_sale(&later).await.unwrap();

        let sales = db.sales().list_sales().await.unwrap();
        assert_eq!(sales.len(), 2);
        assert_eq!(sales[0].sale.id, second.sale.id);
        assert_eq!(sales[0].installments.len(), 2);
        assert_eq!(sales[1].installments.len(), 6);
    }
}
