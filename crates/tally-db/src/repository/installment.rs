//! # Installment Repository
//!
//! Payment toggles, renegotiation and the persisted reconcile pass.
//!
//! ## Write Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Installment Write Paths                              │
//! │                                                                         │
//! │  update_installment(id, flags, today)                                  │
//! │     └── tx: load → apply_payment (tally-core) → UPDATE … WHERE         │
//! │         status != 'renegotiated'                                        │
//! │                                                                         │
//! │  renegotiate(id, new_due)                                              │
//! │     └── tx: load → plan_renegotiation (tally-core)                     │
//! │         → conditional UPDATE original (0 rows = lost the race)         │
//! │         → INSERT successor                                              │
//! │                                                                         │
//! │  reconcile_overdue(today)                                              │
//! │     └── Promote: pending ∧ unpaid ∧ due < today  → overdue             │
//! │     └── Demote:  overdue ∧ paid                  → pending             │
//! │         (two set-based UPDATEs, idempotent)                            │
//! │                                                                         │
//! │  mark_many(ids, flag, value)                                           │
//! │     └── one update_installment per id, no rollback                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use tally_core::lifecycle::{apply_payment, ReconcileReport, ReconcileRule};
use tally_core::renegotiation::plan_renegotiation;
use tally_core::{CoreError, Installment, InstallmentStatus, PaymentFlag, PaymentUpdate};

/// Repository for installment database operations.
#[derive(Debug, Clone)]
pub struct InstallmentRepository {
    pool: SqlitePool,
}

impl InstallmentRepository {
    /// Creates a new InstallmentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InstallmentRepository { pool }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Gets an installment by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Installment>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_id(&mut conn, id).await
    }

    /// All installments of a sale, renegotiated ones included, by position.
    pub async fn by_sale(&self, sale_id: &str) -> DbResult<Vec<Installment>> {
        let mut conn = self.pool.acquire().await?;
        fetch_for_sale(&mut conn, sale_id).await
    }

    /// Installments in a given status, earliest due first.
    pub async fn by_status(&self, status: InstallmentStatus) -> DbResult<Vec<Installment>> {
        let rows = sqlx::query_as::<_, Installment>(
            r#"
            SELECT
                id, sale_id, installment_number, total_installments, due_date,
                amount_cents, commission_cents, client_paid, seller_paid,
                paid_date, status, original_installment_id
            FROM installments
            WHERE status = ?1
            ORDER BY due_date, sale_id, installment_number
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        debug!(status = %status, count = rows.len(), "Loaded installments by status");
        Ok(rows)
    }

    /// Installments due between `from` and `to`, both inclusive.
    pub async fn by_due_date_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<Installment>> {
        let rows = sqlx::query_as::<_, Installment>(
            r#"
            SELECT
                id, sale_id, installment_number, total_installments, due_date,
                amount_cents, commission_cents, client_paid, seller_paid,
                paid_date, status, original_installment_id
            FROM installments
            WHERE due_date BETWEEN ?1 AND ?2
            ORDER BY due_date, sale_id, installment_number
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // =========================================================================
    // Bulk Create / Delete
    // =========================================================================

    /// Inserts installments in one transaction.
    pub async fn create_installments(&self, rows: &[Installment]) -> DbResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        insert_all(&mut tx, rows).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(())
    }

    /// Deletes every installment of a sale. Returns the number removed.
    pub async fn delete_installments(&self, sale_id: &str) -> DbResult<u64> {
        let mut conn = self.pool.acquire().await?;
        delete_for_sale(&mut conn, sale_id).await
    }

    // =========================================================================
    // Payment Toggles
    // =========================================================================

    /// Sets the payment flags of one installment.
    ///
    /// Paying a late installment returns it to Pending in the same write.
    /// Renegotiated installments are refused with `InstallmentFrozen`.
    pub async fn update_installment(
        &self,
        id: &str,
        update: PaymentUpdate,
        today: NaiveDate,
    ) -> DbResult<Installment> {
        debug!(id = %id, ?update, "Updating installment payment flags");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let mut row = fetch_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::InstallmentNotFound(id.to_string()))?;

        apply_payment(&mut row, update, today)?;

        let result = sqlx::query(
            r#"
            UPDATE installments SET
                client_paid = ?2,
                seller_paid = ?3,
                paid_date = ?4,
                status = ?5
            WHERE id = ?1 AND status != 'renegotiated'
            "#,
        )
        .bind(&row.id)
        .bind(row.client_paid)
        .bind(row.seller_paid)
        .bind(row.paid_date)
        .bind(row.status)
        .execute(&mut *tx)
        .await?;

        // renegotiated between the read and the write
        if result.rows_affected() == 0 {
            return Err(CoreError::InstallmentFrozen(id.to_string()).into());
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(row)
    }

    /// Sets one payment flag on many installments.
    ///
    /// Each id is updated on its own. Failures do not undo the updates that
    /// already went through; they are reported together as
    /// [`DbError::PartialBulkUpdate`].
    pub async fn mark_many(
        &self,
        ids: &[String],
        flag: PaymentFlag,
        value: bool,
        today: NaiveDate,
    ) -> DbResult<Vec<Installment>> {
        let update = flag.update(value);
        let mut updated = Vec::with_capacity(ids.len());
        let mut failed = Vec::new();

        for id in ids {
            match self.update_installment(id, update, today).await {
                Ok(row) => updated.push(row),
                Err(err) => {
                    warn!(id = %id, error = %err, "Bulk toggle failed for installment");
                    failed.push(id.clone());
                }
            }
        }

        if !failed.is_empty() {
            return Err(DbError::PartialBulkUpdate {
                applied: updated.into_iter().map(|row| row.id).collect(),
                failed,
            });
        }

        info!(count = updated.len(), ?flag, value, "Bulk toggle applied");
        Ok(updated)
    }

    // =========================================================================
    // Renegotiation
    // =========================================================================

    /// Supersedes an installment with a successor due on `new_due_date`.
    ///
    /// ## Returns
    /// * `Ok(Installment)` - The new Pending successor
    /// * `Err(InstallmentNotFound)` - No such installment
    /// * `Err(AlreadyRenegotiated)` - Superseded earlier or concurrently
    pub async fn renegotiate(&self, id: &str, new_due_date: NaiveDate) -> DbResult<Installment> {
        debug!(id = %id, new_due_date = %new_due_date, "Renegotiating installment");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let original = fetch_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::InstallmentNotFound(id.to_string()))?;

        let plan = plan_renegotiation(&original, new_due_date)?;

        let result = sqlx::query(
            r#"
            UPDATE installments SET status = ?2
            WHERE id = ?1 AND status != 'renegotiated'
            "#,
        )
        .bind(&plan.superseded.id)
        .bind(plan.superseded.status)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::AlreadyRenegotiated(id.to_string()).into());
        }

        insert_one(&mut tx, &plan.successor).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            original = %original.id,
            successor = %plan.successor.id,
            "Installment renegotiated"
        );
        Ok(plan.successor)
    }

    // =========================================================================
    // Reconcile
    // =========================================================================

    /// Applies the reconcile rules to every installment as of `today`.
    ///
    /// Safe to re-run at any time; a pass interrupted between the two
    /// statements is completed by the next one.
    pub async fn reconcile_overdue(&self, today: NaiveDate) -> DbResult<()> {
        let mut report = ReconcileReport::default();

        for rule in ReconcileRule::ALL {
            match rule {
                ReconcileRule::Promote => {
                    report.promoted = sqlx::query(
                        r#"
                        UPDATE installments SET status = 'overdue'
                        WHERE status = 'pending' AND client_paid = 0 AND due_date < ?1
                        "#,
                    )
                    .bind(today)
                    .execute(&self.pool)
                    .await?
                    .rows_affected();
                }
                ReconcileRule::Demote => {
                    report.demoted = sqlx::query(
                        r#"
                        UPDATE installments SET status = 'pending'
                        WHERE status = 'overdue' AND client_paid = 1
                        "#,
                    )
                    .execute(&self.pool)
                    .await?
                    .rows_affected();
                }
            }
        }

        info!(
            today = %today,
            promoted = report.promoted,
            demoted = report.demoted,
            "Reconciled installment statuses"
        );
        Ok(())
    }
}

// =============================================================================
// Connection-level helpers (shared with SaleRepository transactions)
// =============================================================================

pub(crate) async fn fetch_by_id(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<Installment>> {
    let row = sqlx::query_as::<_, Installment>(
        r#"
        SELECT
            id, sale_id, installment_number, total_installments, due_date,
            amount_cents, commission_cents, client_paid, seller_paid,
            paid_date, status, original_installment_id
        FROM installments
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row)
}

pub(crate) async fn fetch_for_sale(
    conn: &mut SqliteConnection,
    sale_id: &str,
) -> DbResult<Vec<Installment>> {
    let rows = sqlx::query_as::<_, Installment>(
        r#"
        SELECT
            id, sale_id, installment_number, total_installments, due_date,
            amount_cents, commission_cents, client_paid, seller_paid,
            paid_date, status, original_installment_id
        FROM installments
        WHERE sale_id = ?1
        ORDER BY installment_number, rowid
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

/// Every installment, grouped by sale in position order.
pub(crate) async fn fetch_all(pool: &SqlitePool) -> DbResult<Vec<Installment>> {
    let rows = sqlx::query_as::<_, Installment>(
        r#"
        SELECT
            id, sale_id, installment_number, total_installments, due_date,
            amount_cents, commission_cents, client_paid, seller_paid,
            paid_date, status, original_installment_id
        FROM installments
        ORDER BY sale_id, installment_number, rowid
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub(crate) async fn insert_one(conn: &mut SqliteConnection, row: &Installment) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO installments (
            id, sale_id, installment_number, total_installments, due_date,
            amount_cents, commission_cents, client_paid, seller_paid,
            paid_date, status, original_installment_id
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9,
            ?10, ?11, ?12
        )
        "#,
    )
    .bind(&row.id)
    .bind(&row.sale_id)
    .bind(row.installment_number)
    .bind(row.total_installments)
    .bind(row.due_date)
    .bind(row.amount_cents)
    .bind(row.commission_cents)
    .bind(row.client_paid)
    .bind(row.seller_paid)
    .bind(row.paid_date)
    .bind(row.status)
    .bind(&row.original_installment_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn insert_all(conn: &mut SqliteConnection, rows: &[Installment]) -> DbResult<()> {
    for row in rows {
        insert_one(conn, row).await?;
    }

    debug!(count = rows.len(), "Inserted installments");
    Ok(())
}

pub(crate) async fn delete_for_sale(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<u64> {
    let result = sqlx::query("DELETE FROM installments WHERE sale_id = ?1")
        .bind(sale_id)
        .execute(&mut *conn)
        .await?;

    debug!(sale_id = %sale_id, removed = result.rows_affected(), "Deleted installments");
    Ok(result.rows_affected())
}

// =============================================================================
// Unit Tests
// =============================================================================
