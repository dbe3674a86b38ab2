//! # Product Repository
//!
//! Database operations for products and their commission rules.
//!
//! ## Snapshot Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Product "English Course" 10% on sale                                  │
//! │       │                                                                 │
//! │       ├── Sale A (Jan) ── installments store 10% commission            │
//! │       │                                                                 │
//! │  update(): rate → 12%                                                  │
//! │       │                                                                 │
//! │       ├── Sale A keeps 10% (amounts are stored, not recomputed)        │
//! │       └── Sale B (Feb) ── installments store 12% commission            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A sale's schedule only picks up the new rule when the sale itself is
//! edited in a way that regenerates it.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::validation::{validate_commission_rule, validate_name};
use tally_core::{NewProduct, Product};

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.insert(&NewProduct { .. }).await?;
/// let active = repo.list(false).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists products sorted by name.
    ///
    /// ## Arguments
    /// * `include_inactive` - Also return deactivated products
    pub async fn list(&self, include_inactive: bool) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id,
                name,
                description,
                commission_type,
                commission_rate_bps,
                base_cost_cents,
                active,
                created_at,
                updated_at
            FROM products
            WHERE active = 1 OR ?1
            ORDER BY name
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Listed products");
        Ok(products)
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id,
                name,
                description,
                commission_type,
                commission_rate_bps,
                base_cost_cents,
                active,
                created_at,
                updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product with generated id and timestamps
    /// * `Err(DbError::Domain)` - Invalid name or commission rule
    pub async fn insert(&self, new: &NewProduct) -> DbResult<Product> {
        validate_name("name", &new.name)?;
        validate_commission_rule(&new.rule)?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            description: new.description.clone(),
            commission_type: new.rule.commission_type,
            commission_rate_bps: new.rule.rate.bps(),
            base_cost_cents: new.rule.base_cost.map(|c| c.cents()),
            active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description,
                commission_type, commission_rate_bps, base_cost_cents,
                active, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3,
                ?4, ?5, ?6,
                ?7, ?8, ?9
            )
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.commission_type)
        .bind(product.commission_rate_bps)
        .bind(product.base_cost_cents)
        .bind(product.active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Updates an existing product.
    ///
    /// Already generated installments keep their amounts.
    ///
    /// ## Returns
    /// * `Ok(())` - Update successful
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        validate_name("name", &product.name)?;
        validate_commission_rule(&product.commission_rule())?;

        debug!(id = %product.id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                description = ?3,
                commission_type = ?4,
                commission_rate_bps = ?5,
                base_cost_cents = ?6,
                active = ?7,
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(product.name.trim())
        .bind(&product.description)
        .bind(product.commission_type)
        .bind(product.commission_rate_bps)
        .bind(product.base_cost_cents)
        .bind(product.active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Soft-deletes a product by setting active = false.
    ///
    /// ## Why Soft Delete?
    /// - Existing sales still reference this product
    /// - Can be reactivated if deactivated by mistake
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating product");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET active = 0, updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Hard-deletes a product with no sales.
    ///
    /// Fails with `ForeignKeyViolation` when sales reference it.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }
}
