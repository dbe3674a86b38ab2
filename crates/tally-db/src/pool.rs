//! # Ledger Database Handle
//!
//! Opens the ledger file, applies the schema and hands out repositories.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig::new("./tally.db")   or   DbConfig::in_memory()              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new ── WAL + foreign keys ── 001_initial_schema.sql          │
//! │       │                                                                 │
//! │       ├── users() / products()          plain CRUD                      │
//! │       ├── sales()                       schedules live and die here     │
//! │       ├── installments()                toggles, renegotiation          │
//! │       └── list_sales_reconciled(clock)  reconcile, then read            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Statuses are only brought up to date on demand, so anything that shows
//! installments to a person goes through [`Database::list_sales_reconciled`].

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::installment::InstallmentRepository;
use crate::repository::product::ProductRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::user::UserRepository;
use tally_core::{Clock, SaleWithInstallments};

const IN_MEMORY: &str = ":memory:";

/// How long a writer waits on another writer's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Configuration
// =============================================================================

/// Where the ledger lives and how many connections may touch it.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,

    /// Default: 5. In-memory ledgers always use one.
    pub max_connections: u32,

    /// Apply pending schema migrations on open. Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Ledger stored in `path`, created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Throwaway ledger for tests. Every call yields a fresh, isolated one.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY),
            max_connections: 1,
            run_migrations: true,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to an open ledger. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the ledger described by `config`.
    ///
    /// File ledgers run in WAL mode so listings are not blocked by a
    /// reconcile pass. Foreign keys are always on: deleting a sale must take
    /// its installments with it.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening ledger");

        let connect_options = if config.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&config.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        };
        let connect_options = connect_options
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let mut pool_options = SqlitePoolOptions::new().acquire_timeout(BUSY_TIMEOUT);
        pool_options = if config.is_in_memory() {
            // the database disappears with its only connection
            pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(config.max_connections)
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!(max_connections = config.max_connections, "Ledger pool ready");

        let db = Database { pool };
        if config.run_migrations {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Raw pool, for queries no repository covers.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    pub fn installments(&self) -> InstallmentRepository {
        InstallmentRepository::new(self.pool.clone())
    }

    /// Runs the reconcile pass as of the clock's today.
    pub async fn reconcile(&self, clock: &dyn Clock) -> DbResult<()> {
        self.installments().reconcile_overdue(clock.today()).await
    }

    /// Reconciles, then lists every sale with its installments.
    ///
    /// Nothing runs in the background, so overdue status is brought up to
    /// date whenever someone is about to look at it.
    pub async fn list_sales_reconciled(
        &self,
        clock: &dyn Clock,
    ) -> DbResult<Vec<SaleWithInstallments>> {
        self.reconcile(clock).await?;
        self.sales().list_sales().await
    }

    pub async fn close(&self) {
        debug!("Closing ledger");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{date, seeded};
    use tally_core::{FixedClock, InstallmentStatus};

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
    }

    #[tokio::test]
    async fn test_in_memory_databases_are_isolated() {
        let (first, _) = seeded().await;
        let second = Database::new(DbConfig::in_memory()).await.unwrap();

        assert_eq!(first.sales().list_sales().await.unwrap().len(), 1);
        assert!(second.sales().list_sales().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_skip_migrations() {
        let db = Database::new(DbConfig::in_memory().run_migrations(false))
            .await
            .unwrap();

        assert!(db.sales().list_sales().await.is_err());
        db.run_migrations().await.unwrap();
        assert!(db.sales().list_sales().await.unwrap().is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/ledger.db").max_connections(10);

        assert_eq!(config.max_connections, 10);
        assert!(config.run_migrations);
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }

    #[tokio::test]
    async fn test_list_sales_reconciled() {
        let (db, _) = seeded().await;
        let clock = FixedClock(date(2026, 2, 20));

        let sales = db.list_sales_reconciled(&clock).await.unwrap();
        let overdue = sales[0]
            .installments
            .iter()
            .filter(|i| i.status == InstallmentStatus::Overdue)
            .count();
        assert_eq!(overdue, 2);
    }
}
