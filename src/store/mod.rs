//! Storage subsystem.
//!
//! # Data Flow
//! ```text
//! Profile (driver, dsn)
//!     → driver.rs (DbDriver over a connection pool)
//!     → Store (owns the driver)
//!     → migration.rs (catalog applied by Store::migrate)
//!     → server handlers (through Store only)
//! ```
//!
//! # Design Decisions
//! - Every database access goes through the Store
//! - Migrations are transactional per catalog entry
//! - Cancellation is honoured between statements, never inside one

pub mod driver;
pub mod migration;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::Row;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::{Mode, Profile};

pub use driver::{new_db_driver, DbDriver, DriverError, DriverKind};
pub use migration::Migration;

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("migration {version} failed: {source}")]
    Migration {
        version: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("migration {version} cancelled")]
    Cancelled { version: &'static str },

    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),
}

/// Facade over the database driver.
#[derive(Debug)]
pub struct Store {
    driver: DbDriver,
    profile: Arc<Profile>,
}

impl Store {
    pub fn new(driver: DbDriver, profile: Arc<Profile>) -> Self {
        Self { driver, profile }
    }

    pub fn driver(&self) -> &DbDriver {
        &self.driver
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Apply every pending migration.
    ///
    /// Safe to call on an up-to-date database. A failing or cancelled
    /// migration is rolled back as a whole, leaving the previous version.
    pub async fn migrate(&self, scope: &CancellationToken) -> Result<(), StoreError> {
        let kind = self.driver.kind();
        self.driver.execute(migration::history_table(kind)).await?;

        let applied = self.applied_versions().await?;
        let fresh = applied.is_empty();
        let mut count = 0;

        for migration in migration::MIGRATIONS {
            if applied.contains(migration.version) {
                continue;
            }
            self.apply(scope, migration).await?;
            count += 1;
        }

        if fresh && self.profile.mode == Mode::Demo {
            self.seed(scope).await?;
        }

        tracing::info!(
            driver = %kind,
            applied = count,
            version = migration::latest_version().unwrap_or("none"),
            "Database migrated"
        );
        Ok(())
    }

    async fn apply(
        &self,
        scope: &CancellationToken,
        migration: &'static Migration,
    ) -> Result<(), StoreError> {
        let kind = self.driver.kind();
        let version = migration.version;
        if scope.is_cancelled() {
            return Err(StoreError::Cancelled { version });
        }

        tracing::debug!(version, "Applying migration");
        let mut tx = self.driver.begin().await?;

        for statement in migration.statements(kind) {
            if scope.is_cancelled() {
                tx.rollback().await?;
                return Err(StoreError::Cancelled { version });
            }
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|source| StoreError::Migration { version, source })?;
        }

        sqlx::query(&migration::record_version_sql(kind))
            .bind(version)
            .bind(unix_now())
            .execute(&mut *tx)
            .await
            .map_err(|source| StoreError::Migration { version, source })?;

        tx.commit()
            .await
            .map_err(|source| StoreError::Migration { version, source })?;
        Ok(())
    }

    async fn seed(&self, scope: &CancellationToken) -> Result<(), StoreError> {
        let mut tx = self.driver.begin().await?;
        for statement in migration::demo_seed(self.driver.kind()) {
            if scope.is_cancelled() {
                tx.rollback().await?;
                return Err(StoreError::Cancelled { version: "demo-seed" });
            }
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        tracing::info!("Demo data seeded");
        Ok(())
    }

    async fn applied_versions(&self) -> Result<HashSet<String>, StoreError> {
        let rows = self
            .driver
            .query("SELECT version FROM migration_history")
            .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("version").map_err(StoreError::from))
            .collect()
    }

    /// Latest catalog version recorded in the database.
    pub async fn schema_version(&self) -> Result<Option<&'static str>, StoreError> {
        let applied = self.applied_versions().await?;
        Ok(migration::MIGRATIONS
            .iter()
            .rev()
            .find(|m| applied.contains(m.version))
            .map(|m| m.version))
    }

    /// Round trip to the database.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.driver.query("SELECT 1").await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.driver.close().await;
        tracing::debug!("Store closed");
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
