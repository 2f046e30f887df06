//! Database driver construction.
//!
//! # Responsibilities
//! - Map the profile's driver name to a supported backend
//! - Turn the DSN into a connection URL the backend understands
//! - Open a connection pool and surface connection failures early
//!
//! # Design Decisions
//! - One handle type for every backend (`sqlx::AnyPool`), selected at runtime
//! - The pool connects eagerly so authentication and path errors are startup errors
//! - SQLite connections enable foreign keys and WAL on connect

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use sqlx::any::{AnyConnectOptions, AnyPoolOptions, AnyRow};
use sqlx::{Any, AnyPool, Executor, Transaction};
use thiserror::Error;

use crate::config::Profile;

/// Error type for driver construction and raw driver operations.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("unsupported database driver {0:?}")]
    Unsupported(String),

    #[error("no dsn configured for {0} driver")]
    MissingDsn(DriverKind),

    #[error("invalid {driver} dsn: {source}")]
    InvalidDsn {
        driver: DriverKind,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to connect to {driver} database: {source}")]
    Connect {
        driver: DriverKind,
        #[source]
        source: sqlx::Error,
    },

    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),
}

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverKind {
    Sqlite,
    Mysql,
    Postgres,
}

impl DriverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverKind::Sqlite => "sqlite",
            DriverKind::Mysql => "mysql",
            DriverKind::Postgres => "postgres",
        }
    }

    /// Bind parameter marker for the `n`th (1-based) argument.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            DriverKind::Postgres => format!("${n}"),
            DriverKind::Sqlite | DriverKind::Mysql => "?".to_string(),
        }
    }

    fn max_connections(&self) -> u32 {
        match self {
            DriverKind::Sqlite => 1,
            DriverKind::Mysql | DriverKind::Postgres => 10,
        }
    }
}

impl FromStr for DriverKind {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite" => Ok(DriverKind::Sqlite),
            "mysql" => Ok(DriverKind::Mysql),
            "postgres" => Ok(DriverKind::Postgres),
            other => Err(DriverError::Unsupported(other.to_string())),
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a relational database.
#[derive(Debug, Clone)]
pub struct DbDriver {
    kind: DriverKind,
    pool: AnyPool,
}

impl DbDriver {
    pub fn kind(&self) -> DriverKind {
        self.kind
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Any>, DriverError> {
        Ok(self.pool.begin().await?)
    }

    /// Execute one statement, returning the number of affected rows.
    pub async fn execute(&self, sql: &str) -> Result<u64, DriverError> {
        let result = self.pool.execute(sql).await?;
        Ok(result.rows_affected())
    }

    pub async fn query(&self, sql: &str) -> Result<Vec<AnyRow>, DriverError> {
        Ok(sqlx::query(sql).fetch_all(&self.pool).await?)
    }

    /// Close every pooled connection. Further operations fail.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

/// Open a driver for the profile's `driver` and `dsn`.
pub async fn new_db_driver(profile: &Profile) -> Result<DbDriver, DriverError> {
    sqlx::any::install_default_drivers();

    let kind: DriverKind = profile.driver.parse()?;
    if profile.dsn.is_empty() {
        return Err(DriverError::MissingDsn(kind));
    }

    let url = connection_url(kind, &profile.dsn);
    let options = AnyConnectOptions::from_str(&url)
        .map_err(|source| DriverError::InvalidDsn { driver: kind, source })?;

    let mut pool_options = AnyPoolOptions::new()
        .max_connections(kind.max_connections())
        .acquire_timeout(Duration::from_secs(10));
    if kind == DriverKind::Sqlite {
        pool_options = pool_options.after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("PRAGMA foreign_keys = ON").await?;
                conn.execute("PRAGMA journal_mode = WAL").await?;
                conn.execute("PRAGMA busy_timeout = 10000").await?;
                Ok(())
            })
        });
    }

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(|source| DriverError::Connect { driver: kind, source })?;

    tracing::info!(driver = %kind, "Database connected");
    Ok(DbDriver { kind, pool })
}

/// Translate a configured DSN into a connection URL.
pub fn connection_url(kind: DriverKind, dsn: &str) -> String {
    match kind {
        DriverKind::Sqlite => sqlite_url(dsn),
        DriverKind::Mysql => mysql_url(dsn),
        DriverKind::Postgres => dsn.to_string(),
    }
}

/// SQLite DSNs are file paths; the database file is created when missing.
fn sqlite_url(dsn: &str) -> String {
    let url = if dsn.starts_with("sqlite:") {
        dsn.to_string()
    } else {
        format!("sqlite:{dsn}")
    };

    if url.contains("mode=") || url.ends_with(":memory:") {
        url
    } else if url.contains('?') {
        format!("{url}&mode=rwc")
    } else {
        format!("{url}?mode=rwc")
    }
}

/// Accepts `mysql://` URLs and the `user:pass@tcp(host:port)/db?params` form.
fn mysql_url(dsn: &str) -> String {
    if dsn.starts_with("mysql://") || dsn.starts_with("mariadb://") {
        return dsn.to_string();
    }

    let (credentials, rest) = match dsn.rsplit_once('@') {
        Some((credentials, rest)) => (Some(credentials), rest),
        None => (None, dsn),
    };

    let rest = match rest.strip_prefix("tcp(").and_then(|r| r.split_once(')')) {
        Some((host, tail)) => format!("{host}{tail}"),
        None => rest.to_string(),
    };

    match credentials {
        Some(credentials) => format!("mysql://{credentials}@{rest}"),
        None => format!("mysql://{rest}"),
    }
}
