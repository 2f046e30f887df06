//! Schema migration catalog.
//!
//! Every entry is applied inside one transaction together with its
//! `migration_history` row, so a database is always at a catalog boundary.

use crate::store::driver::DriverKind;

/// One schema version and its statements for every dialect.
#[derive(Debug)]
pub struct Migration {
    pub version: &'static str,
    sqlite: &'static [&'static str],
    mysql: &'static [&'static str],
    postgres: &'static [&'static str],
}

impl Migration {
    pub fn statements(&self, kind: DriverKind) -> &'static [&'static str] {
        match kind {
            DriverKind::Sqlite => self.sqlite,
            DriverKind::Mysql => self.mysql,
            DriverKind::Postgres => self.postgres,
        }
    }
}

/// Ordered catalog, oldest first.
pub static MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0.1.0",
        sqlite: &[
            "CREATE TABLE system_setting (
                name TEXT NOT NULL PRIMARY KEY,
                value TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT ''
            )",
            "CREATE TABLE \"user\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_ts BIGINT NOT NULL DEFAULT (strftime('%s', 'now')),
                updated_ts BIGINT NOT NULL DEFAULT (strftime('%s', 'now')),
                row_status TEXT NOT NULL DEFAULT 'NORMAL',
                username TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL DEFAULT 'USER',
                nickname TEXT NOT NULL DEFAULT '',
                password_hash TEXT NOT NULL
            )",
            "CREATE TABLE memo (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uid TEXT NOT NULL UNIQUE,
                creator_id INTEGER NOT NULL,
                created_ts BIGINT NOT NULL DEFAULT (strftime('%s', 'now')),
                updated_ts BIGINT NOT NULL DEFAULT (strftime('%s', 'now')),
                row_status TEXT NOT NULL DEFAULT 'NORMAL',
                content TEXT NOT NULL DEFAULT '',
                visibility TEXT NOT NULL DEFAULT 'PRIVATE'
            )",
        ],
        mysql: &[
            "CREATE TABLE `system_setting` (
                `name` VARCHAR(256) NOT NULL PRIMARY KEY,
                `value` LONGTEXT NOT NULL,
                `description` VARCHAR(256) NOT NULL DEFAULT ''
            )",
            "CREATE TABLE `user` (
                `id` INT NOT NULL AUTO_INCREMENT PRIMARY KEY,
                `created_ts` TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                `updated_ts` TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                `row_status` VARCHAR(256) NOT NULL DEFAULT 'NORMAL',
                `username` VARCHAR(256) NOT NULL UNIQUE,
                `role` VARCHAR(256) NOT NULL DEFAULT 'USER',
                `nickname` VARCHAR(256) NOT NULL DEFAULT '',
                `password_hash` VARCHAR(256) NOT NULL
            )",
            "CREATE TABLE `memo` (
                `id` INT NOT NULL AUTO_INCREMENT PRIMARY KEY,
                `uid` VARCHAR(256) NOT NULL UNIQUE,
                `creator_id` INT NOT NULL,
                `created_ts` TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                `updated_ts` TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                `row_status` VARCHAR(256) NOT NULL DEFAULT 'NORMAL',
                `content` TEXT NOT NULL,
                `visibility` VARCHAR(256) NOT NULL DEFAULT 'PRIVATE'
            )",
        ],
        postgres: &[
            "CREATE TABLE system_setting (
                name TEXT NOT NULL PRIMARY KEY,
                value TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT ''
            )",
            "CREATE TABLE \"user\" (
                id SERIAL PRIMARY KEY,
                created_ts BIGINT NOT NULL DEFAULT EXTRACT(EPOCH FROM NOW()),
                updated_ts BIGINT NOT NULL DEFAULT EXTRACT(EPOCH FROM NOW()),
                row_status TEXT NOT NULL DEFAULT 'NORMAL',
                username TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL DEFAULT 'USER',
                nickname TEXT NOT NULL DEFAULT '',
                password_hash TEXT NOT NULL
            )",
            "CREATE TABLE memo (
                id SERIAL PRIMARY KEY,
                uid TEXT NOT NULL UNIQUE,
                creator_id INTEGER NOT NULL,
                created_ts BIGINT NOT NULL DEFAULT EXTRACT(EPOCH FROM NOW()),
                updated_ts BIGINT NOT NULL DEFAULT EXTRACT(EPOCH FROM NOW()),
                row_status TEXT NOT NULL DEFAULT 'NORMAL',
                content TEXT NOT NULL DEFAULT '',
                visibility TEXT NOT NULL DEFAULT 'PRIVATE'
            )",
        ],
    },
    Migration {
        version: "0.2.0",
        sqlite: &[
            "CREATE INDEX idx_memo_creator_id ON memo (creator_id)",
            "CREATE INDEX idx_memo_created_ts ON memo (created_ts)",
        ],
        mysql: &[
            "CREATE INDEX idx_memo_creator_id ON `memo` (`creator_id`)",
            "CREATE INDEX idx_memo_created_ts ON `memo` (`created_ts`)",
        ],
        postgres: &[
            "CREATE INDEX idx_memo_creator_id ON memo (creator_id)",
            "CREATE INDEX idx_memo_created_ts ON memo (created_ts)",
        ],
    },
];

/// Rows inserted into a freshly migrated database in `demo` mode.
pub fn demo_seed(kind: DriverKind) -> &'static [&'static str] {
    match kind {
        DriverKind::Mysql => &[
            "INSERT INTO `user` (`username`, `role`, `nickname`, `password_hash`) VALUES ('demo', 'HOST', 'Demo', '')",
            "INSERT INTO `memo` (`uid`, `creator_id`, `content`, `visibility`) VALUES ('welcome', 1, 'Welcome to memos!', 'PUBLIC')",
        ],
        DriverKind::Sqlite | DriverKind::Postgres => &[
            "INSERT INTO \"user\" (username, role, nickname, password_hash) VALUES ('demo', 'HOST', 'Demo', '')",
            "INSERT INTO memo (uid, creator_id, content, visibility) VALUES ('welcome', 1, 'Welcome to memos!', 'PUBLIC')",
        ],
    }
}

pub fn history_table(kind: DriverKind) -> &'static str {
    match kind {
        DriverKind::Sqlite => {
            "CREATE TABLE IF NOT EXISTS migration_history (
                version TEXT NOT NULL PRIMARY KEY,
                created_ts BIGINT NOT NULL
            )"
        }
        DriverKind::Mysql => {
            "CREATE TABLE IF NOT EXISTS `migration_history` (
                `version` VARCHAR(256) NOT NULL PRIMARY KEY,
                `created_ts` BIGINT NOT NULL
            )"
        }
        DriverKind::Postgres => {
            "CREATE TABLE IF NOT EXISTS migration_history (
                version TEXT NOT NULL PRIMARY KEY,
                created_ts BIGINT NOT NULL
            )"
        }
    }
}

pub fn record_version_sql(kind: DriverKind) -> String {
    format!(
        "INSERT INTO migration_history (version, created_ts) VALUES ({}, {})",
        kind.placeholder(1),
        kind.placeholder(2)
    )
}

/// Newest catalog version.
pub fn latest_version() -> Option<&'static str> {
    MIGRATIONS.last().map(|m| m.version)
}
