//! Database migrations - embedded SQL files
//!
//! Migrations are compiled into the binary at build time using include_str!.
//! Each migration is a tuple of (name, sql_content).
//! Migrations are sorted by name and applied in order.
//!
//! Every per-user ledger file gets [`LEDGER_MIGRATIONS`], the global user
//! directory gets [`USER_MIGRATIONS`] and logs.duckdb gets [`LOG_MIGRATIONS`].

/// Name of the bootstrap migration shared by every migration set
pub const BOOTSTRAP_MIGRATION: &str = "000_migrations.sql";

/// Migrations for a per-user ledger database.
///
/// IMPORTANT: When adding a new migration:
/// 1. Create the SQL file: ledger/NNN_description.sql
/// 2. Add an entry here in order
pub const LEDGER_MIGRATIONS: &[(&str, &str)] = &[
    (BOOTSTRAP_MIGRATION, include_str!("000_migrations.sql")),
    ("001_transactions.sql", include_str!("ledger/001_transactions.sql")),
];

/// Migrations for the global user directory
pub const USER_MIGRATIONS: &[(&str, &str)] = &[
    (BOOTSTRAP_MIGRATION, include_str!("000_migrations.sql")),
    ("001_users.sql", include_str!("users/001_users.sql")),
];

/// Migrations for the event log database
pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    (BOOTSTRAP_MIGRATION, include_str!("000_migrations.sql")),
    ("001_sys_logs.sql", include_str!("logs/001_sys_logs.sql")),
];
