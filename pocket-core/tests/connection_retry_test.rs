//! Tests for ledger file open/reopen behaviour
//!
//! Run with: cargo test --test connection_retry_test -- --nocapture

use std::time::Instant;
use tempfile::TempDir;

use pocket_core::adapters::duckdb::{DuckDbLedger, DuckDbUserDirectory};
use pocket_core::domain::{SealedAmount, TransactionKind};
use pocket_core::ports::{LedgerStore, UserDirectory};
use pocket_core::UserId;

/// Opening and closing the same ledger repeatedly keeps data and schema intact
#[test]
fn test_sequential_connections() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("ledgers").join("7.duckdb");

    for i in 0..5 {
        let start = Instant::now();
        let ledger = DuckDbLedger::open(&db_path, UserId(7)).unwrap();
        ledger
            .append(
                TransactionKind::Expense,
                &SealedAmount::new("bm9uY2U=", "Y3Q=", "dGFn"),
                "coffee",
            )
            .unwrap();
        assert_eq!(ledger.count().unwrap(), i + 1);
        println!("Connection {}: opened and appended in {:?}", i, start.elapsed());
        // Connection dropped at end of loop
    }

    let ledger = DuckDbLedger::open(&db_path, UserId(7)).unwrap();
    let ids: Vec<i64> = ledger.list_all().unwrap().iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
}

/// Re-running migrations on an existing file applies nothing new
#[test]
fn test_reopen_does_not_reapply_migrations() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("9.duckdb");

    let first = DuckDbLedger::open(&db_path, UserId(9)).unwrap();
    drop(first);

    let ledger = DuckDbLedger::open(&db_path, UserId(9)).unwrap();
    let result = ledger.ensure_schema().unwrap();
    assert!(result.applied.is_empty());
    assert_eq!(result.already_applied, 2);
}

/// The user directory file is created on demand, parent directories included
#[test]
fn test_directory_file_created_in_missing_parent() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("users.duckdb");

    {
        let directory = DuckDbUserDirectory::open(&db_path).unwrap();
        directory.register(UserId(1), "First").unwrap();
    }
    assert!(db_path.exists());

    let directory = DuckDbUserDirectory::open(&db_path).unwrap();
    assert_eq!(directory.get(UserId(1)).unwrap().unwrap().display_name, "First");
}
