//! DuckDB storage adapters
//!
//! Each user's ledger lives in its own database file; users never share a
//! connection or a lock. The user directory is one further file shared by all.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use duckdb::{params, Connection};

use crate::domain::result::{Error, Result};
use crate::domain::{SealedAmount, Transaction, TransactionKind, User, UserId};
use crate::migrations::{LEDGER_MIGRATIONS, USER_MIGRATIONS};
use crate::ports::{LedgerStore, UserDirectory};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// Open a database file, retrying with exponential backoff while it is locked
fn open_with_retry(db_path: &Path) -> Result<Connection> {
    let mut last_error = None;

    for attempt in 0..MAX_RETRIES {
        match try_open_connection(db_path) {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                let err_msg = e.to_string();
                if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                    let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                    eprintln!(
                        "[pocket] Database busy, retrying in {}ms (attempt {}/{}): {}",
                        delay.as_millis(),
                        attempt + 1,
                        MAX_RETRIES,
                        err_msg
                    );
                    thread::sleep(delay);
                    last_error = Some(e);
                    continue;
                }
                return Err(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        Error::database(format!("Failed to open database after {} retries", MAX_RETRIES))
    }))
}

fn try_open_connection(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // Extension autoloading stays off: nothing here needs an extension
    let config = duckdb::Config::default().enable_autoload_extension(false)?;
    Ok(Connection::open_with_flags(db_path, config)?)
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a TIMESTAMP column read back as VARCHAR (always UTC)
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::database(format!("Invalid timestamp '{}': {}", s, e)))
}

// ============================================================================
// Ledger
// ============================================================================

/// Raw transaction row before kind/timestamp parsing
type TransactionRow = (i64, String, String, String, String, String, String);

/// One user's append-only transaction log
pub struct DuckDbLedger {
    user: UserId,
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl DuckDbLedger {
    /// Open (creating if needed) the ledger file for `user`
    pub fn open(db_path: &Path, user: UserId) -> Result<Self> {
        let conn = open_with_retry(db_path)?;
        let ledger = Self {
            user,
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
        };
        ledger.ensure_schema()?;
        Ok(ledger)
    }

    /// In-memory ledger, for tests and throwaway sessions
    pub fn open_in_memory(user: UserId) -> Result<Self> {
        let ledger = Self {
            user,
            conn: Mutex::new(Connection::open_in_memory()?),
            db_path: PathBuf::from(":memory:"),
        };
        ledger.ensure_schema()?;
        Ok(ledger)
    }

    pub fn ensure_schema(&self) -> Result<MigrationResult> {
        let conn = self.conn.lock().unwrap();
        MigrationService::new(&conn, LEDGER_MIGRATIONS).run_pending()
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn row_to_transaction(row: TransactionRow) -> Result<Transaction> {
        let (id, kind, nonce, ciphertext, tag, description, created_at) = row;
        Ok(Transaction {
            id,
            kind: kind.parse()?,
            sealed: SealedAmount {
                nonce,
                ciphertext,
                tag,
            },
            description,
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

impl LedgerStore for DuckDbLedger {
    fn user(&self) -> UserId {
        self.user
    }

    fn append(
        &self,
        kind: TransactionKind,
        sealed: &SealedAmount,
        description: &str,
    ) -> Result<Transaction> {
        let conn = self.conn.lock().unwrap();
        // Stored with microsecond precision; keep the returned value identical
        let created_at = Utc::now().trunc_subsecs(6);
        // One INSERT: the row becomes visible with nonce, ciphertext and tag together
        let id: i64 = conn.query_row(
            "INSERT INTO transactions (kind, nonce, ciphertext, tag, description, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING transaction_id",
            params![
                kind.as_str(),
                sealed.nonce,
                sealed.ciphertext,
                sealed.tag,
                description,
                format_timestamp(&created_at),
            ],
            |row| row.get(0),
        )?;

        Ok(Transaction {
            id,
            kind,
            sealed: sealed.clone(),
            description: description.to_string(),
            created_at,
        })
    }

    fn list_all(&self) -> Result<Vec<Transaction>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT transaction_id, kind, nonce, ciphertext, tag, description, created_at::VARCHAR
             FROM transactions
             ORDER BY created_at, transaction_id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<duckdb::Result<Vec<TransactionRow>>>()?;

        rows.into_iter().map(Self::row_to_transaction).collect()
    }

    fn clear(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute("DELETE FROM transactions", [])?)
    }

    fn count(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?)
    }
}

// ============================================================================
// User directory
// ============================================================================

/// Global registry of user id -> display name
pub struct DuckDbUserDirectory {
    conn: Mutex<Connection>,
}

impl DuckDbUserDirectory {
    pub fn open(db_path: &Path) -> Result<Self> {
        let directory = Self {
            conn: Mutex::new(open_with_retry(db_path)?),
        };
        directory.ensure_schema()?;
        Ok(directory)
    }

    pub fn open_in_memory() -> Result<Self> {
        let directory = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        directory.ensure_schema()?;
        Ok(directory)
    }

    fn ensure_schema(&self) -> Result<MigrationResult> {
        let conn = self.conn.lock().unwrap();
        MigrationService::new(&conn, USER_MIGRATIONS).run_pending()
    }

    fn query_user(conn: &Connection, id: UserId) -> Result<Option<User>> {
        let mut stmt =
            conn.prepare("SELECT display_name, joined_at::VARCHAR FROM users WHERE user_id = ?")?;
        let row: Option<(String, String)> = stmt
            .query_map(params![id.as_i64()], |row| Ok((row.get(0)?, row.get(1)?)))?
            .next()
            .transpose()?;

        row.map(|(display_name, joined_at)| {
            Ok(User {
                id,
                display_name,
                joined_at: parse_timestamp(&joined_at)?,
            })
        })
        .transpose()
    }
}

impl UserDirectory for DuckDbUserDirectory {
    fn register(&self, id: UserId, display_name: &str) -> Result<User> {
        let conn = self.conn.lock().unwrap();
        // First contact sets joined_at; later contacts only refresh the name
        conn.execute(
            "INSERT INTO users (user_id, display_name, joined_at) VALUES (?, ?, ?)
             ON CONFLICT (user_id) DO UPDATE SET display_name = EXCLUDED.display_name",
            params![id.as_i64(), display_name, format_timestamp(&Utc::now())],
        )?;
        Self::query_user(&conn, id)?
            .ok_or_else(|| Error::not_found(format!("User {} vanished after insert", id)))
    }

    fn get(&self, id: UserId) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        Self::query_user(&conn, id)
    }

    fn list(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT user_id, display_name, joined_at::VARCHAR FROM users ORDER BY joined_at, user_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, display_name, joined_at)| {
                Ok(User {
                    id: UserId(id),
                    display_name,
                    joined_at: parse_timestamp(&joined_at)?,
                })
            })
            .collect()
    }
}
