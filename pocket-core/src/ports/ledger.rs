//! Ledger store port - one append-only log per user

use crate::domain::result::Result;
use crate::domain::{SealedAmount, Transaction, TransactionKind, UserId};

/// A single user's append-only transaction log
///
/// All reads and writes for one user go through one handle, which is the
/// serialization boundary for that user. Handles for different users never
/// contend.
pub trait LedgerStore: Send + Sync {
    /// The user this log belongs to
    fn user(&self) -> UserId;

    /// Durably append a transaction. The returned id is greater than every
    /// id this log has ever issued.
    fn append(
        &self,
        kind: TransactionKind,
        sealed: &SealedAmount,
        description: &str,
    ) -> Result<Transaction>;

    /// Every transaction, oldest first
    fn list_all(&self) -> Result<Vec<Transaction>>;

    /// Irreversibly delete all transactions, returning how many were removed
    fn clear(&self) -> Result<usize>;

    fn count(&self) -> Result<i64>;
}
