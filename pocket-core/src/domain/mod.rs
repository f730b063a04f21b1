//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

pub mod balance;
mod encryption;
pub mod result;
pub mod session;
mod transaction;
mod user;

pub use balance::{BalancePoint, BalanceSnapshot};
pub use encryption::{
    DecryptFaultPolicy, KdfParams, DEFAULT_ITERATIONS, DEFAULT_SALT, KEY_LEN, MIN_ITERATIONS,
};
pub use session::{Action, ConversationState, Input, PendingEntry, PLACEHOLDER_DESCRIPTION};
pub use transaction::{parse_amount, HistoryEntry, SealedAmount, Transaction, TransactionKind};
pub use user::{User, UserId};
