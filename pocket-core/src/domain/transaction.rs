//! Transaction domain model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::result::Error;

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    /// Stored representation in the ledger `kind` column
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }

    /// Apply the kind's sign to an unsigned amount
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            TransactionKind::Income => amount,
            TransactionKind::Expense => -amount,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(Error::validation(format!("Unknown transaction kind: {}", other))),
        }
    }
}

/// Encrypted amount as stored: three independent base64 strings
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SealedAmount {
    pub nonce: String,
    pub ciphertext: String,
    pub tag: String,
}

impl SealedAmount {
    pub fn new(
        nonce: impl Into<String>,
        ciphertext: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            nonce: nonce.into(),
            ciphertext: ciphertext.into(),
            tag: tag.into(),
        }
    }
}

/// A committed ledger entry. Append-only, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub kind: TransactionKind,
    pub sealed: SealedAmount,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A transaction with its amount decrypted, for history display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Parse user input as a non-negative amount
///
/// Accepts plain decimals ("2000", "12.50") and scientific notation ("2e3").
/// Returns `None` for anything else, including negative numbers.
pub fn parse_amount(text: &str) -> Option<Decimal> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let amount = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return None;
    }
    Some(amount.abs())
}
