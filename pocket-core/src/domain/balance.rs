//! Balance snapshot domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};
use super::transaction::TransactionKind;

/// Derived totals for one user's ledger
///
/// Never authoritative: always reconstructible by replaying the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub balance: Decimal,
}

impl BalanceSnapshot {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Fold one decrypted entry into the totals
    ///
    /// Fails without modifying `self` when a total leaves the `Decimal` range.
    pub fn apply(&mut self, kind: TransactionKind, amount: Decimal) -> Result<()> {
        let mut next = *self;
        match kind {
            TransactionKind::Income => {
                next.total_income = checked_add(next.total_income, amount)?;
            }
            TransactionKind::Expense => {
                next.total_expense = checked_add(next.total_expense, amount)?;
            }
        }
        next.balance = next
            .total_income
            .checked_sub(next.total_expense)
            .ok_or_else(out_of_range)?;
        *self = next;
        Ok(())
    }

    /// The snapshot after one more entry, leaving this one untouched
    pub fn with_entry(&self, kind: TransactionKind, amount: Decimal) -> Result<Self> {
        let mut next = *self;
        next.apply(kind, amount)?;
        Ok(next)
    }

    /// Replay a sequence of entries from zero
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (TransactionKind, Decimal)>,
    {
        let mut snapshot = Self::zero();
        for (kind, amount) in entries {
            snapshot.apply(kind, amount)?;
        }
        Ok(snapshot)
    }

    /// Whether an expense of `amount` would overdraw this balance
    pub fn cannot_cover(&self, amount: Decimal) -> bool {
        amount > self.balance
    }
}

pub(crate) fn checked_add(total: Decimal, amount: Decimal) -> Result<Decimal> {
    total.checked_add(amount).ok_or_else(out_of_range)
}

fn out_of_range() -> Error {
    Error::validation("Ledger totals exceed the representable amount range")
}

/// One point of the balance time series handed to a chart exporter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancePoint {
    pub timestamp: DateTime<Utc>,
    /// Positive for income, negative for expense
    pub delta: Decimal,
    /// Balance after applying this point
    pub running_balance: Decimal,
}
