//! Ledger service - dialogue handling, commits and derived views
//!
//! Owns the caches and the session store. Every operation that touches a
//! ledger file or runs the cipher is moved to the blocking pool.

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use super::cache::Caches;
use super::cipher;
use super::keys::{KeyDerivation, UserKey};
use super::logging::{LogEvent, LoggingService};
use super::registry::LedgerRegistry;
use super::session::SessionStore;
use crate::domain::balance::checked_add;
use crate::domain::result::Result;
use crate::domain::session::transition;
use crate::domain::{
    Action, BalancePoint, BalanceSnapshot, ConversationState, DecryptFaultPolicy, HistoryEntry,
    Input, Transaction, TransactionKind, UserId,
};
use crate::ports::{ChartArtifact, ChartExporter};

/// Outcome of one inbound message, for the transport to render
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    AmountRequested {
        kind: TransactionKind,
    },
    InvalidAmount {
        kind: TransactionKind,
    },
    DescriptionRequested {
        kind: TransactionKind,
        amount: Decimal,
    },
    Committed {
        transaction_id: i64,
        kind: TransactionKind,
        amount: Decimal,
        description: String,
    },
    /// Expense larger than the current balance; nothing was recorded
    InsufficientFunds {
        requested: Decimal,
        balance: Decimal,
    },
    /// Recording the amount would push the totals past what a ledger can hold
    AmountTooLarge {
        kind: TransactionKind,
        requested: Decimal,
    },
    Cancelled,
    NothingPending,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::AmountRequested { kind } => write!(f, "Enter the {} amount:", kind),
            Reply::InvalidAmount { .. } => {
                write!(f, "That is not a valid amount. Enter a non-negative number:")
            }
            Reply::DescriptionRequested { .. } => {
                write!(f, "Enter a description (or leave it blank):")
            }
            Reply::Committed {
                kind,
                amount,
                description,
                ..
            } => write!(f, "Recorded {} of {}: {}", kind, amount, description),
            Reply::InsufficientFunds { requested, balance } => write!(
                f,
                "Insufficient funds: expense of {} exceeds your balance of {}",
                requested, balance
            ),
            Reply::AmountTooLarge { kind, requested } => write!(
                f,
                "The {} of {} is too large to record. Nothing was saved.",
                kind, requested
            ),
            Reply::Cancelled => write!(f, "Cancelled."),
            Reply::NothingPending => {
                write!(f, "Nothing pending. Choose income or expense first.")
            }
        }
    }
}

#[derive(Clone)]
pub struct LedgerService {
    registry: Arc<LedgerRegistry>,
    keys: Arc<KeyDerivation>,
    caches: Arc<Caches>,
    sessions: Arc<SessionStore>,
    fault_policy: DecryptFaultPolicy,
    logger: Option<Arc<LoggingService>>,
}

impl LedgerService {
    pub fn new(
        registry: Arc<LedgerRegistry>,
        keys: KeyDerivation,
        caches: Arc<Caches>,
        sessions: Arc<SessionStore>,
        fault_policy: DecryptFaultPolicy,
    ) -> Self {
        Self {
            registry,
            keys: Arc::new(keys),
            caches,
            sessions,
            fault_policy,
            logger: None,
        }
    }

    /// Record commits, rejections and faults in the event log
    pub fn with_logger(mut self, logger: Arc<LoggingService>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn caches(&self) -> &Caches {
        &self.caches
    }

    pub fn session_state(&self, user: UserId) -> ConversationState {
        self.sessions.get(user)
    }

    /// Advance the user's dialogue by one message
    ///
    /// The session moves to its next state before any commit runs, so a
    /// failed commit leaves the user idle with nothing pending.
    pub async fn handle_message(&self, user: UserId, input: Input<'_>) -> Result<Reply> {
        let (next, action) = transition(self.sessions.get(user), input);
        self.sessions.set(user, next);

        match action {
            Action::PromptAmount(kind) => Ok(Reply::AmountRequested { kind }),
            Action::RejectAmount(kind) => Ok(Reply::InvalidAmount { kind }),
            Action::PromptDescription(kind, amount) => {
                Ok(Reply::DescriptionRequested { kind, amount })
            }
            Action::Commit {
                kind,
                amount,
                description,
            } => {
                let this = self.clone();
                tokio::task::spawn_blocking(move || this.commit(user, kind, amount, description))
                    .await?
            }
            Action::Cancelled => Ok(Reply::Cancelled),
            Action::NothingPending => Ok(Reply::NothingPending),
        }
    }

    pub async fn balance(&self, user: UserId) -> Result<BalanceSnapshot> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.compute_balance(user)).await?
    }

    /// Decrypted transactions, newest first
    pub async fn history(&self, user: UserId) -> Result<Vec<HistoryEntry>> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<HistoryEntry>> {
            let (transactions, amounts) = this.load_decrypted(user)?;
            let mut entries: Vec<HistoryEntry> = transactions
                .into_iter()
                .zip(amounts)
                .map(|(tx, amount)| HistoryEntry {
                    id: tx.id,
                    kind: tx.kind,
                    amount,
                    description: tx.description,
                    created_at: tx.created_at,
                })
                .collect();
            entries.reverse();
            Ok(entries)
        })
        .await?
    }

    /// Chronological balance changes with the running balance after each
    pub async fn balance_series(&self, user: UserId) -> Result<Vec<BalancePoint>> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<BalancePoint>> {
            let (transactions, amounts) = this.load_decrypted(user)?;
            let mut running = Decimal::ZERO;
            transactions
                .iter()
                .zip(amounts)
                .map(|(tx, amount)| -> Result<BalancePoint> {
                    let delta = tx.kind.signed(amount);
                    running = checked_add(running, delta)?;
                    Ok(BalancePoint {
                        timestamp: tx.created_at,
                        delta,
                        running_balance: running,
                    })
                })
                .collect()
        })
        .await?
    }

    /// Hand the balance series to an exporter
    pub async fn export_chart(
        &self,
        user: UserId,
        exporter: &dyn ChartExporter,
    ) -> Result<ChartArtifact> {
        let points = self.balance_series(user).await?;
        exporter.export(user, &points)
    }

    /// Delete every transaction of `user`. Irreversible.
    pub async fn clear(&self, user: UserId) -> Result<usize> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || -> Result<usize> {
            let removed = this.registry.ledger(user)?.clear()?;
            this.caches.invalidate_user(user);
            this.log(LogEvent::new("ledger_cleared").with_user(user));
            Ok(removed)
        })
        .await?
    }

    pub async fn transaction_count(&self, user: UserId) -> Result<i64> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.registry.ledger(user)?.count()).await?
    }

    fn commit(
        &self,
        user: UserId,
        kind: TransactionKind,
        amount: Decimal,
        description: String,
    ) -> Result<Reply> {
        let current = self.compute_balance(user)?;
        if kind == TransactionKind::Expense && current.cannot_cover(amount) {
            self.log(LogEvent::new("expense_rejected").with_user(user));
            return Ok(Reply::InsufficientFunds {
                requested: amount,
                balance: current.balance,
            });
        }
        // Every stored entry must keep the ledger replayable
        if current.with_entry(kind, amount).is_err() {
            self.log(LogEvent::new("amount_out_of_range").with_user(user));
            return Ok(Reply::AmountTooLarge {
                kind,
                requested: amount,
            });
        }

        let key = self.keys.derive(user);
        let sealed = cipher::encrypt(amount, &key)?;
        let appended = self
            .registry
            .ledger(user)
            .and_then(|ledger| ledger.append(kind, &sealed, &description));
        let tx = match appended {
            Ok(tx) => tx,
            Err(e) => {
                self.log(
                    LogEvent::new("transaction_failed")
                        .with_user(user)
                        .with_error(e.to_string()),
                );
                return Err(e);
            }
        };

        self.caches.balance.invalidate(user);
        self.caches
            .decryption
            .insert(user, tx.sealed.clone(), amount.normalize());
        self.log(LogEvent::new("transaction_committed").with_user(user));

        Ok(Reply::Committed {
            transaction_id: tx.id,
            kind,
            amount,
            description,
        })
    }

    fn compute_balance(&self, user: UserId) -> Result<BalanceSnapshot> {
        if let Some(snapshot) = self.caches.balance.get(user) {
            return Ok(snapshot);
        }

        let (transactions, amounts) = self.load_decrypted(user)?;
        let snapshot =
            BalanceSnapshot::from_entries(transactions.iter().map(|tx| tx.kind).zip(amounts))?;
        self.caches.balance.insert(user, snapshot);
        Ok(snapshot)
    }

    /// Full ledger scan with every amount decrypted (in ledger order)
    fn load_decrypted(&self, user: UserId) -> Result<(Vec<Transaction>, Vec<Decimal>)> {
        let transactions = self.registry.ledger(user)?.list_all()?;

        // Derived at most once per scan, and only on a cache miss
        let mut key: Option<UserKey> = None;
        let amounts = transactions
            .iter()
            .map(|tx| self.decrypt_amount(user, tx, &mut key))
            .collect::<Result<Vec<_>>>()?;

        Ok((transactions, amounts))
    }

    fn decrypt_amount(
        &self,
        user: UserId,
        tx: &Transaction,
        key: &mut Option<UserKey>,
    ) -> Result<Decimal> {
        if let Some(amount) = self.caches.decryption.get(user, &tx.sealed) {
            return Ok(amount);
        }

        let key = key.get_or_insert_with(|| self.keys.derive(user));
        match cipher::decrypt(&tx.sealed, key) {
            Ok(amount) => {
                self.caches.decryption.insert(user, tx.sealed.clone(), amount);
                Ok(amount)
            }
            Err(e) if e.is_decryption_fault() => {
                self.log(
                    LogEvent::new("decryption_fault")
                        .with_user(user)
                        .with_error(e.to_string())
                        .with_error_details(format!(
                            "transaction {} (policy: {})",
                            tx.id, self.fault_policy
                        )),
                );
                match self.fault_policy {
                    DecryptFaultPolicy::Surface => Err(e),
                    // Lossy: the entry counts as zero and is not memoized
                    DecryptFaultPolicy::SubstituteZero => Ok(Decimal::ZERO),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Logging never fails an operation
    fn log(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            let _ = logger.log(event);
        }
    }
}
