//! Conversation state for multi-step entry
//!
//! A user's session is a tagged state plus the data gathered so far. The
//! transition function is pure; executing a [`Action::Commit`] is the ledger
//! service's job.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::transaction::{parse_amount, TransactionKind};

/// Description stored when the user sends blank text
pub const PLACEHOLDER_DESCRIPTION: &str = "No description";

/// Where a user is in the entry dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingAmount(TransactionKind),
    AwaitingDescription(TransactionKind, Decimal),
}

impl ConversationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ConversationState::Idle)
    }

    /// The pending entry, if the user is mid-dialogue
    pub fn pending(&self) -> Option<PendingEntry> {
        match *self {
            ConversationState::Idle => None,
            ConversationState::AwaitingAmount(kind) => Some(PendingEntry { kind, amount: None }),
            ConversationState::AwaitingDescription(kind, amount) => Some(PendingEntry {
                kind,
                amount: Some(amount),
            }),
        }
    }
}

/// Transient entry being assembled across messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub kind: TransactionKind,
    pub amount: Option<Decimal>,
}

/// Inbound message after the transport has recognised its menu labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    Select(TransactionKind),
    Cancel,
    Text(&'a str),
}

/// What the state change asks the caller to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    PromptAmount(TransactionKind),
    RejectAmount(TransactionKind),
    PromptDescription(TransactionKind, Decimal),
    Commit {
        kind: TransactionKind,
        amount: Decimal,
        description: String,
    },
    Cancelled,
    NothingPending,
}

/// Advance the dialogue by one input
pub fn transition(state: ConversationState, input: Input<'_>) -> (ConversationState, Action) {
    match (state, input) {
        (_, Input::Select(kind)) => (
            ConversationState::AwaitingAmount(kind),
            Action::PromptAmount(kind),
        ),
        (ConversationState::Idle, Input::Cancel) => {
            (ConversationState::Idle, Action::NothingPending)
        }
        (_, Input::Cancel) => (ConversationState::Idle, Action::Cancelled),
        (ConversationState::Idle, Input::Text(_)) => {
            (ConversationState::Idle, Action::NothingPending)
        }
        (ConversationState::AwaitingAmount(kind), Input::Text(text)) => match parse_amount(text) {
            Some(amount) => (
                ConversationState::AwaitingDescription(kind, amount),
                Action::PromptDescription(kind, amount),
            ),
            None => (
                ConversationState::AwaitingAmount(kind),
                Action::RejectAmount(kind),
            ),
        },
        (ConversationState::AwaitingDescription(kind, amount), Input::Text(text)) => {
            let description = if text.trim().is_empty() {
                PLACEHOLDER_DESCRIPTION.to_string()
            } else {
                text.to_string()
            };
            (
                ConversationState::Idle,
                Action::Commit {
                    kind,
                    amount,
                    description,
                },
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INCOME: TransactionKind = TransactionKind::Income;
    const EXPENSE: TransactionKind = TransactionKind::Expense;

    #[test]
    fn test_select_from_idle() {
        let (state, action) = transition(ConversationState::Idle, Input::Select(INCOME));
        assert_eq!(state, ConversationState::AwaitingAmount(INCOME));
        assert_eq!(action, Action::PromptAmount(INCOME));

        let (state, _) = transition(ConversationState::Idle, Input::Select(EXPENSE));
        assert_eq!(state, ConversationState::AwaitingAmount(EXPENSE));
    }

    #[test]
    fn test_invalid_amount_keeps_state() {
        let start = ConversationState::AwaitingAmount(EXPENSE);
        let (state, action) = transition(start, Input::Text("abc"));
        assert_eq!(state, start);
        assert_eq!(action, Action::RejectAmount(EXPENSE));
    }

    #[test]
    fn test_valid_amount_moves_to_description() {
        let (state, action) =
            transition(ConversationState::AwaitingAmount(INCOME), Input::Text("2000"));
        let amount = Decimal::new(2000, 0);
        assert_eq!(state, ConversationState::AwaitingDescription(INCOME, amount));
        assert_eq!(action, Action::PromptDescription(INCOME, amount));
        assert_eq!(
            state.pending(),
            Some(PendingEntry { kind: INCOME, amount: Some(amount) })
        );
    }

    #[test]
    fn test_description_commits_and_returns_to_idle() {
        let amount = Decimal::new(500, 0);
        let (state, action) = transition(
            ConversationState::AwaitingDescription(EXPENSE, amount),
            Input::Text("pizza"),
        );
        assert!(state.is_idle());
        assert_eq!(
            action,
            Action::Commit { kind: EXPENSE, amount, description: "pizza".to_string() }
        );
    }

    #[test]
    fn test_blank_description_uses_placeholder() {
        let amount = Decimal::new(2000, 0);
        let (_, action) = transition(
            ConversationState::AwaitingDescription(INCOME, amount),
            Input::Text("   "),
        );
        match action {
            Action::Commit { description, .. } => assert_eq!(description, PLACEHOLDER_DESCRIPTION),
            other => panic!("expected commit, got {:?}", other),
        }
    }

    #[test]
    fn test_reselect_discards_pending_entry() {
        let (state, _) = transition(
            ConversationState::AwaitingDescription(INCOME, Decimal::ONE),
            Input::Select(EXPENSE),
        );
        assert_eq!(state, ConversationState::AwaitingAmount(EXPENSE));
    }

    #[test]
    fn test_cancel_and_idle_text() {
        let (state, action) =
            transition(ConversationState::AwaitingAmount(INCOME), Input::Cancel);
        assert!(state.is_idle());
        assert_eq!(action, Action::Cancelled);

        let (state, action) = transition(ConversationState::Idle, Input::Text("hello"));
        assert!(state.is_idle());
        assert_eq!(action, Action::NothingPending);
        assert!(state.pending().is_none());
    }
}
