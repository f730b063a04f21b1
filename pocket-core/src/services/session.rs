//! Transient per-user conversation state
//!
//! Held in memory only; a restart forgets every pending entry.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::{ConversationState, UserId};

#[derive(Debug, Default)]
pub struct SessionStore {
    states: Mutex<HashMap<UserId, ConversationState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state, `Idle` for users never seen
    pub fn get(&self, user: UserId) -> ConversationState {
        self.states
            .lock()
            .unwrap()
            .get(&user)
            .copied()
            .unwrap_or_default()
    }

    /// Store the next state. Idle users are not kept in the map.
    pub fn set(&self, user: UserId, state: ConversationState) {
        let mut states = self.states.lock().unwrap();
        if state.is_idle() {
            states.remove(&user);
        } else {
            states.insert(user, state);
        }
    }

    /// Discard any pending entry for `user`
    pub fn reset(&self, user: UserId) {
        self.states.lock().unwrap().remove(&user);
    }

    /// Number of users mid-dialogue
    pub fn pending_count(&self) -> usize {
        self.states.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransactionKind;

    #[test]
    fn test_unknown_user_is_idle() {
        let store = SessionStore::new();
        assert_eq!(store.get(UserId(1)), ConversationState::Idle);
    }

    #[test]
    fn test_states_are_per_user() {
        let store = SessionStore::new();
        store.set(UserId(1), ConversationState::AwaitingAmount(TransactionKind::Income));
        store.set(UserId(2), ConversationState::AwaitingAmount(TransactionKind::Expense));

        assert_eq!(
            store.get(UserId(1)),
            ConversationState::AwaitingAmount(TransactionKind::Income)
        );
        assert_eq!(store.pending_count(), 2);

        store.set(UserId(1), ConversationState::Idle);
        assert_eq!(store.pending_count(), 1);
        store.reset(UserId(2));
        assert_eq!(store.pending_count(), 0);
    }
}
