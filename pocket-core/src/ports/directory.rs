//! User directory port

use crate::domain::result::Result;
use crate::domain::{User, UserId};

/// Global registry of users and their display names
pub trait UserDirectory: Send + Sync {
    /// Record a contact. Creates the user on first contact and refreshes the
    /// display name afterwards; the join timestamp never changes.
    fn register(&self, id: UserId, display_name: &str) -> Result<User>;

    fn get(&self, id: UserId) -> Result<Option<User>>;

    /// All users, earliest joiner first
    fn list(&self) -> Result<Vec<User>>;
}
