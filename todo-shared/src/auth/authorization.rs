/// Resource-level authorization
///
/// There are no roles: a todo belongs to exactly one user and only that user
/// may read, change or delete it. The check is not a separate read. It is part
/// of the statement that touches the row (`WHERE id = ? AND owner_id = ?`), so
/// a write takes the database write lock directly and a foreign row simply
/// matches nothing. Callers report "nothing matched" as not found, which makes
/// foreign IDs indistinguishable from missing ones.

use uuid::Uuid;

use super::gate::CurrentUser;

/// Rows visible to a single user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerScope {
    owner_id: Uuid,
}

impl OwnerScope {
    /// Row filter; bind the row ID first, then [`OwnerScope::owner_id`]
    pub const PREDICATE: &'static str = "id = ? AND owner_id = ?";

    pub fn of(current: &CurrentUser) -> Self {
        Self {
            owner_id: current.id(),
        }
    }

    pub fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

impl From<&CurrentUser> for OwnerScope {
    fn from(current: &CurrentUser) -> Self {
        Self::of(current)
    }
}
