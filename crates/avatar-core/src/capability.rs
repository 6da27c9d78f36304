//! Capability predicate for editing other users' avatars
//!
//! Authorization itself belongs to the host platform. The core only exposes
//! the predicate so the transport can decide whose avatar a request targets.

use std::collections::HashSet;

use crate::models::UserId;

/// The authenticated caller of an avatar operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
}

impl Actor {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self { id: id.into() }
    }
}

pub trait EditOthersPolicy: Send + Sync {
    fn can_edit_others_avatar(&self, actor: &Actor) -> bool;
}

/// Fixed set of users allowed to change anyone's avatar.
#[derive(Debug, Clone, Default)]
pub struct EditorAllowlist {
    editors: HashSet<UserId>,
}

impl EditorAllowlist {
    pub fn new(editors: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            editors: editors.into_iter().collect(),
        }
    }
}

impl EditOthersPolicy for EditorAllowlist {
    fn can_edit_others_avatar(&self, actor: &Actor) -> bool {
        self.editors.contains(&actor.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowlist() {
        let policy = EditorAllowlist::new([UserId(1)]);
        assert!(policy.can_edit_others_avatar(&Actor::new(1)));
        assert!(!policy.can_edit_others_avatar(&Actor::new(2)));
        assert!(!EditorAllowlist::default().can_edit_others_avatar(&Actor::new(1)));
    }
}
