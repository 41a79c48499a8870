use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type FriendId = Uuid;

/// A member of the group sharing expenses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friend {
    pub id: FriendId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Friend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }

    /// Key that names are compared by.
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }
}

/// Normalized form of a friend name: trimmed and lowercased (Unicode aware).
/// Two names with the same key belong to the same friend.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}
