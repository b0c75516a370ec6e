//! Character Entity
//!
//! Only the fields the economy touches. The character catalog owns the
//! rest of the profile.

use chrono::{DateTime, Utc};
use kernel::id::{CharacterId, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: CharacterId,
    pub owner_id: UserId,
    pub name: String,
    pub avatar: Option<String>,
    pub description: String,
    pub personality: String,
    pub category: String,
    /// Set on copies created by a marketplace purchase
    pub source_character_id: Option<CharacterId>,
    pub created_at: DateTime<Utc>,
}

impl Character {
    pub fn new(owner_id: UserId, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: CharacterId::new(),
            owner_id,
            name: name.into(),
            avatar: None,
            description: String::new(),
            personality: String::new(),
            category: String::new(),
            source_character_id: None,
            created_at: now,
        }
    }

    /// Independent copy owned by `buyer`. Later edits to either side do not
    /// affect the other.
    pub fn clone_for(&self, buyer: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: CharacterId::new(),
            owner_id: buyer,
            name: self.name.clone(),
            avatar: self.avatar.clone(),
            description: self.description.clone(),
            personality: self.personality.clone(),
            category: self.category.clone(),
            source_character_id: Some(self.id),
            created_at: now,
        }
    }
}
