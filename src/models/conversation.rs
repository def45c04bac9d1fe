//! Conversation aggregate and its outward view
//!
//! A conversation owns its member set. Group conversations carry a display
//! name and photo reference; direct conversations are a fixed pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    /// Fixed two-party conversation, membership immutable
    Direct,
    /// Mutable membership, supports rename/rephoto/add/remove
    Group,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a stored conversation. Disposed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Active,
    Disposed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: Uuid,
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub photo: Option<String>,
    pub members: BTreeSet<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Build a group. Duplicate member ids collapse into one membership edge.
    pub fn new_group(
        name: String,
        photo: Option<String>,
        members: impl IntoIterator<Item = Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind: ConversationKind::Group,
            name: Some(name),
            photo,
            members: members.into_iter().collect(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn new_direct(a: Uuid, b: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind: ConversationKind::Direct,
            name: None,
            photo: None,
            members: [a, b].into_iter().collect(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.members.contains(&user_id)
    }

    pub fn is_group(&self) -> bool {
        self.kind == ConversationKind::Group
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// The other participant of a direct conversation
    pub fn peer_of(&self, user_id: Uuid) -> Option<Uuid> {
        if self.kind != ConversationKind::Direct || !self.is_member(user_id) {
            return None;
        }
        self.members.iter().copied().find(|m| *m != user_id)
    }
}

/// Full conversation view returned to members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationView {
    pub id: Uuid,
    pub kind: ConversationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    pub members: Vec<Uuid>,
    pub member_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationView {
    fn from(c: Conversation) -> Self {
        let member_count = c.members.len();
        Self {
            id: c.id,
            kind: c.kind,
            name: c.name,
            photo: c.photo,
            members: c.members.into_iter().collect(),
            member_count,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}
