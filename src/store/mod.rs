//! Membership store: the authoritative member set and metadata of every
//! conversation.
//!
//! Implementations must publish whole-conversation snapshots: a reader sees a
//! conversation either before or after a mutation, never a partial member set.
//! Serializing the check-then-mutate sequence across callers is the job of the
//! conversation service's per-conversation lock; the store only guarantees each
//! single call is atomic.

pub mod memory;

use crate::models::Conversation;
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;
use uuid::Uuid;

pub use memory::InMemoryMembershipStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Unknown id, or a disposed conversation
    #[error("conversation not found")]
    NotFound,

    #[error("user {0} is already a member")]
    AlreadyMember(Uuid),

    #[error("user {0} is not a member")]
    NotMember(Uuid),

    #[error("conversation {0} already exists")]
    Duplicate(Uuid),

    #[error("conversation {0} has no members")]
    Empty(Uuid),

    /// Backend unreachable or timed out; safe to retry
    #[error("membership store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of deleting a membership edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    /// The edge was the last one; the conversation was disposed in the same write
    Disposed,
}

/// Lazy, finite stream of conversation snapshots. Calling the producing method
/// again restarts it from the current state.
pub type ConversationStream = BoxStream<'static, Result<Conversation, StoreError>>;

#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn insert(&self, conversation: Conversation) -> Result<(), StoreError>;

    async fn get_conversation(&self, id: Uuid) -> Result<Conversation, StoreError>;

    fn conversations_of(&self, user_id: Uuid) -> ConversationStream;

    /// Live direct conversation between the two users, if any
    async fn find_direct(&self, a: Uuid, b: Uuid) -> Result<Option<Conversation>, StoreError>;

    async fn add_member(&self, id: Uuid, user_id: Uuid) -> Result<(), StoreError>;

    async fn remove_member(&self, id: Uuid, user_id: Uuid) -> Result<Removal, StoreError>;

    async fn set_name(&self, id: Uuid, name: String) -> Result<(), StoreError>;

    async fn set_photo(&self, id: Uuid, photo: String) -> Result<(), StoreError>;
}
