use super::{ConversationStream, MembershipStore, Removal, StoreError};
use crate::models::{Conversation, LifecycleState};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

struct Slot {
    state: LifecycleState,
    snapshot: Arc<Conversation>,
}

#[derive(Default)]
struct Inner {
    conversations: DashMap<Uuid, Slot>,
    /// user id -> conversation ids; secondary index, filtered against snapshots on read
    memberships: DashMap<Uuid, HashSet<Uuid>>,
}

impl Inner {
    fn snapshot(&self, id: Uuid) -> Option<Arc<Conversation>> {
        self.conversations
            .get(&id)
            .filter(|slot| slot.state == LifecycleState::Active)
            .map(|slot| slot.snapshot.clone())
    }

    /// Copy-on-write update of one conversation under its shard lock. A write
    /// that leaves the member set empty disposes the conversation in the same
    /// step, so no reader can observe an empty live conversation.
    fn update<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Conversation) -> Result<T, StoreError>,
    ) -> Result<(T, LifecycleState), StoreError> {
        let mut slot = self.conversations.get_mut(&id).ok_or(StoreError::NotFound)?;
        if slot.state == LifecycleState::Disposed {
            return Err(StoreError::NotFound);
        }

        let mut next = (*slot.snapshot).clone();
        let out = f(&mut next)?;
        next.updated_at = Utc::now();
        if next.members.is_empty() {
            slot.state = LifecycleState::Disposed;
        }
        slot.snapshot = Arc::new(next);
        Ok((out, slot.state))
    }

    fn index(&self, user_id: Uuid, conversation_id: Uuid) {
        self.memberships
            .entry(user_id)
            .or_default()
            .insert(conversation_id);
    }

    fn unindex(&self, user_id: Uuid, conversation_id: Uuid) {
        if let Some(mut ids) = self.memberships.get_mut(&user_id) {
            ids.remove(&conversation_id);
        }
        self.memberships.remove_if(&user_id, |_, ids| ids.is_empty());
    }
}

/// Process-local membership store backed by sharded concurrent maps.
///
/// Disposed conversations stay behind as tombstones so a disposed id can never
/// be resurrected by a late writer.
#[derive(Clone, Default)]
pub struct InMemoryMembershipStore {
    inner: Arc<Inner>,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live conversations
    pub fn active_count(&self) -> usize {
        self.inner
            .conversations
            .iter()
            .filter(|slot| slot.state == LifecycleState::Active)
            .count()
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn insert(&self, conversation: Conversation) -> Result<(), StoreError> {
        if conversation.members.is_empty() {
            return Err(StoreError::Empty(conversation.id));
        }

        let id = conversation.id;
        let members: Vec<Uuid> = conversation.members.iter().copied().collect();
        match self.inner.conversations.entry(id) {
            Entry::Occupied(_) => return Err(StoreError::Duplicate(id)),
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    state: LifecycleState::Active,
                    snapshot: Arc::new(conversation),
                });
            }
        }

        for user_id in members {
            self.inner.index(user_id, id);
        }
        Ok(())
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Conversation, StoreError> {
        self.inner
            .snapshot(id)
            .map(|c| (*c).clone())
            .ok_or(StoreError::NotFound)
    }

    fn conversations_of(&self, user_id: Uuid) -> ConversationStream {
        let inner = self.inner.clone();
        let ids: Vec<Uuid> = inner
            .memberships
            .get(&user_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();

        stream::iter(ids)
            .filter_map(move |id| {
                let inner = inner.clone();
                async move {
                    inner
                        .snapshot(id)
                        .filter(|c| c.is_member(user_id))
                        .map(|c| Ok((*c).clone()))
                }
            })
            .boxed()
    }

    async fn find_direct(&self, a: Uuid, b: Uuid) -> Result<Option<Conversation>, StoreError> {
        let ids: Vec<Uuid> = self
            .inner
            .memberships
            .get(&a)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();

        Ok(ids
            .into_iter()
            .filter_map(|id| self.inner.snapshot(id))
            .find(|c| c.peer_of(a) == Some(b))
            .map(|c| (*c).clone()))
    }

    async fn add_member(&self, id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        self.inner.update(id, |c| {
            if !c.members.insert(user_id) {
                return Err(StoreError::AlreadyMember(user_id));
            }
            Ok(())
        })?;
        self.inner.index(user_id, id);
        Ok(())
    }

    async fn remove_member(&self, id: Uuid, user_id: Uuid) -> Result<Removal, StoreError> {
        let ((), state) = self.inner.update(id, |c| {
            if !c.members.remove(&user_id) {
                return Err(StoreError::NotMember(user_id));
            }
            Ok(())
        })?;
        self.inner.unindex(user_id, id);

        Ok(match state {
            LifecycleState::Active => Removal::Removed,
            LifecycleState::Disposed => Removal::Disposed,
        })
    }

    async fn set_name(&self, id: Uuid, name: String) -> Result<(), StoreError> {
        self.inner.update(id, |c| {
            c.name = Some(name);
            Ok(())
        })?;
        Ok(())
    }

    async fn set_photo(&self, id: Uuid, photo: String) -> Result<(), StoreError> {
        self.inner.update(id, |c| {
            c.photo = Some(photo);
            Ok(())
        })?;
        Ok(())
    }
}
