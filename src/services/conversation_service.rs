//! Conversation operations for an already-resolved actor.
//!
//! Every mutation runs inside the conversation's exclusive section: re-read the
//! conversation, authorize against that snapshot, then write. Reads go straight
//! to the store's published snapshots.

use crate::error::{AppError, AppResult};
use crate::models::Conversation;
use crate::services::authorization::{Action, AuthorizationEngine};
use crate::services::keyed_locks::KeyedLocks;
use crate::services::user_directory::UserDirectory;
use crate::services::validation;
use crate::store::{MembershipStore, Removal, StoreError};
use futures::stream::{BoxStream, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct ConversationLimits {
    pub max_group_name_len: usize,
    pub max_group_members: usize,
}

impl Default for ConversationLimits {
    fn default() -> Self {
        Self {
            max_group_name_len: 255,
            max_group_members: 512,
        }
    }
}

pub struct ConversationService {
    store: Arc<dyn MembershipStore>,
    users: Arc<dyn UserDirectory>,
    engine: AuthorizationEngine,
    limits: ConversationLimits,
    locks: KeyedLocks<Uuid>,
    pair_locks: KeyedLocks<(Uuid, Uuid)>,
}

impl ConversationService {
    pub fn new(
        store: Arc<dyn MembershipStore>,
        users: Arc<dyn UserDirectory>,
        engine: AuthorizationEngine,
        limits: ConversationLimits,
    ) -> Self {
        Self {
            store,
            users,
            engine,
            limits,
            locks: KeyedLocks::new(),
            pair_locks: KeyedLocks::new(),
        }
    }

    /// Full view for a member. Missing ids and non-members are both NotFound.
    pub async fn get_conversation(&self, actor: Uuid, id: Uuid) -> AppResult<Conversation> {
        let conversation = self.store.get_conversation(id).await?;
        self.engine.can_perform(actor, &conversation, Action::View)?;
        Ok(conversation)
    }

    /// The actor's conversations. Lazy and finite; calling again restarts
    /// from the current membership.
    pub fn list_conversations_of_user(
        &self,
        actor: Uuid,
    ) -> BoxStream<'static, AppResult<Conversation>> {
        self.store
            .conversations_of(actor)
            .map(|item| item.map_err(AppError::from))
            .boxed()
    }

    pub async fn rename_conversation(
        &self,
        actor: Uuid,
        id: Uuid,
        name: &str,
    ) -> AppResult<Conversation> {
        let _guard = self.locks.acquire(id).await;
        let conversation = self.store.get_conversation(id).await?;
        self.engine.can_perform(actor, &conversation, Action::Rename)?;

        let name = validation::group_name(name, self.limits.max_group_name_len)?;
        self.store
            .set_name(id, name)
            .await
            .map_err(|e| rejected_after_allow(id, actor, e))?;

        tracing::info!(conversation_id = %id, actor = %actor, "conversation renamed");
        Ok(self.store.get_conversation(id).await?)
    }

    pub async fn rephoto_conversation(
        &self,
        actor: Uuid,
        id: Uuid,
        photo: &str,
    ) -> AppResult<Conversation> {
        let _guard = self.locks.acquire(id).await;
        let conversation = self.store.get_conversation(id).await?;
        self.engine.can_perform(actor, &conversation, Action::Rephoto)?;

        let photo = validation::photo_ref(photo)?;
        self.store
            .set_photo(id, photo)
            .await
            .map_err(|e| rejected_after_allow(id, actor, e))?;

        tracing::info!(conversation_id = %id, actor = %actor, "conversation photo changed");
        Ok(self.store.get_conversation(id).await?)
    }

    pub async fn add_user_to_conversation(
        &self,
        actor: Uuid,
        id: Uuid,
        target: Uuid,
    ) -> AppResult<Conversation> {
        let _guard = self.locks.acquire(id).await;
        let conversation = self.store.get_conversation(id).await?;
        self.engine
            .can_perform(actor, &conversation, Action::AddMember(target))?;

        if !self.users.exists(target).await? {
            return Err(AppError::UserNotFound(target));
        }
        if conversation.member_count() >= self.limits.max_group_members {
            return Err(AppError::BadRequest(format!(
                "group is full ({} members)",
                self.limits.max_group_members
            )));
        }

        self.store
            .add_member(id, target)
            .await
            .map_err(|e| rejected_after_allow(id, actor, e))?;

        tracing::info!(conversation_id = %id, actor = %actor, target = %target, "member added");
        Ok(self.store.get_conversation(id).await?)
    }

    /// The actor leaves. The last member leaving disposes the conversation.
    pub async fn remove_user_from_conversation(&self, actor: Uuid, id: Uuid) -> AppResult<Removal> {
        self.remove(actor, id, actor, Action::Leave).await
    }

    /// Remove `target`, which may be the actor itself, under the configured
    /// removal policy.
    pub async fn remove_member(&self, actor: Uuid, id: Uuid, target: Uuid) -> AppResult<Removal> {
        self.remove(actor, id, target, Action::RemoveMember(target))
            .await
    }

    async fn remove(
        &self,
        actor: Uuid,
        id: Uuid,
        target: Uuid,
        action: Action,
    ) -> AppResult<Removal> {
        let guard = self.locks.acquire(id).await;
        let conversation = self.store.get_conversation(id).await?;
        self.engine.can_perform(actor, &conversation, action)?;

        let removal = self
            .store
            .remove_member(id, target)
            .await
            .map_err(|e| rejected_after_allow(id, actor, e))?;
        drop(guard);

        match removal {
            Removal::Removed => {
                tracing::info!(conversation_id = %id, actor = %actor, target = %target, "member removed");
            }
            Removal::Disposed => {
                tracing::info!(conversation_id = %id, actor = %actor, "last member left, conversation disposed");
            }
        }
        Ok(removal)
    }

    /// Create a group. The actor is always a member; duplicate ids collapse.
    pub async fn create_group(
        &self,
        actor: Uuid,
        name: &str,
        photo: Option<&str>,
        members: impl IntoIterator<Item = Uuid>,
    ) -> AppResult<Conversation> {
        let name = validation::group_name(name, self.limits.max_group_name_len)?;
        let photo = photo.map(validation::photo_ref).transpose()?;

        let mut member_set: BTreeSet<Uuid> = members.into_iter().collect();
        member_set.insert(actor);
        if member_set.len() > self.limits.max_group_members {
            return Err(AppError::BadRequest(format!(
                "a group holds at most {} members",
                self.limits.max_group_members
            )));
        }
        for user_id in &member_set {
            if !self.users.exists(*user_id).await? {
                return Err(AppError::UserNotFound(*user_id));
            }
        }

        let conversation = Conversation::new_group(name, photo, member_set);
        self.store.insert(conversation.clone()).await?;

        tracing::info!(
            conversation_id = %conversation.id,
            actor = %actor,
            member_count = conversation.member_count(),
            "group created"
        );
        Ok(conversation)
    }

    /// Direct conversation with `peer`. An existing live one is returned with
    /// `false`; a new one with `true`.
    pub async fn create_direct(&self, actor: Uuid, peer: Uuid) -> AppResult<(Conversation, bool)> {
        if actor == peer {
            return Err(AppError::BadRequest(
                "cannot start a direct conversation with yourself".into(),
            ));
        }
        if !self.users.exists(peer).await? {
            return Err(AppError::UserNotFound(peer));
        }

        let pair = if actor < peer { (actor, peer) } else { (peer, actor) };
        let _guard = self.pair_locks.acquire(pair).await;

        let result = match self.store.find_direct(actor, peer).await? {
            Some(existing) => (existing, false),
            None => {
                let conversation = Conversation::new_direct(actor, peer);
                self.store.insert(conversation.clone()).await?;
                tracing::info!(conversation_id = %conversation.id, actor = %actor, peer = %peer, "direct conversation created");
                (conversation, true)
            }
        };

        Ok(result)
    }
}

fn rejected_after_allow(id: Uuid, actor: Uuid, e: StoreError) -> AppError {
    match &e {
        StoreError::Unavailable(_) => {
            tracing::error!(conversation_id = %id, actor = %actor, error = %e, "membership store unavailable");
        }
        _ => {
            tracing::warn!(conversation_id = %id, actor = %actor, error = %e, "store rejected an authorized write");
        }
    }
    AppError::from(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::authorization::RemovalPolicy;
    use crate::services::user_directory::InMemoryUserDirectory;
    use crate::store::{ConversationStream, InMemoryMembershipStore};
    use async_trait::async_trait;
    use futures::stream::{self, StreamExt, TryStreamExt};

    struct Fixture {
        service: ConversationService,
        store: InMemoryMembershipStore,
        a: Uuid,
        b: Uuid,
        c: Uuid,
    }

    async fn fixture_with(policy: RemovalPolicy, limits: ConversationLimits) -> Fixture {
        let store = InMemoryMembershipStore::new();
        let users = Arc::new(InMemoryUserDirectory::new());
        let (a, _) = users.find_or_create("alice").await.unwrap();
        let (b, _) = users.find_or_create("bob").await.unwrap();
        let (c, _) = users.find_or_create("carol").await.unwrap();

        let service = ConversationService::new(
            Arc::new(store.clone()),
            users,
            AuthorizationEngine::new(policy),
            limits,
        );
        Fixture {
            service,
            store,
            a: a.id,
            b: b.id,
            c: c.id,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(RemovalPolicy::AnyMember, ConversationLimits::default()).await
    }

    #[tokio::test]
    async fn test_rename_leave_scenario() {
        let f = fixture().await;
        let g = f.service.create_group(f.a, "Weekend", None, [f.b]).await.unwrap();

        f.service.rename_conversation(f.a, g.id, "Trip").await.unwrap();
        let seen_by_b = f.service.get_conversation(f.b, g.id).await.unwrap();
        assert_eq!(seen_by_b.name.as_deref(), Some("Trip"));

        assert_eq!(
            f.service.remove_user_from_conversation(f.b, g.id).await.unwrap(),
            Removal::Removed
        );
        let seen_by_a = f.service.get_conversation(f.a, g.id).await.unwrap();
        assert_eq!(seen_by_a.members.iter().copied().collect::<Vec<_>>(), vec![f.a]);
        assert_eq!(
            f.service.get_conversation(f.b, g.id).await,
            Err(AppError::NotFound)
        );

        assert_eq!(
            f.service.remove_user_from_conversation(f.a, g.id).await.unwrap(),
            Removal::Disposed
        );
        assert_eq!(
            f.service.get_conversation(f.a, g.id).await,
            Err(AppError::NotFound)
        );
        assert_eq!(f.store.active_count(), 0);
    }

    #[tokio::test]
    async fn test_non_member_and_missing_are_indistinguishable() {
        let f = fixture().await;
        let g = f.service.create_group(f.a, "Private", None, []).await.unwrap();

        let hidden = f.service.get_conversation(f.c, g.id).await;
        let missing = f.service.get_conversation(f.c, Uuid::new_v4()).await;
        assert_eq!(hidden, Err(AppError::NotFound));
        assert_eq!(hidden, missing);

        // authorization runs before validation
        assert_eq!(
            f.service.rename_conversation(f.c, g.id, "").await,
            Err(AppError::NotFound)
        );
        assert_eq!(
            f.service.add_user_to_conversation(f.c, g.id, f.c).await,
            Err(AppError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_add_same_target_twice() {
        let f = fixture().await;
        let g = f.service.create_group(f.a, "Team", None, []).await.unwrap();

        let after = f.service.add_user_to_conversation(f.a, g.id, f.b).await.unwrap();
        assert!(after.is_member(f.b));

        assert!(matches!(
            f.service.add_user_to_conversation(f.a, g.id, f.b).await,
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(f.service.get_conversation(f.a, g.id).await.unwrap().member_count(), 2);
    }

    #[tokio::test]
    async fn test_add_unknown_user_and_self() {
        let f = fixture().await;
        let g = f.service.create_group(f.a, "Team", None, []).await.unwrap();

        let stranger = Uuid::new_v4();
        assert_eq!(
            f.service.add_user_to_conversation(f.a, g.id, stranger).await,
            Err(AppError::UserNotFound(stranger))
        );
        assert!(matches!(
            f.service.add_user_to_conversation(f.a, g.id, f.a).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_direct_conversation_is_fixed_and_deduplicated() {
        let f = fixture().await;
        let (direct, created) = f.service.create_direct(f.a, f.b).await.unwrap();
        assert!(created);

        let (again, created) = f.service.create_direct(f.b, f.a).await.unwrap();
        assert!(!created);
        assert_eq!(again.id, direct.id);

        for result in [
            f.service.add_user_to_conversation(f.a, direct.id, f.c).await.map(|_| ()),
            f.service.remove_member(f.a, direct.id, f.b).await.map(|_| ()),
            f.service.remove_user_from_conversation(f.a, direct.id).await.map(|_| ()),
            f.service.rename_conversation(f.a, direct.id, "Us").await.map(|_| ()),
        ] {
            assert!(matches!(result, Err(AppError::BadRequest(_))));
        }
        assert_eq!(f.service.get_conversation(f.b, direct.id).await.unwrap().member_count(), 2);

        assert!(matches!(
            f.service.create_direct(f.a, f.a).await,
            Err(AppError::BadRequest(_))
        ));
        let stranger = Uuid::new_v4();
        assert_eq!(
            f.service.create_direct(f.a, stranger).await,
            Err(AppError::UserNotFound(stranger))
        );
    }

    #[tokio::test]
    async fn test_rename_and_rephoto_validation() {
        let f = fixture().await;
        let g = f.service.create_group(f.a, "Team", None, []).await.unwrap();

        assert!(matches!(
            f.service.rename_conversation(f.a, g.id, "   ").await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            f.service.rephoto_conversation(f.a, g.id, "not a ref").await,
            Err(AppError::BadRequest(_))
        ));

        let updated = f
            .service
            .rephoto_conversation(f.a, g.id, "https://cdn.example.com/team.png")
            .await
            .unwrap();
        assert_eq!(updated.photo.as_deref(), Some("https://cdn.example.com/team.png"));
        assert_eq!(updated.name.as_deref(), Some("Team"));
    }

    #[tokio::test]
    async fn test_self_only_policy_blocks_forcible_removal() {
        let f = fixture_with(RemovalPolicy::SelfOnly, ConversationLimits::default()).await;
        let g = f.service.create_group(f.a, "Team", None, [f.b]).await.unwrap();

        assert!(matches!(
            f.service.remove_member(f.a, g.id, f.b).await,
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(f.service.remove_member(f.b, g.id, f.b).await, Ok(Removal::Removed));
    }

    #[tokio::test]
    async fn test_flat_policy_allows_forcible_removal() {
        let f = fixture().await;
        let g = f.service.create_group(f.a, "Team", None, [f.b, f.c]).await.unwrap();

        assert_eq!(f.service.remove_member(f.b, g.id, f.c).await, Ok(Removal::Removed));
        assert_eq!(
            f.service.get_conversation(f.c, g.id).await,
            Err(AppError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_group_member_cap() {
        let limits = ConversationLimits {
            max_group_name_len: 32,
            max_group_members: 2,
        };
        let f = fixture_with(RemovalPolicy::AnyMember, limits).await;

        assert!(matches!(
            f.service.create_group(f.a, "Big", None, [f.b, f.c]).await,
            Err(AppError::BadRequest(_))
        ));

        let g = f.service.create_group(f.a, "Pair", None, [f.b, f.b]).await.unwrap();
        assert_eq!(g.member_count(), 2);
        assert!(matches!(
            f.service.add_user_to_conversation(f.a, g.id, f.c).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_create_group_rejects_unknown_member() {
        let f = fixture().await;
        let stranger = Uuid::new_v4();
        assert_eq!(
            f.service.create_group(f.a, "Team", None, [stranger]).await,
            Err(AppError::UserNotFound(stranger))
        );
        assert_eq!(f.store.active_count(), 0);
    }

    #[tokio::test]
    async fn test_list_conversations_of_user() {
        let f = fixture().await;
        let g1 = f.service.create_group(f.a, "One", None, [f.b]).await.unwrap();
        let g2 = f.service.create_group(f.a, "Two", None, []).await.unwrap();

        let mut ids: Vec<Uuid> = f
            .service
            .list_conversations_of_user(f.a)
            .map_ok(|c| c.id)
            .try_collect()
            .await
            .unwrap();
        ids.sort();
        let mut expected = vec![g1.id, g2.id];
        expected.sort();
        assert_eq!(ids, expected);

        let for_b: Vec<Conversation> = f
            .service
            .list_conversations_of_user(f.b)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(for_b.len(), 1);
        assert_eq!(for_b[0].id, g1.id);

        f.service.remove_user_from_conversation(f.b, g1.id).await.unwrap();
        let for_b: Vec<Conversation> = f
            .service
            .list_conversations_of_user(f.b)
            .try_collect()
            .await
            .unwrap();
        assert!(for_b.is_empty());
    }

    #[tokio::test]
    async fn test_lock_table_empty_after_missing_ids() {
        let f = fixture().await;

        for _ in 0..100 {
            let missing = Uuid::new_v4();
            assert_eq!(
                f.service.rename_conversation(f.a, missing, "Ghost").await,
                Err(AppError::NotFound)
            );
            assert_eq!(
                f.service.add_user_to_conversation(f.a, missing, f.b).await,
                Err(AppError::NotFound)
            );
            assert_eq!(
                f.service.remove_user_from_conversation(f.a, missing).await,
                Err(AppError::NotFound)
            );
        }
        assert!(f.service.locks.is_empty());
    }

    #[tokio::test]
    async fn test_lock_table_empty_after_mutations() {
        let f = fixture().await;
        let g = f.service.create_group(f.a, "Team", None, []).await.unwrap();

        f.service.rename_conversation(f.a, g.id, "Crew").await.unwrap();
        assert!(f.service.locks.is_empty());

        f.service
            .rephoto_conversation(f.a, g.id, "https://cdn.example.com/crew.png")
            .await
            .unwrap();
        f.service.add_user_to_conversation(f.a, g.id, f.b).await.unwrap();
        assert!(f.service.locks.is_empty());

        // rejected after the section was entered
        assert!(matches!(
            f.service.add_user_to_conversation(f.a, g.id, f.b).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(f.service.locks.is_empty());

        f.service.remove_user_from_conversation(f.b, g.id).await.unwrap();
        assert_eq!(
            f.service.remove_user_from_conversation(f.a, g.id).await,
            Ok(Removal::Disposed)
        );
        assert!(f.service.locks.is_empty());

        f.service.create_direct(f.a, f.c).await.unwrap();
        f.service.create_direct(f.c, f.a).await.unwrap();
        assert!(f.service.pair_locks.is_empty());
    }

    struct UnavailableStore;

    #[async_trait]
    impl MembershipStore for UnavailableStore {
        async fn insert(&self, _: Conversation) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn get_conversation(&self, _: Uuid) -> Result<Conversation, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        fn conversations_of(&self, _: Uuid) -> ConversationStream {
            stream::iter(vec![Err(StoreError::Unavailable("connection refused".into()))]).boxed()
        }
        async fn find_direct(&self, _: Uuid, _: Uuid) -> Result<Option<Conversation>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn add_member(&self, _: Uuid, _: Uuid) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn remove_member(&self, _: Uuid, _: Uuid) -> Result<Removal, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn set_name(&self, _: Uuid, _: String) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn set_photo(&self, _: Uuid, _: String) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_store_outage_is_retryable_unavailable() {
        let users = Arc::new(InMemoryUserDirectory::new());
        let (a, _) = users.find_or_create("alice").await.unwrap();
        let service = ConversationService::new(
            Arc::new(UnavailableStore),
            users,
            AuthorizationEngine::default(),
            ConversationLimits::default(),
        );

        let err = service.get_conversation(a.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));
        assert!(err.is_retryable());

        let listed: Result<Vec<Conversation>, AppError> =
            service.list_conversations_of_user(a.id).try_collect().await;
        assert!(matches!(listed, Err(AppError::ServiceUnavailable(_))));

        assert!(matches!(
            service.remove_user_from_conversation(a.id, Uuid::new_v4()).await,
            Err(AppError::ServiceUnavailable(_))
        ));
    }
}
