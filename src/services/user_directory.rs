//! User profile collaborator: registration by username, lookup, and the
//! self-service profile updates (name, photo).

use crate::error::{AppError, AppResult};
use crate::models::User;
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use uuid::Uuid;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 32;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns the user and whether it was created by this call
    async fn find_or_create(&self, username: &str) -> AppResult<(User, bool)>;

    async fn get(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn exists(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.get(id).await?.is_some())
    }

    /// Case-insensitive prefix search, ordered by username
    async fn search(&self, prefix: &str, limit: usize) -> AppResult<Vec<User>>;

    async fn set_username(&self, id: Uuid, username: &str) -> AppResult<User>;

    async fn set_photo(&self, id: Uuid, photo: String) -> AppResult<User>;
}

/// Letters, digits, `_`, `.` and `-`; length bounded.
pub fn validate_username(username: &str) -> AppResult<()> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(AppError::BadRequest(format!(
            "username must be {}-{} characters",
            USERNAME_MIN_LEN, USERNAME_MAX_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(AppError::BadRequest(
            "username may only contain letters, digits, '_', '.' and '-'".into(),
        ));
    }
    Ok(())
}

/// In-process user directory. Usernames are unique case-insensitively.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<Uuid, User>,
    by_name: DashMap<String, Uuid>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn name_key(username: &str) -> String {
        username.to_lowercase()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_or_create(&self, username: &str) -> AppResult<(User, bool)> {
        validate_username(username)?;

        match self.by_name.entry(Self::name_key(username)) {
            Entry::Occupied(existing) => {
                let id = *existing.get();
                let user = self.users.get(&id).map(|u| u.value().clone()).ok_or(AppError::Internal)?;
                Ok((user, false))
            }
            Entry::Vacant(vacant) => {
                let user = User::new(username.to_string());
                self.users.insert(user.id, user.clone());
                vacant.insert(user.id);
                tracing::info!(user_id = %user.id, username = %user.username, "user registered");
                Ok((user, true))
            }
        }
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn search(&self, prefix: &str, limit: usize) -> AppResult<Vec<User>> {
        let prefix = Self::name_key(prefix.trim());
        let mut found: Vec<User> = self
            .users
            .iter()
            .filter(|u| Self::name_key(&u.username).starts_with(&prefix))
            .map(|u| u.value().clone())
            .collect();
        found.sort_by(|a, b| a.username.cmp(&b.username));
        found.truncate(limit);
        Ok(found)
    }

    async fn set_username(&self, id: Uuid, username: &str) -> AppResult<User> {
        validate_username(username)?;
        let current = self.get(id).await?.ok_or(AppError::UserNotFound(id))?;
        let old_key = Self::name_key(&current.username);
        let new_key = Self::name_key(username);

        if old_key != new_key {
            match self.by_name.entry(new_key) {
                Entry::Occupied(_) => {
                    return Err(AppError::Conflict(format!(
                        "username {} is already taken",
                        username
                    )))
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(id);
                }
            }
            self.by_name.remove_if(&old_key, |_, owner| *owner == id);
        }

        let mut user = self.users.get_mut(&id).ok_or(AppError::UserNotFound(id))?;
        user.username = username.to_string();
        Ok(user.value().clone())
    }

    async fn set_photo(&self, id: Uuid, photo: String) -> AppResult<User> {
        let mut user = self.users.get_mut(&id).ok_or(AppError::UserNotFound(id))?;
        user.photo = Some(photo);
        Ok(user.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_or_create_is_idempotent_per_name() {
        let users = InMemoryUserDirectory::new();
        let (alice, created) = users.find_or_create("alice").await.unwrap();
        assert!(created);

        let (again, created) = users.find_or_create("Alice").await.unwrap();
        assert!(!created);
        assert_eq!(again.id, alice.id);
        assert!(users.exists(alice.id).await.unwrap());
        assert!(!users.exists(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_usernames_rejected() {
        let users = InMemoryUserDirectory::new();
        let too_long = "x".repeat(33);
        for bad in ["ab", "has space", "semi;colon", too_long.as_str()] {
            assert!(matches!(
                users.find_or_create(bad).await,
                Err(AppError::BadRequest(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_rename_frees_old_name_and_rejects_taken() {
        let users = InMemoryUserDirectory::new();
        let (alice, _) = users.find_or_create("alice").await.unwrap();
        users.find_or_create("bob").await.unwrap();

        assert!(matches!(
            users.set_username(alice.id, "BOB").await,
            Err(AppError::Conflict(_))
        ));

        let renamed = users.set_username(alice.id, "alicia").await.unwrap();
        assert_eq!(renamed.username, "alicia");

        let (fresh, created) = users.find_or_create("alice").await.unwrap();
        assert!(created);
        assert_ne!(fresh.id, alice.id);
    }

    #[tokio::test]
    async fn test_search_by_prefix() {
        let users = InMemoryUserDirectory::new();
        for name in ["carol", "carl", "dave"] {
            users.find_or_create(name).await.unwrap();
        }

        let found = users.search("CAR", 10).await.unwrap();
        let names: Vec<&str> = found.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["carl", "carol"]);
        assert_eq!(users.search("", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_set_photo_unknown_user() {
        let users = InMemoryUserDirectory::new();
        let id = Uuid::new_v4();
        assert_eq!(
            users.set_photo(id, "https://cdn/a.png".into()).await,
            Err(AppError::UserNotFound(id))
        );
    }
}
