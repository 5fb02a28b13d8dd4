use std::sync::RwLock;

use anyhow::anyhow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::{
    repo::UserRepository,
    repo_types::{NewUser, StoreError, User},
};

/// Process-local `UserRepository`. Insertion order is storage order.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Other(anyhow!("user store lock poisoned"))
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn save(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().map_err(poisoned)?;
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let mut users = self.users.write().map_err(poisoned)?;
        if users.iter().any(|u| u.email == user.email && u.id != user.id) {
            return Err(StoreError::DuplicateEmail);
        }
        let stored = users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or(StoreError::NotFound)?;
        stored.name = user.name.clone();
        stored.email = user.email.clone();
        stored.password_hash = user.password_hash.clone();
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(stored.clone())
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(poisoned)?;
        let stored = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;
        stored.password_hash = password_hash.to_string();
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().map_err(poisoned)?;
        let skip = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let take = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(users.iter().skip(skip).take(take).cloned().collect())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test".into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn save_rejects_duplicate_email() {
        let repo = InMemoryUserRepository::new();
        repo.save(new_user("a@x.com")).await.expect("first insert");
        let err = repo.save(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_pages_in_insertion_order() {
        let repo = InMemoryUserRepository::new();
        for i in 0..5 {
            repo.save(new_user(&format!("u{i}@x.com"))).await.unwrap();
        }
        let page = repo.list(2, 2).await.unwrap();
        let emails: Vec<_> = page.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, ["u2@x.com", "u3@x.com"]);
        assert!(repo.list(10, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_password_hash_of_unknown_user_is_not_found() {
        let repo = InMemoryUserRepository::new();
        let err = repo
            .update_password_hash(Uuid::new_v4(), "hash")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn update_rejects_email_owned_by_someone_else() {
        let repo = InMemoryUserRepository::new();
        repo.save(new_user("a@x.com")).await.unwrap();
        let mut b = repo.save(new_user("b@x.com")).await.unwrap();
        b.email = "a@x.com".into();
        let err = repo.update(&b).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }
}
