//! User persistence
//!
//! Handlers talk to [`UserStore`]; `main` decides which implementation backs
//! it. The Postgres store is used whenever `DATABASE_URL` is configured.

use async_trait::async_trait;
use chrono::Utc;
use shared::{NewUser, User, UserChanges, UserCredentials};
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Email already in use")]
    DuplicateEmail,
    #[error("{0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list(&self) -> StoreResult<Vec<User>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// The only lookup that returns the stored password hash
    async fn find_credentials_by_email(&self, email: &str) -> StoreResult<Option<UserCredentials>>;

    async fn insert(&self, user: NewUser) -> StoreResult<User>;

    /// Returns `None` when no user has this id
    async fn update(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>>;

    /// Returns `false` when no user has this id
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;

    async fn set_profile_picture(&self, id: Uuid, locator: Option<String>) -> StoreResult<Option<User>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Postgres
// ─────────────────────────────────────────────────────────────────────────────

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, role, is_active, profile_picture, created_at, updated_at";

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_write_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
        _ => {
            tracing::error!(error = ?err, "user write failed");
            StoreError::Database(err)
        }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn list(&self) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY created_at",
            USER_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_credentials_by_email(&self, email: &str) -> StoreResult<Option<UserCredentials>> {
        let credentials = sqlx::query_as::<_, UserCredentials>(&format!(
            "SELECT {}, password_hash FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(credentials)
    }

    async fn insert(&self, user: NewUser) -> StoreResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, email, password_hash, first_name, last_name, role, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role)
        .bind(user.is_active)
        .fetch_one(&self.db)
        .await
        .map_err(map_write_error)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
                email = COALESCE($2, email), \
                password_hash = COALESCE($3, password_hash), \
                first_name = COALESCE($4, first_name), \
                last_name = COALESCE($5, last_name), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(changes.email)
        .bind(changes.password_hash)
        .bind(changes.first_name)
        .bind(changes.last_name)
        .fetch_optional(&self.db)
        .await
        .map_err(map_write_error)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_profile_picture(&self, id: Uuid, locator: Option<String>) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET profile_picture = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(locator)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory
// ─────────────────────────────────────────────────────────────────────────────

/// Process-local store, used by tests and when no database is configured
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<UserCredentials>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn list(&self) -> StoreResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(users.iter().map(|c| c.user.clone()).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|c| c.user.id == id).map(|c| c.user.clone()))
    }

    async fn find_credentials_by_email(&self, email: &str) -> StoreResult<Option<UserCredentials>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|c| c.user.email == email).cloned())
    }

    async fn insert(&self, user: NewUser) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users.iter().any(|c| c.user.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = Utc::now();
        let record = User {
            id: Uuid::new_v4(),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            is_active: user.is_active,
            profile_picture: None,
            created_at: now,
            updated_at: now,
        };
        users.push(UserCredentials {
            user: record.clone(),
            password_hash: user.password_hash,
        });
        Ok(record)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>> {
        let mut users = self.users.write().await;
        if let Some(email) = &changes.email {
            if users.iter().any(|c| c.user.id != id && &c.user.email == email) {
                return Err(StoreError::DuplicateEmail);
            }
        }
        let Some(record) = users.iter_mut().find(|c| c.user.id == id) else {
            return Ok(None);
        };
        if let Some(email) = changes.email {
            record.user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            record.password_hash = hash;
        }
        if let Some(first_name) = changes.first_name {
            record.user.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            record.user.last_name = last_name;
        }
        record.user.updated_at = Utc::now();
        Ok(Some(record.user.clone()))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|c| c.user.id != id);
        Ok(users.len() < before)
    }

    async fn set_profile_picture(&self, id: Uuid, locator: Option<String>) -> StoreResult<Option<User>> {
        let mut users = self.users.write().await;
        let Some(record) = users.iter_mut().find(|c| c.user.id == id) else {
            return Ok(None);
        };
        record.user.profile_picture = locator;
        record.user.updated_at = Utc::now();
        Ok(Some(record.user.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Role;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            role: Role::User,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn insert_then_lookup() {
        let store = InMemoryUserStore::new();
        let user = store.insert(new_user("a@b.com")).await.unwrap();

        assert_eq!(store.find_by_id(user.id).await.unwrap(), Some(user.clone()));
        let creds = store
            .find_credentials_by_email("a@b.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(creds.password_hash, "hash");
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = InMemoryUserStore::new();
        store.insert(new_user("a@b.com")).await.unwrap();
        let other = store.insert(new_user("c@d.com")).await.unwrap();

        assert!(matches!(
            store.insert(new_user("a@b.com")).await,
            Err(StoreError::DuplicateEmail)
        ));
        let changes = UserChanges {
            email: Some("a@b.com".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            store.update(other.id, changes).await,
            Err(StoreError::DuplicateEmail)
        ));
    }

    #[tokio::test]
    async fn update_touches_only_given_fields() {
        let store = InMemoryUserStore::new();
        let user = store.insert(new_user("a@b.com")).await.unwrap();
        let changes = UserChanges {
            last_name: Some("Smith".to_string()),
            ..Default::default()
        };
        let updated = store.update(user.id, changes).await.unwrap().unwrap();
        assert_eq!(updated.last_name, "Smith");
        assert_eq!(updated.first_name, "John");
        assert!(store
            .update(Uuid::new_v4(), UserChanges::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn delete_and_picture() {
        let store = InMemoryUserStore::new();
        let user = store.insert(new_user("a@b.com")).await.unwrap();

        let with_picture = store
            .set_profile_picture(user.id, Some("https://cdn/x.png".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(with_picture.profile_picture.as_deref(), Some("https://cdn/x.png"));

        assert!(store.delete(user.id).await.unwrap());
        assert!(!store.delete(user.id).await.unwrap());
        assert!(store.find_by_id(user.id).await.unwrap().is_none());
    }
}
