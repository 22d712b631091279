//! User directory: `username -> {language, online, profile}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::{Database, StoreError};

const USER_COLUMNS: &str = "id,username,language,online,phone,email,profile_picture_url";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub language: String,
    pub online: bool,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub profile_picture_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub language: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl NewUser {
    pub fn new(username: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            language: language.into(),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn lookup(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the username, phone or email is taken.
    async fn register(&self, user: NewUser) -> Result<User, StoreError>;

    /// All users ordered by id, optionally leaving one out.
    async fn list(&self, exclude: Option<&str>) -> Result<Vec<User>, StoreError>;

    async fn set_online(&self, username: &str, online: bool) -> Result<(), StoreError>;

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError>;
}

#[async_trait]
impl UserDirectory for Database {
    async fn lookup(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE username=?"))
                .bind(username)
                .fetch_optional(self.pool())
                .await?
        )
    }

    async fn register(&self, user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as(&format!(
            "INSERT INTO users (username,language,online,phone,email) VALUES (?,?,0,?,?) RETURNING {USER_COLUMNS}"
        ))
            .bind(&user.username)
            .bind(&user.language)
            .bind(&user.phone)
            .bind(&user.email)
            .fetch_one(self.pool())
            .await
            .map_err(conflict_or_query)
    }

    async fn list(&self, exclude: Option<&str>) -> Result<Vec<User>, StoreError> {
        Ok(
            sqlx::query_as(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE ? IS NULL OR username<>? ORDER BY id"
            ))
                .bind(exclude)
                .bind(exclude)
                .fetch_all(self.pool())
                .await?
        )
    }

    async fn set_online(&self, username: &str, online: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET online=? WHERE username=?")
            .bind(online)
            .bind(username)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError> {
        Ok(
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE phone=?"))
                .bind(phone)
                .fetch_optional(self.pool())
                .await?
        )
    }
}

fn conflict_or_query(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let what = match db.message() {
                m if m.contains("users.phone") => "Phone number",
                m if m.contains("users.email") => "Email",
                _ => "Username",
            };
            return StoreError::Conflict(what.to_owned());
        }
    }
    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn register_and_lookup() {
        let db = test_db().await;
        let user = db.register(NewUser::new("amina", "sw")).await.unwrap();

        assert_eq!(user.username, "amina");
        assert_eq!(user.language, "sw");
        assert!(!user.online);

        let found = db.lookup("amina").await.unwrap().unwrap();
        assert_eq!(found, user);
        assert!(db.lookup("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let db = test_db().await;
        db.register(NewUser::new("amina", "sw")).await.unwrap();

        let err = db.register(NewUser::new("amina", "en")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref what) if what == "Username"), "{err:?}");
        assert_eq!(err.to_string(), "Username already exists");
    }

    #[tokio::test]
    async fn duplicate_phone_is_a_conflict() {
        let db = test_db().await;
        let mut first = NewUser::new("amina", "sw");
        first.phone = Some("+255700000001".into());
        db.register(first).await.unwrap();

        let mut second = NewUser::new("baraka", "sw");
        second.phone = Some("+255700000001".into());
        let err = db.register(second).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref what) if what == "Phone number"), "{err:?}");
    }

    #[tokio::test]
    async fn list_excludes_current_user() {
        let db = test_db().await;
        db.register(NewUser::new("amina", "sw")).await.unwrap();
        db.register(NewUser::new("ben", "en")).await.unwrap();
        db.register(NewUser::new("chala", "am")).await.unwrap();

        let all = db.list(None).await.unwrap();
        assert_eq!(all.len(), 3);

        let others: Vec<_> = db
            .list(Some("ben"))
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(others, ["amina", "chala"]);
    }

    #[tokio::test]
    async fn set_online_and_find_by_phone() {
        let db = test_db().await;
        let mut user = NewUser::new("amina", "sw");
        user.phone = Some("+255700000001".into());
        user.email = Some("amina@example.com".into());
        db.register(user).await.unwrap();

        db.set_online("amina", true).await.unwrap();
        let found = db.find_by_phone("+255700000001").await.unwrap().unwrap();
        assert_eq!(found.username, "amina");
        assert!(found.online);
        assert_eq!(found.email.as_deref(), Some("amina@example.com"));

        assert!(db.find_by_phone("+1555").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reopening_a_database_clears_presence() {
        let path = std::env::temp_dir().join(format!("soultalk-{}.db", uuid::Uuid::now_v7()));

        let db = Database::open(&path).await.unwrap();
        db.register(NewUser::new("amina", "sw")).await.unwrap();
        db.set_online("amina", true).await.unwrap();
        db.pool().close().await;

        let db = Database::open(&path).await.unwrap();
        assert!(!db.lookup("amina").await.unwrap().unwrap().online);
        db.pool().close().await;

        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }
}
