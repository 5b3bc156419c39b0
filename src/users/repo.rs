use anyhow::Context;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String, // Argon2 hash
    pub confirmed: bool,
    pub avatar_key: Option<String>, // object key in avatar storage
    pub refresh_token: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

/// The part of a user that authenticated requests carry around. Holds no
/// credentials, so it is safe to keep in the identity cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub confirmed: bool,
    pub avatar_key: Option<String>,
    pub created_at: OffsetDateTime,
}

impl From<&User> for Identity {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
            confirmed: u.confirmed,
            avatar_key: u.avatar_key.clone(),
            created_at: u.created_at,
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    /// Returns `None` when the email is already registered.
    async fn create(&self, new: NewUser<'_>) -> anyhow::Result<Option<User>>;
    async fn update_token(&self, id: Uuid, token: Option<&str>) -> anyhow::Result<()>;
    /// Replaces the stored refresh token only if it still equals `current`.
    /// Returns `false` when another writer got there first.
    async fn swap_token(&self, id: Uuid, current: &str, next: &str) -> anyhow::Result<bool>;
    /// Returns `false` when no such user exists.
    async fn confirm_email(&self, id: Uuid) -> anyhow::Result<bool>;
    async fn update_avatar(&self, id: Uuid, key: &str) -> anyhow::Result<Option<User>>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, confirmed, avatar_key, refresh_token, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, confirmed, avatar_key, refresh_token, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn create(&self, new: NewUser<'_>) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, username, email, password_hash, confirmed, avatar_key, refresh_token, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.username)
        .bind(new.email)
        .bind(new.password_hash)
        .fetch_optional(&self.db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    async fn update_token(&self, id: Uuid, token: Option<&str>) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE users SET refresh_token = $2 WHERE id = $1"#)
            .bind(id)
            .bind(token)
            .execute(&self.db)
            .await
            .context("update refresh token")?;
        Ok(())
    }

    async fn swap_token(&self, id: Uuid, current: &str, next: &str) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"UPDATE users SET refresh_token = $3 WHERE id = $1 AND refresh_token = $2"#,
        )
        .bind(id)
        .bind(current)
        .bind(next)
        .execute(&self.db)
        .await
        .context("swap refresh token")?;
        Ok(res.rows_affected() == 1)
    }

    async fn confirm_email(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(r#"UPDATE users SET confirmed = TRUE WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await
            .context("confirm email")?;
        Ok(res.rows_affected() > 0)
    }

    async fn update_avatar(&self, id: Uuid, key: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET avatar_key = $2
            WHERE id = $1
            RETURNING id, username, email, password_hash, confirmed, avatar_key, refresh_token, created_at
            "#,
        )
        .bind(id)
        .bind(key)
        .fetch_optional(&self.db)
        .await
        .context("update avatar")?;
        Ok(user)
    }
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryUserStore;
    use super::*;

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let store = MemoryUserStore::default();
        let new = NewUser {
            username: "debik",
            email: "debik228@gmail.com",
            password_hash: "hash",
        };
        let first = store.create(new).await.unwrap().expect("first insert");
        assert!(!first.confirmed);
        assert!(store.create(new).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn confirm_email_flips_flag() {
        let store = MemoryUserStore::default();
        let user = store
            .create(NewUser {
                username: "debik",
                email: "debik228@gmail.com",
                password_hash: "hash",
            })
            .await
            .unwrap()
            .unwrap();
        assert!(store.confirm_email(user.id).await.unwrap());
        let found = store.find_by_email("debik228@gmail.com").await.unwrap().unwrap();
        assert!(found.confirmed);
        assert!(!store.confirm_email(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn swap_token_only_replaces_current_value() {
        let store = MemoryUserStore::default();
        let user = store.insert_confirmed("debik", "debik228@gmail.com", "hash").await;
        store.update_token(user.id, Some("r1")).await.unwrap();

        assert!(store.swap_token(user.id, "r1", "r2").await.unwrap());
        assert!(!store.swap_token(user.id, "r1", "r3").await.unwrap());
        let found = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.refresh_token.as_deref(), Some("r2"));
        assert!(!store.swap_token(Uuid::new_v4(), "r2", "r3").await.unwrap());
    }
}
