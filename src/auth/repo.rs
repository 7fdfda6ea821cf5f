use crate::auth::repo_types::User;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

impl User {
    /// Find a user by username.
    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, token_version, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, token_version, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// True when `username` belongs to someone other than `except`.
    pub async fn username_taken(
        db: &PgPool,
        username: &str,
        except: Option<Uuid>,
    ) -> anyhow::Result<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM users
                 WHERE username = $1 AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(username)
        .bind(except)
        .fetch_one(db)
        .await?;
        Ok(taken)
    }

    /// Create a new user with hashed password inside the caller's transaction.
    pub async fn create_tx(
        tx: &mut Transaction<'_, Postgres>,
        username: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash)
            VALUES ($1, $2)
            RETURNING id, username, password_hash, token_version, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&mut **tx)
        .await?;
        Ok(user)
    }

    pub async fn rename_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        username: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE users SET username = $2 WHERE id = $1"#)
            .bind(id)
            .bind(username)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Invalidates every refresh token issued so far.
    pub async fn bump_token_version(db: &PgPool, id: Uuid) -> anyhow::Result<i32> {
        let ver: i32 = sqlx::query_scalar(
            r#"
            UPDATE users SET token_version = token_version + 1
            WHERE id = $1
            RETURNING token_version
            "#,
        )
        .bind(id)
        .fetch_one(db)
        .await?;
        Ok(ver)
    }
}
