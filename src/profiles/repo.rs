use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::{NewProfile, Profile};

impl Profile {
    pub async fn create_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        fields: &NewProfile,
    ) -> anyhow::Result<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (user_id, gender, birthdate, phone, email)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING gender, birthdate, phone, email, image_key
            "#,
        )
        .bind(user_id)
        .bind(&fields.gender)
        .bind(fields.birthdate)
        .bind(&fields.phone)
        .bind(&fields.email)
        .fetch_one(&mut **tx)
        .await
        .context("insert profile")?;
        Ok(profile)
    }

    pub async fn find_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT gender, birthdate, phone, email, image_key
              FROM profiles
             WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("load profile")?;
        Ok(profile)
    }

    pub async fn update_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        fields: &NewProfile,
    ) -> anyhow::Result<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
               SET gender = $2, birthdate = $3, phone = $4, email = $5
             WHERE user_id = $1
            RETURNING gender, birthdate, phone, email, image_key
            "#,
        )
        .bind(user_id)
        .bind(&fields.gender)
        .bind(fields.birthdate)
        .bind(&fields.phone)
        .bind(&fields.email)
        .fetch_one(&mut **tx)
        .await
        .context("update profile")?;
        Ok(profile)
    }

    /// Stores the new image key and returns the one it replaced.
    pub async fn replace_image_key(
        db: &PgPool,
        user_id: Uuid,
        key: &str,
    ) -> anyhow::Result<Option<String>> {
        let mut tx = db.begin().await.context("begin tx")?;
        let previous: Option<String> = sqlx::query_scalar(
            r#"SELECT image_key FROM profiles WHERE user_id = $1 FOR UPDATE"#,
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .context("lock profile")?;

        sqlx::query(r#"UPDATE profiles SET image_key = $2 WHERE user_id = $1"#)
            .bind(user_id)
            .bind(key)
            .execute(&mut *tx)
            .await
            .context("replace profile image")?;
        tx.commit().await.context("commit tx")?;
        Ok(previous)
    }
}
