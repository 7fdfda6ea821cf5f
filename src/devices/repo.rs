use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Device {
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub name: String,
    pub device_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_import_at: OffsetDateTime,
}

impl Device {
    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Device>> {
        let rows = sqlx::query_as::<_, Device>(
            r#"
            SELECT id, user_id, name, device_type, last_import_at
              FROM devices
             WHERE user_id = $1
             ORDER BY last_import_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await
        .context("list devices")?;
        Ok(rows)
    }

    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        name: &str,
        device_type: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Device> {
        let device = sqlx::query_as::<_, Device>(
            r#"
            INSERT INTO devices (user_id, name, device_type, last_import_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, name, device_type, last_import_at
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(device_type)
        .bind(now)
        .fetch_one(db)
        .await
        .context("insert device")?;
        Ok(device)
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<Device>> {
        let device = sqlx::query_as::<_, Device>(
            r#"
            SELECT id, user_id, name, device_type, last_import_at
              FROM devices
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("load device")?;
        Ok(device)
    }

    pub async fn touch(db: &PgPool, id: i64, at: OffsetDateTime) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE devices SET last_import_at = $2 WHERE id = $1"#)
            .bind(id)
            .bind(at)
            .execute(db)
            .await
            .context("touch device")?;
        Ok(())
    }
}
