use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

/// One imported hour: the activity row plus its stand-up and movement counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourRecord {
    pub recorded_at: OffsetDateTime,
    pub steps: i32,
    pub calories: f64,
    pub distance: f64,
    pub standups: i32,
    pub movements: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Steps,
    Calories,
    Distance,
    StandUps,
    Movements,
}

impl Metric {
    fn series_sql(self) -> &'static str {
        match self {
            Metric::Steps => {
                r#"
                SELECT recorded_at, steps::float8
                  FROM activities
                 WHERE user_id = $1 AND recorded_at >= $2 AND recorded_at <= $3
                 ORDER BY recorded_at
                "#
            }
            Metric::Calories => {
                r#"
                SELECT recorded_at, calories
                  FROM activities
                 WHERE user_id = $1 AND recorded_at >= $2 AND recorded_at <= $3
                 ORDER BY recorded_at
                "#
            }
            Metric::Distance => {
                r#"
                SELECT recorded_at, distance
                  FROM activities
                 WHERE user_id = $1 AND recorded_at >= $2 AND recorded_at <= $3
                 ORDER BY recorded_at
                "#
            }
            Metric::StandUps => {
                r#"
                SELECT recorded_at, count::float8
                  FROM standups
                 WHERE user_id = $1 AND recorded_at >= $2 AND recorded_at <= $3
                 ORDER BY recorded_at
                "#
            }
            Metric::Movements => {
                r#"
                SELECT recorded_at, count::float8
                  FROM movements
                 WHERE user_id = $1 AND recorded_at >= $2 AND recorded_at <= $3
                 ORDER BY recorded_at
                "#
            }
        }
    }
}

/// Lifetime sums shown on the profile page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub steps: i64,
    pub calories: f64,
    pub distance: f64,
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn has_device(&self, user_id: Uuid) -> anyhow::Result<bool>;

    /// Sets `last_import_at` on every device of the user. Returns rows touched.
    async fn touch_devices(&self, user_id: Uuid, at: OffsetDateTime) -> anyhow::Result<u64>;

    /// Inserts the activity, stand-up and movement rows for one hour unless any
    /// of the three already exists for `(user_id, recorded_at)`. All or nothing.
    async fn insert_hour_if_absent(&self, user_id: Uuid, record: &HourRecord)
        -> anyhow::Result<bool>;

    /// Points of `metric` with `from <= recorded_at <= to`, oldest first.
    async fn series(
        &self,
        user_id: Uuid,
        metric: Metric,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> anyhow::Result<Vec<(OffsetDateTime, f64)>>;

    async fn totals(&self, user_id: Uuid) -> anyhow::Result<Totals>;
}

#[derive(Clone)]
pub struct PgActivityStore {
    db: PgPool,
}

impl PgActivityStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ActivityStore for PgActivityStore {
    async fn has_device(&self, user_id: Uuid) -> anyhow::Result<bool> {
        let exists: bool =
            sqlx::query_scalar(r#"SELECT EXISTS(SELECT 1 FROM devices WHERE user_id = $1)"#)
                .bind(user_id)
                .fetch_one(&self.db)
                .await
                .context("check user devices")?;
        Ok(exists)
    }

    async fn touch_devices(&self, user_id: Uuid, at: OffsetDateTime) -> anyhow::Result<u64> {
        let res = sqlx::query(r#"UPDATE devices SET last_import_at = $2 WHERE user_id = $1"#)
            .bind(user_id)
            .bind(at)
            .execute(&self.db)
            .await
            .context("touch devices")?;
        Ok(res.rows_affected())
    }

    async fn insert_hour_if_absent(
        &self,
        user_id: Uuid,
        record: &HourRecord,
    ) -> anyhow::Result<bool> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(SELECT 1 FROM activities WHERE user_id = $1 AND recorded_at = $2)
                OR EXISTS(SELECT 1 FROM standups   WHERE user_id = $1 AND recorded_at = $2)
                OR EXISTS(SELECT 1 FROM movements  WHERE user_id = $1 AND recorded_at = $2)
            "#,
        )
        .bind(user_id)
        .bind(record.recorded_at)
        .fetch_one(&mut *tx)
        .await
        .context("check existing hour")?;
        if exists {
            tx.rollback().await.context("rollback tx")?;
            return Ok(false);
        }

        // A concurrent import may have won the race since the check.
        let inserted = sqlx::query(
            r#"
            INSERT INTO activities (user_id, recorded_at, steps, calories, distance)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, recorded_at) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(record.recorded_at)
        .bind(record.steps)
        .bind(record.calories)
        .bind(record.distance)
        .execute(&mut *tx)
        .await
        .context("insert activity")?
        .rows_affected();
        if inserted == 0 {
            tx.rollback().await.context("rollback tx")?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO standups (user_id, recorded_at, count)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, recorded_at) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(record.recorded_at)
        .bind(record.standups)
        .execute(&mut *tx)
        .await
        .context("insert standup")?;

        sqlx::query(
            r#"
            INSERT INTO movements (user_id, recorded_at, count)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, recorded_at) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(record.recorded_at)
        .bind(record.movements)
        .execute(&mut *tx)
        .await
        .context("insert movement")?;

        tx.commit().await.context("commit tx")?;
        Ok(true)
    }

    async fn series(
        &self,
        user_id: Uuid,
        metric: Metric,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> anyhow::Result<Vec<(OffsetDateTime, f64)>> {
        let rows = sqlx::query_as::<_, (OffsetDateTime, f64)>(metric.series_sql())
            .bind(user_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.db)
            .await
            .with_context(|| format!("load {:?} series", metric))?;
        Ok(rows)
    }

    async fn totals(&self, user_id: Uuid) -> anyhow::Result<Totals> {
        let (steps, calories, distance) = sqlx::query_as::<_, (i64, f64, f64)>(
            r#"
            SELECT COALESCE(SUM(steps), 0)::int8,
                   COALESCE(SUM(calories), 0)::float8,
                   COALESCE(SUM(distance), 0)::float8
              FROM activities
             WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await
        .context("sum activity totals")?;
        Ok(Totals {
            steps,
            calories,
            distance,
        })
    }
}
