//! Idempotent import of generated batches into per-hour records.

use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use time::{format_description::FormatItem, macros::format_description, PrimitiveDateTime};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::generator::{read_artifact, ActivityBatch, HourlySample, STAMP_FORMAT};
use super::store::{ActivityStore, HourRecord};

const SAMPLE_MINUTE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportOutcome {
    /// The user has no registered device; nothing was written.
    NoDevice,
    Imported { inserted: usize, skipped: usize },
}

impl ImportOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ImportOutcome::Imported { .. })
    }
}

/// Sample dates carry minute precision and are stored as UTC.
pub fn parse_sample_time(date: &str) -> anyhow::Result<time::OffsetDateTime> {
    let parsed = PrimitiveDateTime::parse(date, SAMPLE_MINUTE_FORMAT)
        .with_context(|| format!("invalid sample date {:?}", date))?;
    Ok(parsed.assume_utc())
}

pub fn to_record(sample: &HourlySample) -> anyhow::Result<HourRecord> {
    Ok(HourRecord {
        recorded_at: parse_sample_time(&sample.date)?,
        steps: sample.steps,
        calories: sample.calories,
        distance: sample.distance,
        standups: sample.standups,
        movements: sample.movements,
    })
}

#[instrument(skip(store, batch), fields(device = %batch.device_name))]
pub async fn process_batch(
    store: &dyn ActivityStore,
    user_id: Uuid,
    batch: &ActivityBatch,
) -> anyhow::Result<ImportOutcome> {
    if !store.has_device(user_id).await? {
        warn!(%user_id, "import skipped, user has no device");
        return Ok(ImportOutcome::NoDevice);
    }

    let mut inserted = 0;
    let mut skipped = 0;
    for sample in &batch.activities {
        let record = to_record(sample)?;
        if store.insert_hour_if_absent(user_id, &record).await? {
            inserted += 1;
        } else {
            debug!(%user_id, at = %record.recorded_at, "hour already imported");
            skipped += 1;
        }
    }

    info!(%user_id, inserted, skipped, "activity batch imported");
    Ok(ImportOutcome::Imported { inserted, skipped })
}

/// Imports a JSON artifact written by the generator. `stamp` is the
/// generation stamp returned alongside it.
#[instrument(skip(store, path), fields(path = %path.display()))]
pub async fn process_artifact(
    store: &dyn ActivityStore,
    path: &Path,
    user_id: Uuid,
    stamp: &str,
) -> anyhow::Result<ImportOutcome> {
    if !store.has_device(user_id).await? {
        warn!(%user_id, "import skipped, user has no device");
        return Ok(ImportOutcome::NoDevice);
    }
    let generated_at = PrimitiveDateTime::parse(stamp, STAMP_FORMAT)
        .with_context(|| format!("invalid generation stamp {:?}", stamp))?;
    debug!(%generated_at, "loading artifact");

    let batch = read_artifact(path).await?;
    process_batch(store, user_id, &batch).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::generator::{generate, write_artifact};
    use crate::activity::memory::MemoryActivityStore;
    use time::macros::datetime;

    fn sample(date: &str) -> HourlySample {
        HourlySample {
            date: date.into(),
            steps: 100,
            standups: 2,
            movements: 5,
            calories: 20.5,
            distance: 0.3,
        }
    }

    fn batch(samples: Vec<HourlySample>) -> ActivityBatch {
        ActivityBatch {
            device_name: "band".into(),
            device_type: "wrist".into(),
            activities: samples,
        }
    }

    #[tokio::test]
    async fn single_sample_creates_all_three_records() {
        let store = MemoryActivityStore::default();
        let user = Uuid::new_v4();
        store.add_device(user);

        let outcome = process_batch(&store, user, &batch(vec![sample("2024-01-01 03:00")]))
            .await
            .unwrap();
        assert_eq!(outcome, ImportOutcome::Imported { inserted: 1, skipped: 0 });

        let records = store.records(user);
        assert_eq!(
            records,
            vec![HourRecord {
                recorded_at: datetime!(2024-01-01 03:00 UTC),
                steps: 100,
                calories: 20.5,
                distance: 0.3,
                standups: 2,
                movements: 5,
            }]
        );
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let store = MemoryActivityStore::default();
        let user = Uuid::new_v4();
        store.add_device(user);
        let generated = generate("band", "wrist", datetime!(2024-01-01 12:10 UTC)).unwrap();

        let first = process_batch(&store, user, &generated.batch).await.unwrap();
        assert_eq!(first, ImportOutcome::Imported { inserted: 24, skipped: 0 });
        let snapshot = store.records(user);

        let second = process_batch(&store, user, &generated.batch).await.unwrap();
        assert_eq!(second, ImportOutcome::Imported { inserted: 0, skipped: 24 });
        assert_eq!(store.records(user), snapshot);
    }

    #[tokio::test]
    async fn overlapping_batches_only_add_new_hours() {
        let store = MemoryActivityStore::default();
        let user = Uuid::new_v4();
        store.add_device(user);

        let morning = generate("band", "wrist", datetime!(2024-01-01 09:30 UTC)).unwrap();
        let noon = generate("band", "wrist", datetime!(2024-01-01 12:30 UTC)).unwrap();
        process_batch(&store, user, &morning.batch).await.unwrap();
        let outcome = process_batch(&store, user, &noon.batch).await.unwrap();

        assert_eq!(outcome, ImportOutcome::Imported { inserted: 3, skipped: 21 });
        assert_eq!(store.records(user).len(), 27);
    }

    #[tokio::test]
    async fn user_without_device_gets_nothing() {
        let store = MemoryActivityStore::default();
        let user = Uuid::new_v4();
        store.add_device(Uuid::new_v4());

        let outcome = process_batch(&store, user, &batch(vec![sample("2024-01-01 03:00")]))
            .await
            .unwrap();
        assert_eq!(outcome, ImportOutcome::NoDevice);
        assert!(!outcome.is_success());
        assert!(store.records(user).is_empty());
    }

    #[tokio::test]
    async fn malformed_date_is_an_error() {
        let store = MemoryActivityStore::default();
        let user = Uuid::new_v4();
        store.add_device(user);

        let err = process_batch(&store, user, &batch(vec![sample("01/01/2024 3am")]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid sample date"));
    }

    #[tokio::test]
    async fn artifact_import_matches_in_memory_import() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryActivityStore::default();
        let user = Uuid::new_v4();
        store.add_device(user);

        let generated = generate("band", "wrist", datetime!(2024-01-01 12:10 UTC)).unwrap();
        let path = write_artifact(dir.path(), "alice", &generated).await.unwrap();

        let outcome = process_artifact(&store, &path, user, &generated.stamp)
            .await
            .unwrap();
        assert_eq!(outcome, ImportOutcome::Imported { inserted: 24, skipped: 0 });

        let again = process_batch(&store, user, &generated.batch).await.unwrap();
        assert_eq!(again, ImportOutcome::Imported { inserted: 0, skipped: 24 });
    }

    #[tokio::test]
    async fn artifact_without_device_is_not_read() {
        let store = MemoryActivityStore::default();
        let outcome = process_artifact(
            &store,
            Path::new("/definitely/missing.json"),
            Uuid::new_v4(),
            "20240101_1210",
        )
        .await
        .unwrap();
        assert_eq!(outcome, ImportOutcome::NoDevice);
    }

    #[tokio::test]
    async fn broken_artifact_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice_20240101_1210.json");
        std::fs::write(&path, b"{not json").unwrap();
        let store = MemoryActivityStore::default();
        let user = Uuid::new_v4();
        store.add_device(user);

        assert!(process_artifact(&store, &path, user, "20240101_1210")
            .await
            .is_err());
    }
}
