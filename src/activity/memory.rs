use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::store::{ActivityStore, HourRecord, Metric, Totals};

/// In-process [`ActivityStore`] for tests.
#[derive(Default)]
pub struct MemoryActivityStore {
    devices: Mutex<HashMap<Uuid, Vec<Option<OffsetDateTime>>>>,
    hours: Mutex<BTreeMap<(Uuid, OffsetDateTime), HourRecord>>,
}

impl MemoryActivityStore {
    pub fn add_device(&self, user_id: Uuid) {
        self.devices.lock().unwrap().entry(user_id).or_default().push(None);
    }

    pub fn insert(&self, user_id: Uuid, record: HourRecord) {
        self.hours
            .lock()
            .unwrap()
            .insert((user_id, record.recorded_at), record);
    }

    pub fn records(&self, user_id: Uuid) -> Vec<HourRecord> {
        self.hours
            .lock()
            .unwrap()
            .iter()
            .filter(|((u, _), _)| *u == user_id)
            .map(|(_, r)| *r)
            .collect()
    }

    pub fn last_imports(&self, user_id: Uuid) -> Vec<Option<OffsetDateTime>> {
        self.devices
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ActivityStore for MemoryActivityStore {
    async fn has_device(&self, user_id: Uuid) -> anyhow::Result<bool> {
        Ok(self
            .devices
            .lock()
            .unwrap()
            .get(&user_id)
            .is_some_and(|d| !d.is_empty()))
    }

    async fn touch_devices(&self, user_id: Uuid, at: OffsetDateTime) -> anyhow::Result<u64> {
        let mut devices = self.devices.lock().unwrap();
        let Some(list) = devices.get_mut(&user_id) else {
            return Ok(0);
        };
        for slot in list.iter_mut() {
            *slot = Some(at);
        }
        Ok(list.len() as u64)
    }

    async fn insert_hour_if_absent(
        &self,
        user_id: Uuid,
        record: &HourRecord,
    ) -> anyhow::Result<bool> {
        let mut hours = self.hours.lock().unwrap();
        let key = (user_id, record.recorded_at);
        if hours.contains_key(&key) {
            return Ok(false);
        }
        hours.insert(key, *record);
        Ok(true)
    }

    async fn series(
        &self,
        user_id: Uuid,
        metric: Metric,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> anyhow::Result<Vec<(OffsetDateTime, f64)>> {
        Ok(self
            .hours
            .lock()
            .unwrap()
            .range((user_id, from)..=(user_id, to))
            .map(|((_, at), r)| {
                let value = match metric {
                    Metric::Steps => r.steps as f64,
                    Metric::Calories => r.calories,
                    Metric::Distance => r.distance,
                    Metric::StandUps => r.standups as f64,
                    Metric::Movements => r.movements as f64,
                };
                (*at, value)
            })
            .collect())
    }

    async fn totals(&self, user_id: Uuid) -> anyhow::Result<Totals> {
        Ok(self
            .records(user_id)
            .iter()
            .fold(Totals::default(), |acc, r| Totals {
                steps: acc.steps + r.steps as i64,
                calories: acc.calories + r.calories,
                distance: acc.distance + r.distance,
            }))
    }
}
