//! Synthetic device data: 24 hourly samples ending at the current hour.

use std::path::{Path, PathBuf};

use anyhow::Context;
use rand::Rng;
use serde::{Deserialize, Serialize};
use time::{format_description::FormatItem, macros::format_description, Duration, OffsetDateTime};
use tracing::debug;

pub const HOURS_PER_BATCH: i64 = 24;

/// `date` field of a sample, always stamped to the top of the hour.
pub const SAMPLE_HOUR_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:00");

/// Generation stamp used in artifact names.
pub const STAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year][month][day]_[hour][minute]");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlySample {
    pub date: String,
    pub steps: i32,
    pub standups: i32,
    pub movements: i32,
    pub calories: f64,
    pub distance: f64,
}

/// What a device hands over on sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityBatch {
    pub device_name: String,
    pub device_type: String,
    pub activities: Vec<HourlySample>,
}

#[derive(Debug, Clone)]
pub struct GeneratedBatch {
    pub batch: ActivityBatch,
    pub stamp: String,
}

pub fn generate(
    device_name: &str,
    device_type: &str,
    now: OffsetDateTime,
) -> anyhow::Result<GeneratedBatch> {
    generate_with(&mut rand::thread_rng(), device_name, device_type, now)
}

pub fn generate_with<R: Rng + ?Sized>(
    rng: &mut R,
    device_name: &str,
    device_type: &str,
    now: OffsetDateTime,
) -> anyhow::Result<GeneratedBatch> {
    let mut activities = Vec::with_capacity(HOURS_PER_BATCH as usize);
    for hour in 0..HOURS_PER_BATCH {
        let hour_time = now - Duration::hours(hour);
        activities.push(HourlySample {
            date: hour_time
                .format(SAMPLE_HOUR_FORMAT)
                .context("format sample hour")?,
            steps: rng.gen_range(0..=500),
            standups: rng.gen_range(0..=4),
            movements: rng.gen_range(0..=10),
            calories: round2(rng.gen_range(5.0..=100.0)),
            distance: round2(rng.gen_range(0.05..=1.5)),
        });
    }

    let stamp = now.format(STAMP_FORMAT).context("format generation stamp")?;
    debug!(device_name, device_type, %stamp, "activity batch generated");

    Ok(GeneratedBatch {
        batch: ActivityBatch {
            device_name: device_name.to_string(),
            device_type: device_type.to_string(),
            activities,
        },
        stamp,
    })
}

pub fn artifact_file_name(username: &str, stamp: &str) -> String {
    format!("{}_{}.json", username, stamp)
}

/// Writes the batch as `{dir}/{username}_{stamp}.json`. A second sync by the
/// same user within the same minute overwrites the earlier file.
pub async fn write_artifact(
    dir: &Path,
    username: &str,
    generated: &GeneratedBatch,
) -> anyhow::Result<PathBuf> {
    let path = dir.join(artifact_file_name(username, &generated.stamp));
    let json = serde_json::to_vec_pretty(&generated.batch).context("serialize activity batch")?;
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("write artifact {}", path.display()))?;
    debug!(path = %path.display(), "activity artifact written");
    Ok(path)
}

pub async fn read_artifact(path: &Path) -> anyhow::Result<ActivityBatch> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("read artifact {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parse artifact {}", path.display()))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
