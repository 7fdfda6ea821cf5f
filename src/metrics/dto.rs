use serde::{Deserialize, Serialize};

use super::aggregate::Range;

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    #[serde(default)]
    pub range: Range,
}

#[derive(Debug, Serialize)]
pub struct StepsResponse {
    pub range: Range,
    pub labels: Vec<String>,
    pub values: Vec<i64>,
    pub total_steps: i64,
    pub total_calories: f64,
    pub progress_percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct StandUpsResponse {
    pub range: Range,
    pub labels: Vec<String>,
    pub values: Vec<i64>,
    pub total_standups: i64,
    pub progress_percentage: f64,
}

/// The movements dashboard charts distance in kilometres; the movement count
/// for the same window rides along.
#[derive(Debug, Serialize)]
pub struct MovementsResponse {
    pub range: Range,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub total_distance: f64,
    pub total_movements: i64,
    pub progress_percentage: f64,
}
