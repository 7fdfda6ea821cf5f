use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::aggregate::{aggregate, round2, Dashboard, Range, Series};
use super::dto::{MovementsResponse, RangeQuery, StandUpsResponse, StepsResponse};
use crate::{
    activity::store::Metric,
    auth::services::AuthUser,
    error::AppResult,
    state::AppState,
};

pub fn metric_routes() -> Router<AppState> {
    Router::new()
        .route("/steps", get(steps))
        .route("/standups", get(standups))
        .route("/movements", get(movements))
}

async fn load_series(
    state: &AppState,
    user_id: Uuid,
    dashboard: Dashboard,
    range: Range,
    now: OffsetDateTime,
) -> AppResult<Series> {
    let (from, to) = range.window(now);
    let points = state
        .activity
        .series(user_id, dashboard.metric(), from, to)
        .await?;
    debug!(%user_id, ?dashboard, ?range, points = points.len(), "series loaded");
    Ok(aggregate(dashboard, range, now, &points))
}

fn as_counts(values: &[f64]) -> Vec<i64> {
    values.iter().map(|v| v.round() as i64).collect()
}

#[instrument(skip(state))]
pub async fn steps(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<RangeQuery>,
) -> AppResult<Json<StepsResponse>> {
    let now = state.clock.now();
    let series = load_series(&state, user_id, Dashboard::Steps, q.range, now).await?;

    let (from, to) = q.range.window(now);
    let calories = state
        .activity
        .series(user_id, Metric::Calories, from, to)
        .await?;
    let total_calories = round2(calories.iter().map(|(_, v)| v).sum());

    Ok(Json(StepsResponse {
        range: q.range,
        values: as_counts(&series.values),
        total_steps: series.total.round() as i64,
        labels: series.labels,
        total_calories,
        progress_percentage: series.progress_percentage,
    }))
}

#[instrument(skip(state))]
pub async fn standups(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<RangeQuery>,
) -> AppResult<Json<StandUpsResponse>> {
    let now = state.clock.now();
    let series = load_series(&state, user_id, Dashboard::StandUps, q.range, now).await?;
    Ok(Json(StandUpsResponse {
        range: q.range,
        values: as_counts(&series.values),
        total_standups: series.total.round() as i64,
        labels: series.labels,
        progress_percentage: series.progress_percentage,
    }))
}

#[instrument(skip(state))]
pub async fn movements(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<RangeQuery>,
) -> AppResult<Json<MovementsResponse>> {
    let now = state.clock.now();
    let series = load_series(&state, user_id, Dashboard::Distance, q.range, now).await?;

    let (from, to) = q.range.window(now);
    let counts = state
        .activity
        .series(user_id, Metric::Movements, from, to)
        .await?;
    let total_movements = counts.iter().map(|(_, v)| v).sum::<f64>().round() as i64;

    Ok(Json(MovementsResponse {
        range: q.range,
        labels: series.labels,
        values: series.values,
        total_distance: series.total,
        total_movements,
        progress_percentage: series.progress_percentage,
    }))
}
