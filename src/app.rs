use std::net::SocketAddr;
use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use crate::state::AppState;
use crate::{auth, devices, metrics, profiles};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1",
              Router::new()
                  .merge(auth::router())
                  .merge(profiles::router())
                  .merge(devices::router())
                  .merge(metrics::router())
                  .route("/health", get(|| async { "ok" }))
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
        .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        extract::FromRef,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    use time::{macros::datetime, OffsetDateTime};

    use super::*;
    use crate::activity::{memory::MemoryActivityStore, store::HourRecord};
    use crate::auth::services::JwtKeys;
    use crate::clock::{FixedClock, SteppingClock};

    fn bearer(state: &AppState, user_id: Uuid) -> String {
        let token = JwtKeys::from_ref(state).sign_access(user_id, 0).unwrap();
        format!("Bearer {}", token)
    }

    async fn get_json(app: Router, uri: &str, auth: Option<String>) -> (StatusCode, serde_json::Value) {
        let mut req = Request::builder().uri(uri);
        if let Some(auth) = auth {
            req = req.header(header::AUTHORIZATION, auth);
        }
        let res = app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    /// One record per hour, `hours` of them, the newest at `newest`.
    fn seeded_from(newest: OffsetDateTime, hours: i64) -> (AppState, Uuid) {
        let store = Arc::new(MemoryActivityStore::default());
        let state = AppState::fake_with(store.clone());
        let user = Uuid::new_v4();
        for h in 0..hours {
            store.insert(
                user,
                HourRecord {
                    recorded_at: newest - time::Duration::hours(h),
                    steps: 500,
                    calories: 10.25,
                    distance: 0.5,
                    standups: 2,
                    movements: 3,
                },
            );
        }
        (state, user)
    }

    fn seeded() -> (AppState, Uuid) {
        seeded_from(datetime!(2024-01-02 12:00 UTC), 30)
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn dashboards_require_a_token() {
        for uri in ["/api/v1/steps", "/api/v1/standups", "/api/v1/movements", "/api/v1/devices"] {
            let (status, body) = get_json(build_app(AppState::fake()), uri, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body["error"], "unauthorized");
        }
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let (status, body) = get_json(
            build_app(AppState::fake()),
            "/api/v1/steps",
            Some("Bearer not.a.jwt".into()),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid_token");
    }

    #[tokio::test]
    async fn refresh_token_cannot_call_dashboards() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state).sign_refresh(Uuid::new_v4(), 0).unwrap();
        let (status, _) = get_json(
            build_app(state),
            "/api/v1/steps",
            Some(format!("Bearer {}", token)),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn steps_day_defaults_and_sums_last_24_hours() {
        let (state, user) = seeded();
        let auth = bearer(&state, user);
        let (status, body) = get_json(build_app(state), "/api/v1/steps", Some(auth)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["range"], "day");
        assert_eq!(body["labels"].as_array().unwrap().len(), 24);
        assert_eq!(body["values"][12], 500);
        assert_eq!(body["total_steps"], 24 * 500);
        assert_eq!(body["total_calories"], 246.0);
        assert_eq!(body["progress_percentage"], 120.0);
    }

    #[tokio::test]
    async fn steps_day_on_the_hour_skips_the_hour_a_day_old() {
        let now = datetime!(2024-01-02 12:00 UTC);
        let (mut state, user) = seeded_from(now, 25);
        state.clock = Arc::new(FixedClock(now));
        let auth = bearer(&state, user);
        let (status, body) = get_json(build_app(state), "/api/v1/steps", Some(auth)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["values"][12], 500);
        assert_eq!(body["total_steps"], 24 * 500);
        assert_eq!(body["total_calories"], 246.0);
    }

    #[tokio::test]
    async fn steps_and_calories_share_one_window() {
        let (mut state, user) = seeded();
        state.clock = Arc::new(SteppingClock::new(
            datetime!(2024-01-02 12:30 UTC),
            time::Duration::hours(1),
        ));
        let auth = bearer(&state, user);
        let (status, body) = get_json(build_app(state), "/api/v1/steps", Some(auth)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_steps"], 24 * 500);
        assert_eq!(body["total_calories"], 246.0);
    }

    #[tokio::test]
    async fn standups_week_has_seven_days() {
        let (state, user) = seeded();
        let auth = bearer(&state, user);
        let (status, body) =
            get_json(build_app(state), "/api/v1/standups?range=week", Some(auth)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["range"], "week");
        assert_eq!(body["labels"][0], "2024-01-02");
        assert_eq!(body["labels"].as_array().unwrap().len(), 7);
        // 13 hours today (00:00..=12:00), the remaining 17 yesterday
        assert_eq!(body["values"][0], 26);
        assert_eq!(body["values"][1], 34);
        assert_eq!(body["total_standups"], 60);
    }

    #[tokio::test]
    async fn movements_reports_distance() {
        let (state, user) = seeded();
        let auth = bearer(&state, user);
        let (status, body) = get_json(build_app(state), "/api/v1/movements", Some(auth)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_distance"], 12.0);
        assert_eq!(body["total_movements"], 24 * 3);
        assert_eq!(body["progress_percentage"], 100.0);
        assert_eq!(body["values"][5], 0.5);
    }

    #[tokio::test]
    async fn unknown_range_is_rejected() {
        let (state, user) = seeded();
        let auth = bearer(&state, user);
        let (status, _) =
            get_json(build_app(state), "/api/v1/steps?range=month", Some(auth)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
