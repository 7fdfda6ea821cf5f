//! Day/week bucketing behind the dashboards.

use serde::{Deserialize, Serialize};
use time::{macros::format_description, Duration, OffsetDateTime, Time};

use crate::activity::store::Metric;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Range {
    #[default]
    Day,
    Week,
}

impl Range {
    /// Inclusive `(from, to)` bounds: the last 24 hours, or the last 7
    /// calendar days (today included).
    ///
    /// The day window excludes `now - 24h` itself, otherwise an hour exactly
    /// one day old would share a bucket with the current hour. The offset is
    /// one microsecond since that is the storage precision.
    pub fn window(self, now: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
        match self {
            Range::Day => (now - Duration::hours(24) + Duration::microseconds(1), now),
            Range::Week => ((now - Duration::days(6)).replace_time(Time::MIDNIGHT), now),
        }
    }

    fn target_multiplier(self) -> f64 {
        match self {
            Range::Day => 1.0,
            Range::Week => 7.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dashboard {
    Steps,
    StandUps,
    Distance,
}

impl Dashboard {
    pub fn metric(self) -> Metric {
        match self {
            Dashboard::Steps => Metric::Steps,
            Dashboard::StandUps => Metric::StandUps,
            Dashboard::Distance => Metric::Distance,
        }
    }

    /// Steps per day, stand-ups per day, kilometres per day.
    pub fn daily_target(self) -> f64 {
        match self {
            Dashboard::Steps => 10_000.0,
            Dashboard::StandUps => 24.0,
            Dashboard::Distance => 8.0,
        }
    }

    /// Steps are allowed to overshoot up to 700%, the others stop at 100%.
    pub fn progress_cap(self) -> f64 {
        match self {
            Dashboard::Steps => 700.0,
            Dashboard::StandUps | Dashboard::Distance => 100.0,
        }
    }

    fn rounds_to_cents(self) -> bool {
        matches!(self, Dashboard::Distance)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub total: f64,
    pub progress_percentage: f64,
}

pub fn aggregate(
    dashboard: Dashboard,
    range: Range,
    now: OffsetDateTime,
    points: &[(OffsetDateTime, f64)],
) -> Series {
    let (from, to) = range.window(now);
    let in_window = points.iter().filter(|(at, _)| *at >= from && *at <= to);

    let (labels, mut values) = match range {
        Range::Day => {
            let mut values = vec![0.0; 24];
            for (at, v) in in_window {
                values[at.hour() as usize] += v;
            }
            let labels = (0..24).map(|h| format!("{}:00", h)).collect();
            (labels, values)
        }
        Range::Week => {
            let days: Vec<_> = (0..7).map(|d| (now - Duration::days(d)).date()).collect();
            let mut values = vec![0.0; days.len()];
            for (at, v) in in_window {
                if let Some(i) = days.iter().position(|d| *d == at.date()) {
                    values[i] += v;
                }
            }
            let fmt = format_description!("[year]-[month]-[day]");
            let labels = days
                .iter()
                .map(|d| d.format(fmt).unwrap_or_else(|_| d.to_string()))
                .collect();
            (labels, values)
        }
    };

    let mut total: f64 = values.iter().sum();
    if dashboard.rounds_to_cents() {
        values.iter_mut().for_each(|v| *v = round2(*v));
        total = round2(values.iter().sum());
    }

    let target = dashboard.daily_target() * range.target_multiplier();
    let progress_percentage = (total / target * 100.0).min(dashboard.progress_cap());

    Series {
        labels,
        values,
        total,
        progress_percentage,
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
