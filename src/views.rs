use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use chrono::{DateTime, Duration, Utc};
use maud::{DOCTYPE, Markup, html};
use serde::Deserialize;
use tracing::error;

use crate::charts::{self, svg};
use crate::routes::{DEFAULT_WINDOW_HOURS, parse_hours};
use crate::state::AppState;
use crate::storage::CapacityReading;
use crate::styles::{self, Charts};

/// Selectable chart windows: `(hours, display label)`. Zero means the full
/// recorded history.
const TIME_WINDOWS: &[(i64, &str)] = &[
    (6, "6h"),
    (12, "12h"),
    (24, "24h"),
    (72, "3d"),
    (168, "7d"),
    (0, "all"),
];

pub const CHART_BUCKET_COUNT: usize = 100;
pub const MIN_BUCKET_SECONDS: i64 = 60;

#[derive(Deserialize)]
pub struct WindowQuery {
    pub hours: Option<String>,
}

pub async fn index(State(state): State<Arc<AppState>>) -> Markup {
    let content = html! {
        h1 { "boulder capacity" }
        div #charts-container
            hx-get=(format!("/fragments/charts?hours={DEFAULT_WINDOW_HOURS}"))
            hx-trigger="every 60s"
            hx-swap="innerHTML"
        {
            (render_charts(&state, DEFAULT_WINDOW_HOURS))
        }
    };
    page_shell("Capacity | Dashboard", content)
}

pub async fn fragment_charts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowQuery>,
) -> Markup {
    render_charts(&state, parse_hours(query.hours.as_deref()))
}

pub async fn styles_css() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css")], styles::ALL.clone())
}

fn render_charts(state: &AppState, hours: i64) -> Markup {
    let readings = {
        let store = state.store.lock().unwrap();
        store.query_window(hours)
    };
    let readings = match readings {
        Ok(readings) => readings,
        Err(e) => {
            error!("failed to query capacity window: {e}");
            return html! {
                (time_selector(hours))
                div.(Charts::ERROR_BANNER) { "failed to load capacity data" }
            };
        }
    };

    let series = series_by_location(&readings);
    let end = Utc::now();
    let start = window_start(hours, &series, end);

    html! {
        (time_selector(hours))
        @if series.is_empty() {
            p.(Charts::EMPTY_NOTE) { "no capacity data recorded yet" }
        } @else {
            div.(Charts::CHART_GRID) {
                @for (name, points) in &series {
                    @let buckets = charts::bucket_series(points, start, end, CHART_BUCKET_COUNT, MIN_BUCKET_SECONDS);
                    div.(Charts::CHART_CONTAINER) {
                        h2.(Charts::CHART_TITLE) { (name) }
                        (svg::render_line_chart(&buckets, name))
                    }
                }
            }
        }
    }
}

fn time_selector(active_hours: i64) -> Markup {
    html! {
        div.(Charts::TIME_WINDOW_SELECTOR) {
            @for &(hours, label) in TIME_WINDOWS {
                @let classes = if hours == active_hours {
                    format!("{} {}", Charts::TIME_WINDOW_BTN, Charts::TIME_WINDOW_ACTIVE)
                } else {
                    Charts::TIME_WINDOW_BTN.to_owned()
                };
                button
                    class=(classes)
                    hx-get=(format!("/fragments/charts?hours={hours}"))
                    hx-target="#charts-container"
                    hx-swap="innerHTML"
                {
                    (label)
                }
            }
        }
    }
}

/// Groups readings per location, parsing stored timestamp text back into
/// `DateTime<Utc>`. Unparsable rows are skipped rather than failing the page.
fn series_by_location(
    readings: &[CapacityReading],
) -> BTreeMap<&str, Vec<(DateTime<Utc>, i64)>> {
    let mut series: BTreeMap<&str, Vec<(DateTime<Utc>, i64)>> = BTreeMap::new();
    for reading in readings {
        let Ok(ts) = DateTime::parse_from_rfc3339(&reading.timestamp) else {
            continue;
        };
        series
            .entry(reading.location_name.as_str())
            .or_default()
            .push((ts.with_timezone(&Utc), reading.capacity));
    }
    series
}

fn window_start(
    hours: i64,
    series: &BTreeMap<&str, Vec<(DateTime<Utc>, i64)>>,
    end: DateTime<Utc>,
) -> DateTime<Utc> {
    if hours > 0 {
        let bounded = Duration::try_hours(hours).and_then(|delta| end.checked_sub_signed(delta));
        if let Some(start) = bounded {
            return start;
        }
    }
    // "all" (or a window too large to represent): span from the oldest
    // recorded reading.
    series
        .values()
        .filter_map(|points| points.first())
        .map(|&(ts, _)| ts)
        .min()
        .unwrap_or(end - Duration::hours(DEFAULT_WINDOW_HOURS))
}

fn page_shell(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                link rel="stylesheet" href="/styles.css";
                script src="https://unpkg.com/htmx.org@2.0.4" {}
            }
            body {
                (content)
            }
        }
    }
}
