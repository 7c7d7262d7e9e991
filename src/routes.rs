use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::state::AppState;
use crate::storage::CapacityReading;

pub const DEFAULT_WINDOW_HOURS: i64 = 24;

/// Ceiling on requested windows so the cutoff arithmetic cannot overflow.
/// Anything larger is indistinguishable from full history anyway.
pub const MAX_WINDOW_HOURS: i64 = 24 * 365 * 10;

#[derive(Deserialize)]
pub struct DataQuery {
    /// Raw string so a non-integer value falls back to the default instead
    /// of failing extraction.
    pub hours: Option<String>,
}

#[derive(Serialize, Debug, Default, PartialEq)]
pub struct LocationSeries {
    pub timestamps: Vec<String>,
    pub capacities: Vec<i64>,
}

/// `GET /api/data?hours=N` — capacity history keyed by location name.
pub async fn get_data(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DataQuery>,
) -> Result<Json<BTreeMap<String, LocationSeries>>, StatusCode> {
    let hours = parse_hours(query.hours.as_deref());
    let readings = {
        let store = state.store.lock().unwrap();
        store.query_window(hours)
    };
    match readings {
        Ok(readings) => Ok(Json(group_by_location(readings))),
        Err(e) => {
            error!("failed to query capacity window: {e}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub fn parse_hours(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_WINDOW_HOURS)
        .min(MAX_WINDOW_HOURS)
}

pub fn group_by_location(readings: Vec<CapacityReading>) -> BTreeMap<String, LocationSeries> {
    let mut grouped: BTreeMap<String, LocationSeries> = BTreeMap::new();
    for reading in readings {
        let series = grouped.entry(reading.location_name).or_default();
        series.timestamps.push(reading.timestamp);
        series.capacities.push(reading.capacity);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(ts: &str, id: i64, name: &str, capacity: i64) -> CapacityReading {
        CapacityReading {
            timestamp: ts.to_owned(),
            location_id: id,
            location_name: name.to_owned(),
            capacity,
        }
    }

    #[test]
    fn hours_defaults_and_fallbacks() {
        assert_eq!(parse_hours(None), 24);
        assert_eq!(parse_hours(Some("six")), 24);
        assert_eq!(parse_hours(Some("6")), 6);
        assert_eq!(parse_hours(Some("0")), 0);
        assert_eq!(parse_hours(Some("-3")), -3);
    }

    #[test]
    fn extreme_hours_values_are_capped() {
        assert_eq!(parse_hours(Some("9223372036854775807")), MAX_WINDOW_HOURS);
        assert_eq!(parse_hours(Some("87601")), MAX_WINDOW_HOURS);
        assert_eq!(parse_hours(Some("87600")), MAX_WINDOW_HOURS);
    }

    #[test]
    fn groups_readings_by_location_name() {
        let grouped = group_by_location(vec![
            reading("2026-08-20T10:00:00.000000+00:00", 260, "Wien", 50),
            reading("2026-08-20T10:00:00.000000+00:00", 261, "Linz", 20),
            reading("2026-08-20T10:05:00.000000+00:00", 260, "Wien", 55),
        ]);

        assert_eq!(grouped.len(), 2);
        let wien = &grouped["Wien"];
        assert_eq!(wien.capacities, vec![50, 55]);
        assert_eq!(wien.timestamps.len(), 2);
        assert_eq!(grouped["Linz"].capacities, vec![20]);
        // BTreeMap keys come out sorted.
        let keys: Vec<_> = grouped.keys().collect();
        assert_eq!(keys, vec!["Linz", "Wien"]);
    }
}
