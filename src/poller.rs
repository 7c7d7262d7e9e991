use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use crate::state::AppState;
use crate::storage::{SnapshotRow, StorageError};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Upstream response: `{"status": 1, "data": [{"id": .., "title": .., "capacity": ..}]}`.
#[derive(Debug, Deserialize)]
pub struct CapacityResponse {
    pub status: i64,
    #[serde(default)]
    pub data: Vec<LocationCapacity>,
}

#[derive(Debug, Deserialize)]
pub struct LocationCapacity {
    pub id: i64,
    pub title: String,
    pub capacity: i64,
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("capacity request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream reported status {0}")]
    UpstreamStatus(i64),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Spawns the background poll loop: fetch immediately, then every
/// `poll_interval`. Poll failures are logged and never crash the process.
pub fn spawn_poller(state: Arc<AppState>) -> Result<()> {
    let client = Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("failed to build http client")?;
    let poll_interval = state.config.poll_interval;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            ticker.tick().await;
            match poll_once(&client, &state).await {
                Ok(locations) => info!(locations, "stored capacity snapshot"),
                Err(e) => error!("capacity poll failed: {e}"),
            }
        }
    });
    Ok(())
}

async fn poll_once(client: &Client, state: &AppState) -> Result<usize, PollError> {
    let payload: CapacityResponse = client
        .get(&state.config.capacity_api_url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let rows = snapshot_rows(payload)?;
    let count = rows.len();

    let mut store = state.store.lock().unwrap();
    store.insert_snapshot(Utc::now(), &rows)?;
    Ok(count)
}

/// A snapshot is stored only when the upstream reports `status == 1`.
fn snapshot_rows(payload: CapacityResponse) -> Result<Vec<SnapshotRow>, PollError> {
    if payload.status != 1 {
        return Err(PollError::UpstreamStatus(payload.status));
    }
    Ok(payload
        .data
        .into_iter()
        .map(|location| SnapshotRow {
            location_id: location.id,
            location_name: location.title,
            capacity: location.capacity,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_upstream_payload() {
        let payload: CapacityResponse = serde_json::from_str(
            r#"{"status": 1, "data": [
                {"id": 260, "title": "Wien Hauptbahnhof", "capacity": 72},
                {"id": 261, "title": "Wien Seestadt", "capacity": 18}
            ]}"#,
        )
        .unwrap();

        let rows = snapshot_rows(payload).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].location_id, 260);
        assert_eq!(rows[0].location_name, "Wien Hauptbahnhof");
        assert_eq!(rows[0].capacity, 72);
    }

    #[test]
    fn missing_data_defaults_to_empty() {
        let payload: CapacityResponse = serde_json::from_str(r#"{"status": 1}"#).unwrap();
        assert!(snapshot_rows(payload).unwrap().is_empty());
    }

    #[test]
    fn non_success_status_is_rejected() {
        let payload: CapacityResponse =
            serde_json::from_str(r#"{"status": 0, "data": []}"#).unwrap();
        let err = snapshot_rows(payload).unwrap_err();
        assert!(matches!(err, PollError::UpstreamStatus(0)));
    }
}
