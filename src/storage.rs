use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{Connection, params};
use thiserror::Error;

/// Database file kept inside the storage root. Nothing else under the root
/// is read, written, or deleted.
pub const DB_FILE: &str = "capacity.db";

const WRITE_PROBE: &str = ".capacity-write-probe";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage root {0} does not exist or is not a directory")]
    MissingRoot(PathBuf),
    #[error("storage root {path} is not writable: {source}")]
    Unwritable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// One location's reading inside a poll snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotRow {
    pub location_id: i64,
    pub location_name: String,
    pub capacity: i64,
}

/// A stored reading as returned by queries.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityReading {
    pub timestamp: String,
    pub location_id: i64,
    pub location_name: String,
    pub capacity: i64,
}

/// SQLite-backed capacity history. Lives behind a mutex in shared state;
/// the request handlers and the poller access it concurrently.
#[derive(Debug)]
pub struct CapacityStore {
    conn: Connection,
}

impl CapacityStore {
    /// Opens (or creates) the database inside `root` and applies the schema.
    ///
    /// The root itself is never created here: the deployment provisions it,
    /// and a missing or unwritable root is a startup failure.
    pub fn open(root: &Path) -> Result<Self, StorageError> {
        verify_root(root)?;
        let conn = Connection::open(root.join(DB_FILE))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS capacity (
                timestamp     TEXT NOT NULL,
                location_id   INTEGER NOT NULL,
                location_name TEXT NOT NULL,
                capacity      INTEGER NOT NULL,
                PRIMARY KEY (timestamp, location_id))",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_capacity_location_timestamp
             ON capacity (location_id, timestamp)",
            [],
        )?;
        Ok(())
    }

    /// Stores one poll snapshot: every location shares the same timestamp,
    /// written in a single transaction.
    pub fn insert_snapshot(
        &mut self,
        timestamp: DateTime<Utc>,
        rows: &[SnapshotRow],
    ) -> Result<(), StorageError> {
        let ts = format_timestamp(timestamp);
        let tx = self.conn.transaction()?;
        for row in rows {
            tx.execute(
                "INSERT INTO capacity (timestamp, location_id, location_name, capacity)
                 VALUES (?1, ?2, ?3, ?4)",
                params![ts, row.location_id, row.location_name, row.capacity],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Readings from the last `hours` hours, ordered by (timestamp,
    /// location_id). `hours <= 0` returns the full history.
    pub fn query_window(&self, hours: i64) -> Result<Vec<CapacityReading>, StorageError> {
        let mut where_clause = "";
        let mut bind: Vec<String> = Vec::new();
        if let Some(cutoff) = window_cutoff(hours, Utc::now()) {
            where_clause = "WHERE timestamp >= ?1";
            bind.push(format_timestamp(cutoff));
        }

        let query = format!(
            "SELECT timestamp, location_id, location_name, capacity
             FROM capacity {where_clause} ORDER BY timestamp, location_id"
        );
        let mut stmt = self.conn.prepare(&query)?;
        let readings = stmt
            .query_map(rusqlite::params_from_iter(bind.iter()), |row| {
                Ok(CapacityReading {
                    timestamp: row.get(0)?,
                    location_id: row.get(1)?,
                    location_name: row.get(2)?,
                    capacity: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(readings)
    }
}

/// Timestamps are stored as fixed-width RFC 3339 text (`+00:00` offset,
/// microsecond precision) so lexicographic comparison in SQL matches
/// chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Cutoff for a bounded window. `hours <= 0` means no cutoff (full history),
/// and a window too large to represent as a `Duration` also covers
/// everything rather than overflowing.
fn window_cutoff(hours: i64, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if hours <= 0 {
        return None;
    }
    Duration::try_hours(hours).and_then(|delta| now.checked_sub_signed(delta))
}

fn verify_root(root: &Path) -> Result<(), StorageError> {
    if !root.is_dir() {
        return Err(StorageError::MissingRoot(root.to_path_buf()));
    }
    let probe = root.join(WRITE_PROBE);
    match std::fs::write(&probe, b"") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            Ok(())
        }
        Err(source) => Err(StorageError::Unwritable {
            path: root.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(names: &[(i64, &str, i64)]) -> Vec<SnapshotRow> {
        names
            .iter()
            .map(|&(location_id, name, capacity)| SnapshotRow {
                location_id,
                location_name: name.to_owned(),
                capacity,
            })
            .collect()
    }

    #[test]
    fn missing_root_is_an_error() {
        let err = CapacityStore::open(Path::new("/nonexistent/capacity-root")).unwrap_err();
        assert!(matches!(err, StorageError::MissingRoot(_)));
    }

    #[test]
    fn root_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a-file");
        std::fs::write(&file, b"x").unwrap();
        let err = CapacityStore::open(&file).unwrap_err();
        assert!(matches!(err, StorageError::MissingRoot(_)));
    }

    #[test]
    fn insert_and_query_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CapacityStore::open(dir.path()).unwrap();

        let ts = Utc::now();
        store
            .insert_snapshot(ts, &snapshot(&[(260, "Wien", 55), (261, "Linz", 30)]))
            .unwrap();

        let readings = store.query_window(24).unwrap();
        assert_eq!(readings.len(), 2);
        // Ordered by (timestamp, location_id).
        assert_eq!(readings[0].location_id, 260);
        assert_eq!(readings[0].location_name, "Wien");
        assert_eq!(readings[0].capacity, 55);
        assert_eq!(readings[0].timestamp, format_timestamp(ts));
        assert_eq!(readings[1].location_id, 261);
    }

    #[test]
    fn window_excludes_old_readings() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CapacityStore::open(dir.path()).unwrap();

        let old = Utc::now() - Duration::hours(48);
        store
            .insert_snapshot(old, &snapshot(&[(260, "Wien", 80)]))
            .unwrap();
        store
            .insert_snapshot(Utc::now(), &snapshot(&[(260, "Wien", 40)]))
            .unwrap();

        let recent = store.query_window(24).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].capacity, 40);

        // Non-positive hours means everything.
        assert_eq!(store.query_window(0).unwrap().len(), 2);
        assert_eq!(store.query_window(-5).unwrap().len(), 2);
    }

    #[test]
    fn oversized_window_covers_full_history_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CapacityStore::open(dir.path()).unwrap();
        store
            .insert_snapshot(Utc::now() - Duration::hours(48), &snapshot(&[(260, "Wien", 80)]))
            .unwrap();

        let readings = store.query_window(i64::MAX).unwrap();
        assert_eq!(readings.len(), 1);
    }

    #[test]
    fn window_cutoff_handles_extremes() {
        let now = Utc::now();
        assert!(window_cutoff(0, now).is_none());
        assert!(window_cutoff(-1, now).is_none());
        assert!(window_cutoff(i64::MAX, now).is_none());
        assert_eq!(window_cutoff(24, now), Some(now - Duration::hours(24)));
    }

    #[test]
    fn timestamp_text_sorts_chronologically() {
        let earlier = Utc::now();
        let later = earlier + Duration::microseconds(1);
        assert!(format_timestamp(earlier) < format_timestamp(later));
        let much_later = earlier + Duration::days(400);
        assert!(format_timestamp(earlier) < format_timestamp(much_later));
    }
}
