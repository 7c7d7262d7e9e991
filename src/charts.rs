pub mod svg;

use chrono::{DateTime, Duration, Utc};

/// Downsamples a location's readings into at most `num_buckets` time buckets
/// over `[start, end]`; each bucket carries the average capacity of its
/// readings. Empty buckets are omitted so line charts connect real data
/// instead of dipping to zero.
pub fn bucket_series(
    points: &[(DateTime<Utc>, i64)],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    num_buckets: usize,
    min_bucket_secs: i64,
) -> Vec<(DateTime<Utc>, f64)> {
    let total_secs = (end - start).num_seconds();
    if total_secs <= 0 {
        return Vec::new();
    }
    let bucket_secs = (total_secs / num_buckets as i64).max(min_bucket_secs);
    let actual_buckets = ((total_secs / bucket_secs).max(1)) as usize;

    let mut sums = vec![0i64; actual_buckets];
    let mut counts = vec![0usize; actual_buckets];
    for &(ts, capacity) in points {
        let offset = (ts - start).num_seconds();
        if offset < 0 || ts > end {
            continue;
        }
        let idx = ((offset / bucket_secs) as usize).min(actual_buckets - 1);
        sums[idx] += capacity;
        counts[idx] += 1;
    }

    (0..actual_buckets)
        .filter(|&i| counts[i] > 0)
        .map(|i| {
            let bucket_start = start + Duration::seconds(bucket_secs * i as i64);
            (bucket_start, sums[i] as f64 / counts[i] as f64)
        })
        .collect()
}
