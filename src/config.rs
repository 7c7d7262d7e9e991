use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, ensure};

/// Upstream occupancy endpoint queried when `CAPACITY_API_URL` is unset.
pub const DEFAULT_CAPACITY_API_URL: &str =
    "https://boulderbar.net/wp-json/boulderbar/v1/capacity?locations=260,261,262,263,264,265,284";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_WORKER_THREADS: usize = 4;
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// Startup configuration, resolved once from the environment and threaded
/// explicitly into everything that needs it.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Storage root directory. Must already exist and be writable.
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub worker_threads: usize,
    /// Hard cap on requests executing inside handlers at any instant.
    pub max_concurrent_requests: usize,
    pub poll_interval: Duration,
    pub capacity_api_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::load(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup so tests can supply
    /// values without mutating process-global environment state.
    pub fn load(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = PathBuf::from(var("DB_PATH").unwrap_or_else(|| ".".to_owned()));

        let bind_addr = match var("BIND_ADDR") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("BIND_ADDR is not a valid socket address: {raw}"))?,
            None => DEFAULT_BIND_ADDR
                .parse()
                .expect("default bind address is valid"),
        };

        let worker_threads = parse_var(&var, "WORKER_THREADS", DEFAULT_WORKER_THREADS)?;
        ensure!(worker_threads >= 1, "WORKER_THREADS must be at least 1");
        let max_concurrent_requests = parse_var(
            &var,
            "MAX_CONCURRENT_REQUESTS",
            DEFAULT_MAX_CONCURRENT_REQUESTS,
        )?;
        ensure!(
            max_concurrent_requests >= 1,
            "MAX_CONCURRENT_REQUESTS must be at least 1"
        );
        let poll_interval_secs =
            parse_var(&var, "POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;

        Ok(Self {
            db_path,
            bind_addr,
            worker_threads,
            max_concurrent_requests,
            poll_interval: Duration::from_secs(poll_interval_secs),
            capacity_api_url: var("CAPACITY_API_URL")
                .unwrap_or_else(|| DEFAULT_CAPACITY_API_URL.to_owned()),
        })
    }
}

/// Parses an optional variable, failing startup on malformed values rather
/// than silently falling back to the default.
fn parse_var<T: FromStr>(
    var: impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} is not a valid value: {raw}")),
        None => Ok(default),
    }
}
