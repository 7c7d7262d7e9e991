//! Capacity dashboard: polls an upstream gym-occupancy API on an interval,
//! persists readings in SQLite under a configured storage root, and serves
//! a server-rendered dashboard plus a JSON data endpoint.

pub mod charts;
pub mod config;
pub mod limit;
pub mod poller;
pub mod routes;
pub mod state;
pub mod storage;
pub mod styles;
pub mod views;
