use std::sync::Mutex;

use crate::config::AppConfig;
use crate::storage::CapacityStore;

pub struct AppState {
    pub config: AppConfig,
    pub store: Mutex<CapacityStore>,
}

impl AppState {
    pub fn new(config: AppConfig, store: CapacityStore) -> Self {
        AppState {
            config,
            store: Mutex::new(store),
        }
    }
}
