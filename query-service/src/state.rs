//! Application state for query service.

use std::sync::Arc;

use common::config::{AppConfig, DatabaseSettings};
use common::errors::AppResult;

use crate::executor::EngineExecutors;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<DatabaseSettings>,
    pub executors: EngineExecutors,
}

impl AppState {
    /// Loads the static database sections and wires the native executors.
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let settings = DatabaseSettings::load(&config.databases_file)?;
        Ok(Self::with_parts(settings, EngineExecutors::native()))
    }

    pub fn with_parts(settings: DatabaseSettings, executors: EngineExecutors) -> Self {
        Self {
            settings: Arc::new(settings),
            executors,
        }
    }
}
