use eegview_core::{ElectrodeCatalog, PipelineConfig};
use std::time::Instant;

use crate::config::ServerConfig;

/// Read-only state shared across all handlers.
///
/// Nothing here changes after startup; every request decodes its own upload.
pub struct AppState {
    pub config: ServerConfig,
    pub catalog: ElectrodeCatalog,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            catalog: ElectrodeCatalog::standard_1020(),
            start_time: Instant::now(),
        }
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.config.pipeline
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
