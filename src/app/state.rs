//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::runner::RunnerSettings;
use crate::game::stats::{StatsSink, TracingStatsSink};
use crate::game::MatchRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub match_registry: Arc<MatchRegistry>,
    pub stats_sink: Arc<dyn StatsSink>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_sink(config, Arc::new(TracingStatsSink))
    }

    pub fn with_sink(config: Config, stats_sink: Arc<dyn StatsSink>) -> Self {
        Self {
            config: Arc::new(config),
            match_registry: Arc::new(MatchRegistry::new()),
            stats_sink,
        }
    }

    /// Scheduler rates every new match runs at
    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            simulation_tps: self.config.simulation_tps,
            snapshot_tps: self.config.snapshot_tps,
        }
    }
}
