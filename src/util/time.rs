//! Time utilities for the match clock and the tick scheduler

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Rate the per-tick tuning constants were originally expressed at
pub const REFERENCE_TPS: u32 = 60;
/// Default simulation rate
pub const DEFAULT_SIMULATION_TPS: u32 = 60;
/// Default snapshot broadcast rate
pub const DEFAULT_SNAPSHOT_TPS: u32 = 20;

/// Fixed simulation step for a given tick rate
pub fn tick_delta(ticks_per_second: u32) -> Duration {
    Duration::from_micros(1_000_000 / u64::from(ticks_per_second.max(1)))
}

/// Convert a per-tick amount at the reference rate into a per-second rate
pub const fn per_second(per_reference_tick: f32) -> f32 {
    per_reference_tick * REFERENCE_TPS as f32
}

/// A simple timer for measuring durations
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
