//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::loot::DEFAULT_LOOT_COUNT;
use crate::game::r#match::DEFAULT_MAX_PLAYERS;
use crate::util::time::{DEFAULT_SIMULATION_TPS, DEFAULT_SNAPSHOT_TPS};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Simulation ticks per second
    pub simulation_tps: u32,
    /// Snapshot broadcasts per second
    pub snapshot_tps: u32,
    /// Loot items spawned per match
    pub loot_count: usize,
    /// Roster size limit
    pub max_players: usize,

    /// Allowed client origins for CORS, comma-separated, `*` for any
    pub client_origin: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            simulation_tps: parse_or("TICK_RATE", DEFAULT_SIMULATION_TPS)?,
            snapshot_tps: parse_or("SNAPSHOT_RATE", DEFAULT_SNAPSHOT_TPS)?,
            loot_count: parse_or("LOOT_COUNT", DEFAULT_LOOT_COUNT)?,
            max_players: parse_or("MAX_PLAYERS", DEFAULT_MAX_PLAYERS)?,

            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),
        };

        if config.simulation_tps == 0 {
            return Err(ConfigError::Invalid("TICK_RATE"));
        }
        if config.snapshot_tps == 0 {
            return Err(ConfigError::Invalid("SNAPSHOT_RATE"));
        }

        Ok(config)
    }
}

/// Read an optional variable, using `default` when unset
fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
