//! WebSocket protocol message definitions
//! These are the wire types between clients and the authoritative match

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::events::GameEvent;
use crate::game::snapshot::MatchSnapshot;
use crate::game::stats::MatchStats;
use crate::game::TickInput;

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Player input for the next tick
    Input {
        /// Client sequence number, older messages are dropped
        seq: u32,
        #[serde(flatten)]
        input: TickInput,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Client is leaving; its player idles for the rest of the match
    Leave,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        match_id: Uuid,
        player_id: Uuid,
        server_time: u64,
    },

    /// Committed state plus the events since the previous snapshot
    Snapshot {
        snapshot: MatchSnapshot,
        events: Vec<GameEvent>,
    },

    /// Match reached a winner or a draw
    MatchEnded {
        winner_id: Option<Uuid>,
        stats: MatchStats,
    },

    /// Match was stopped before an outcome
    MatchAborted { reason: String },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}
