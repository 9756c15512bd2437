//! Game simulation modules

pub mod combat;
pub mod events;
pub mod loot;
pub mod r#match;
pub mod physics;
pub mod runner;
pub mod snapshot;
pub mod state;
pub mod stats;
pub mod zone;

pub use r#match::{Match, MatchConfig, StartError, TickReport};
pub use runner::{GameMatch, MatchHandle, MatchRegistry};
pub use state::{PlayerId, RosterEntry};

use serde::Deserialize;

use crate::ws::protocol::ClientMsg;
use physics::{MoveIntent, Vec2};

/// Player message received from WebSocket
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub player_id: PlayerId,
    pub msg: ClientMsg,
    pub received_at: u64,
}

/// Input state for a single tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct TickInput {
    #[serde(default)]
    pub movement: MoveIntent,
    /// Aim point in arena coordinates
    #[serde(default)]
    pub aim: Option<Vec2>,
    #[serde(default)]
    pub fire: bool,
    #[serde(default)]
    pub pickup: bool,
}

impl TickInput {
    /// Fold a newer message into the input pending for the next tick.
    ///
    /// Movement and aim follow the latest message; fire and pickup requests
    /// stay latched until the tick consumes them.
    pub fn merge(&mut self, newer: TickInput) {
        self.movement = newer.movement;
        if newer.aim.is_some() {
            self.aim = newer.aim;
        }
        self.fire |= newer.fire;
        self.pickup |= newer.pickup;
    }

    /// What carries over to the next tick: held keys and aim, no one-shot requests
    pub fn held(&self) -> TickInput {
        TickInput {
            movement: self.movement,
            aim: self.aim,
            fire: false,
            pickup: false,
        }
    }
}
