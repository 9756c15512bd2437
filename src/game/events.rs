//! Events emitted by the simulation, in the order they happened within a tick

use serde::Serialize;

use super::loot::LootId;
use super::physics::Vec2;
use super::state::PlayerId;

/// What eliminated a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    Shot,
    Zone,
}

/// Game events (zone, hits, kills, pickups, match end)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    /// Zone shrank and possibly moved
    ZoneShrunk {
        center: Vec2,
        radius: f32,
        next_radius: f32,
        /// Match clock seconds of the following shrink
        next_shrink_at: f32,
    },

    /// Hit-scan registered against a target
    PlayerHit {
        shooter_id: PlayerId,
        target_id: PlayerId,
        damage: f32,
        health_after: f32,
    },

    /// Player eliminated; zone deaths carry no killer
    PlayerKilled {
        killer_id: Option<PlayerId>,
        victim_id: PlayerId,
        cause: DeathCause,
    },

    /// Loot item consumed
    LootClaimed {
        player_id: PlayerId,
        item_id: LootId,
    },

    /// Match reached a terminal outcome (not emitted on abort)
    MatchEnded { winner_id: Option<PlayerId> },
}
