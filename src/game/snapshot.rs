//! Read-only views of committed match state for renderers and HUDs

use serde::Serialize;
use uuid::Uuid;

use super::events::GameEvent;
use super::loot::{self, LootId, LootItem};
use super::physics::Vec2;
use super::state::{Inventory, MatchState, MatchStatus, PlayerId};

/// Everything a renderer needs to draw one frame
#[derive(Debug, Clone, Serialize)]
pub struct MatchSnapshot {
    pub match_id: Uuid,
    pub tick: u64,
    pub clock_secs: f32,
    pub status: MatchStatus,
    pub alive_count: usize,
    pub zone: ZoneSnapshot,
    pub players: Vec<PlayerSnapshot>,
    pub loot: Vec<LootItem>,
}

/// Zone geometry plus the countdown shown on the HUD
#[derive(Debug, Clone, Serialize)]
pub struct ZoneSnapshot {
    pub center: Vec2,
    pub radius: f32,
    pub next_radius: f32,
    pub seconds_until_shrink: f32,
}

/// Player state in a snapshot
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub display_name: String,
    pub position: Vec2,
    pub health: f32,
    pub armor: f32,
    pub kills: u32,
    pub alive: bool,
    pub inventory: Inventory,
    /// Item a pickup request would claim right now (drives the pickup prompt)
    pub nearby_loot: Option<LootId>,
}

impl MatchSnapshot {
    pub fn capture(state: &MatchState) -> Self {
        let players = state
            .players
            .iter()
            .map(|p| PlayerSnapshot {
                id: p.id,
                display_name: p.display_name.clone(),
                position: p.position,
                health: p.health,
                armor: p.armor,
                kills: p.kills,
                alive: p.alive,
                inventory: p.inventory.clone(),
                nearby_loot: p
                    .alive
                    .then(|| loot::nearest_eligible(&state.loot, p.position))
                    .flatten()
                    .map(|idx| state.loot[idx].id),
            })
            .collect();

        Self {
            match_id: state.id,
            tick: state.tick,
            clock_secs: state.clock.as_secs_f32(),
            status: state.status.clone(),
            alive_count: state.alive_count(),
            zone: ZoneSnapshot {
                center: state.zone.center,
                radius: state.zone.radius,
                next_radius: state.zone.next_radius,
                seconds_until_shrink: state.zone.time_until_shrink(state.clock).as_secs_f32(),
            },
            players,
            loot: state.loot.clone(),
        }
    }
}

/// Paces snapshot broadcasts and batches the events between them
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
    /// Events since the last snapshot, in emission order
    pending_events: Vec<GameEvent>,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
            pending_events: Vec::new(),
        }
    }

    /// Record a committed tick; returns true when a snapshot is due
    pub fn on_tick(&mut self, events: Vec<GameEvent>) -> bool {
        self.pending_events.extend(events);
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for important events)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Hand over the events batched since the last snapshot
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }
}
