//! Authoritative match data model

use chrono::{DateTime, Utc};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use uuid::Uuid;

use super::loot::LootItem;
use super::physics::Vec2;
use super::zone::SafeZone;

/// Opaque player identity
pub type PlayerId = Uuid;

/// Health ceiling, also the starting health
pub const MAX_HEALTH: f32 = 100.0;
/// Armor ceiling
pub const MAX_ARMOR: f32 = 100.0;
/// Weapon every player spawns with
pub const STARTING_WEAPON: &str = "pistol";
/// Ammo for the starting weapon
pub const STARTING_AMMO: u32 = 30;

/// One entry of the lobby roster handed to the driver at match start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: PlayerId,
    pub display_name: String,
}

/// Owned weapons and ammo per weapon name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Inventory {
    pub weapons: BTreeSet<String>,
    pub ammo: BTreeMap<String, u32>,
}

impl Inventory {
    /// Starting loadout: one pistol with 30 rounds
    pub fn starting() -> Self {
        let mut inventory = Self::default();
        inventory.add_weapon(STARTING_WEAPON, STARTING_AMMO);
        inventory
    }

    /// Add a weapon; ammo stacks when the weapon is already owned
    pub fn add_weapon(&mut self, name: &str, ammo: u32) {
        self.weapons.insert(name.to_string());
        let entry = self.ammo.entry(name.to_string()).or_insert(0);
        *entry = entry.saturating_add(ammo);
    }
}

/// Player state in a match (authoritative)
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: PlayerId,
    pub display_name: String,
    pub position: Vec2,
    pub health: f32,
    pub armor: f32,
    pub inventory: Inventory,
    pub kills: u32,
    pub alive: bool,
    /// Match clock time of the last accepted fire attempt
    pub last_fire_at: Option<Duration>,
    /// Match clock time of death, used for placements
    pub death_at: Option<Duration>,
}

impl PlayerState {
    pub fn new(entry: &RosterEntry, spawn: Vec2) -> Self {
        Self {
            id: entry.id,
            display_name: entry.display_name.clone(),
            position: spawn,
            health: MAX_HEALTH,
            armor: 0.0,
            inventory: Inventory::starting(),
            kills: 0,
            alive: true,
            last_fire_at: None,
            death_at: None,
        }
    }

    /// Subtract health; returns true if this damage killed the player.
    ///
    /// Dead players are never revived and take no further damage.
    pub fn take_damage(&mut self, amount: f32, now: Duration) -> bool {
        if !self.alive {
            return false;
        }
        self.health -= amount;
        if self.health <= 0.0 {
            self.health = 0.0;
            self.alive = false;
            self.death_at = Some(now);
            return true;
        }
        false
    }

    pub fn heal(&mut self, amount: f32) {
        if self.alive {
            self.health = (self.health + amount).min(MAX_HEALTH);
        }
    }

    /// Armor does not stack, the better piece wins
    pub fn equip_armor(&mut self, defense: f32) {
        self.armor = self.armor.max(defense.min(MAX_ARMOR));
    }
}

/// Why a match ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchOutcome {
    /// Single survivor
    Winner { player_id: PlayerId },
    /// Last players eliminated on the same tick
    NoWinner,
    /// Stopped externally at a tick boundary
    Aborted { reason: String },
}

/// Match lifecycle, `Running -> Ended` only
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchStatus {
    Running,
    Ended { outcome: MatchOutcome },
}

impl MatchStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, MatchStatus::Running)
    }
}

/// Full match state, owned by the driver
#[derive(Debug, Clone)]
pub struct MatchState {
    pub id: Uuid,
    pub seed: u64,
    pub tick: u64,
    /// Simulated time since match start
    pub clock: Duration,
    pub started_at: DateTime<Utc>,
    pub status: MatchStatus,
    /// Join order, never reordered or shrunk
    pub players: Vec<PlayerState>,
    pub zone: SafeZone,
    pub loot: Vec<LootItem>,
    pub rng: ChaCha8Rng,
}

impl MatchState {
    /// Count alive players
    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.alive).count()
    }
}
