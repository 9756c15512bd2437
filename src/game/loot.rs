//! Loot table, spawner and pickup resolution

use rand::distributions::{Distribution, Uniform, WeightedIndex};
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use super::events::GameEvent;
use super::physics::{Arena, Vec2};
use super::state::PlayerState;

/// Max distance (exclusive) at which a player can pick an item up
pub const PICKUP_RADIUS: f32 = 30.0;
/// Items spawned per match unless configured otherwise
pub const DEFAULT_LOOT_COUNT: usize = 30;

/// Loot identifier, unique within a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LootId(pub u32);

impl fmt::Display for LootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loot_{}", self.0)
    }
}

/// Category and payload of a loot item
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum LootKind {
    Weapon { name: String, ammo: u32 },
    Armor { name: String, defense: f32 },
    Health { name: String, heal: f32 },
}

impl LootKind {
    pub fn name(&self) -> &str {
        match self {
            LootKind::Weapon { name, .. }
            | LootKind::Armor { name, .. }
            | LootKind::Health { name, .. } => name,
        }
    }
}

/// Loot lying in the arena
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LootItem {
    pub id: LootId,
    pub kind: LootKind,
    pub position: Vec2,
}

impl LootItem {
    /// Apply this item to a player
    pub fn apply_to(&self, player: &mut PlayerState) {
        match &self.kind {
            LootKind::Weapon { name, ammo } => player.inventory.add_weapon(name, *ammo),
            LootKind::Armor { defense, .. } => player.equip_armor(*defense),
            LootKind::Health { heal, .. } => player.heal(*heal),
        }
    }
}

/// Catalog entry with its relative spawn weight
#[derive(Debug, Clone)]
pub struct LootEntry {
    pub kind: LootKind,
    pub weight: u32,
}

/// Weighted item catalog
#[derive(Debug, Clone)]
pub struct LootTable {
    entries: Vec<LootEntry>,
}

impl LootTable {
    pub fn new(entries: Vec<LootEntry>) -> Self {
        Self { entries }
    }

    /// Generate `count` items at uniform positions inside the arena.
    ///
    /// Returns `None` when the table is empty or every weight is zero.
    pub fn spawn<R: Rng>(&self, count: usize, arena: &Arena, rng: &mut R) -> Option<Vec<LootItem>> {
        let picker = WeightedIndex::new(self.entries.iter().map(|e| e.weight)).ok()?;
        let xs = Uniform::new_inclusive(arena.min.x, arena.max.x);
        let ys = Uniform::new_inclusive(arena.min.y, arena.max.y);

        let items = (0..count)
            .map(|i| {
                let entry = &self.entries[picker.sample(rng)];
                LootItem {
                    id: LootId(i as u32),
                    kind: entry.kind.clone(),
                    position: Vec2::new(xs.sample(rng), ys.sample(rng)),
                }
            })
            .collect();

        Some(items)
    }
}

impl Default for LootTable {
    fn default() -> Self {
        let weapon = |name: &str, ammo| LootKind::Weapon { name: name.to_string(), ammo };
        let armor = |name: &str, defense| LootKind::Armor { name: name.to_string(), defense };
        let health = |name: &str, heal| LootKind::Health { name: name.to_string(), heal };

        Self::new(
            [
                weapon("pistol", 30),
                weapon("rifle", 60),
                weapon("shotgun", 20),
                armor("vest", 50.0),
                armor("helmet", 30.0),
                health("medkit", 50.0),
                health("bandage", 20.0),
            ]
            .into_iter()
            .map(|kind| LootEntry { kind, weight: 1 })
            .collect(),
        )
    }
}

/// First id that appears more than once, if any
pub fn find_duplicate_id(items: &[LootItem]) -> Option<LootId> {
    let mut seen = HashSet::with_capacity(items.len());
    items.iter().map(|i| i.id).find(|id| !seen.insert(*id))
}

/// Nearest item within pickup range of `position`; ties go to the lowest id
pub fn nearest_eligible(loot: &[LootItem], position: Vec2) -> Option<usize> {
    loot.iter()
        .enumerate()
        .map(|(idx, item)| (idx, item.position.distance(position), item.id))
        .filter(|(_, dist, _)| *dist < PICKUP_RADIUS)
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.2.cmp(&b.2)))
        .map(|(idx, _, _)| idx)
}

/// Apply pickups for every player whose input requested one.
///
/// `requests[i]` belongs to `players[i]`. Players are processed in join
/// order and a claimed item is removed before the next player is checked,
/// so contested items go to the earliest joiner.
pub fn resolve_pickups(
    players: &mut [PlayerState],
    loot: &mut Vec<LootItem>,
    requests: &[bool],
) -> Vec<GameEvent> {
    let mut events = Vec::new();

    for (player, _) in players
        .iter_mut()
        .zip(requests)
        .filter(|(p, requested)| p.alive && **requested)
    {
        let Some(idx) = nearest_eligible(loot, player.position) else {
            continue;
        };
        let item = loot.remove(idx);
        item.apply_to(player);
        debug!(player_id = %player.id, item = item.kind.name(), "Loot claimed");
        events.push(GameEvent::LootClaimed {
            player_id: player.id,
            item_id: item.id,
        });
    }

    events
}
