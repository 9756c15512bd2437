//! Safe zone - shrinking circle and damage outside it

use rand::Rng;
use std::time::Duration;

use crate::util::time::per_second;

use super::events::{DeathCause, GameEvent};
use super::physics::{PhysicsSystem, Vec2};
use super::state::PlayerState;

/// Each shrink multiplies the radius by this factor
pub const SHRINK_FACTOR: f32 = 0.6;
/// Time between shrinks
pub const SHRINK_INTERVAL: Duration = Duration::from_secs(180);
/// Smallest radius the zone shrinks to; past this it stays put
pub const MIN_ZONE_RADIUS: f32 = 1.0;
/// Health lost per second outside the zone (0.5 per tick at 60 Hz)
pub const ZONE_DAMAGE_PER_SECOND: f32 = per_second(0.5);

/// Initial zone layout
#[derive(Debug, Clone)]
pub struct ZoneConfig {
    pub center: Vec2,
    pub initial_radius: f32,
    pub next_radius: f32,
    /// Delay from match start to the first shrink
    pub first_shrink_after: Duration,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            center: Vec2::new(500.0, 300.0),
            initial_radius: 300.0,
            next_radius: 200.0,
            first_shrink_after: SHRINK_INTERVAL,
        }
    }
}

/// Current safe zone geometry
#[derive(Debug, Clone, PartialEq)]
pub struct SafeZone {
    pub center: Vec2,
    pub radius: f32,
    /// Radius after the next shrink, always below `radius`
    pub next_radius: f32,
    /// Match clock time of the next shrink
    pub shrink_deadline: Duration,
}

impl SafeZone {
    pub fn new(config: &ZoneConfig) -> Self {
        Self {
            center: config.center,
            radius: config.initial_radius,
            next_radius: config.next_radius,
            shrink_deadline: config.first_shrink_after,
        }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        PhysicsSystem::is_in_circle(p, self.center, self.radius)
    }

    /// No further shrink would keep the radius above the floor
    pub fn is_final(&self) -> bool {
        self.next_radius < MIN_ZONE_RADIUS
    }

    /// Time left until the next shrink
    pub fn time_until_shrink(&self, now: Duration) -> Duration {
        self.shrink_deadline.saturating_sub(now)
    }
}

/// Shrink the zone if its deadline has passed.
///
/// The new center is the position of a uniformly chosen alive player; with
/// nobody alive the zone keeps its center. A final zone never shrinks again.
pub fn advance<R: Rng>(
    zone: &mut SafeZone,
    now: Duration,
    players: &[PlayerState],
    rng: &mut R,
) -> Option<GameEvent> {
    if now < zone.shrink_deadline || zone.is_final() {
        return None;
    }

    zone.radius = zone.next_radius;
    zone.next_radius = zone.radius * SHRINK_FACTOR;
    zone.shrink_deadline = now + SHRINK_INTERVAL;

    let alive: Vec<&PlayerState> = players.iter().filter(|p| p.alive).collect();
    if !alive.is_empty() {
        let target = alive[rng.gen_range(0..alive.len())];
        zone.center = target.position;
    }

    Some(GameEvent::ZoneShrunk {
        center: zone.center,
        radius: zone.radius,
        next_radius: zone.next_radius,
        next_shrink_at: zone.shrink_deadline.as_secs_f32(),
    })
}

/// Damage every alive player outside the zone, scaled by the tick delta.
///
/// Returns kill events for players the zone eliminated, in join order.
pub fn apply_damage(
    zone: &SafeZone,
    players: &mut [PlayerState],
    dt: Duration,
    now: Duration,
) -> Vec<GameEvent> {
    let damage = ZONE_DAMAGE_PER_SECOND * dt.as_secs_f32();
    let mut events = Vec::new();

    for player in players.iter_mut().filter(|p| p.alive) {
        if zone.contains(player.position) {
            continue;
        }
        if player.take_damage(damage, now) {
            events.push(GameEvent::PlayerKilled {
                killer_id: None,
                victim_id: player.id,
                cause: DeathCause::Zone,
            });
        }
    }

    events
}
