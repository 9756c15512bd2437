//! Match simulation driver - one deterministic tick at a time

use chrono::Utc;
use rand::distributions::{Distribution, Uniform};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::events::GameEvent;
use super::loot::{self, LootId, LootItem, LootTable, DEFAULT_LOOT_COUNT};
use super::physics::{Arena, Vec2};
use super::state::{MatchOutcome, MatchState, MatchStatus, PlayerId, PlayerState, RosterEntry};
use super::stats::MatchStats;
use super::zone::{self, SafeZone, ZoneConfig};
use super::{combat, TickInput};

/// Default roster cap
pub const DEFAULT_MAX_PLAYERS: usize = 16;

/// Static parameters of a match
#[derive(Debug, Clone)]
pub struct MatchConfig {
    pub arena: Arena,
    pub zone: ZoneConfig,
    pub loot_table: LootTable,
    pub loot_count: usize,
    pub max_players: usize,
    /// Players spawn uniformly inside this rectangle
    pub spawn_area: Arena,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            arena: Arena::STANDARD,
            zone: ZoneConfig::default(),
            loot_table: LootTable::default(),
            loot_count: DEFAULT_LOOT_COUNT,
            max_players: DEFAULT_MAX_PLAYERS,
            spawn_area: Arena {
                min: Vec2::new(100.0, 50.0),
                max: Vec2::new(900.0, 450.0),
            },
        }
    }
}

/// Structural problems that keep a match from starting
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StartError {
    #[error("Roster has no players")]
    EmptyRoster,

    #[error("Roster has {count} players, limit is {max}")]
    RosterTooLarge { count: usize, max: usize },

    #[error("Player {0} appears more than once in the roster")]
    DuplicatePlayer(PlayerId),

    #[error("Zone radius must be positive and finite")]
    InvalidZoneRadius,

    #[error("Next zone radius must be smaller than the current radius")]
    NextRadiusNotSmaller,

    #[error("Loot id {0} is not unique")]
    DuplicateLootId(LootId),

    #[error("Loot table has no spawnable entries")]
    InvalidLootTable,
}

/// Outcome of a single tick, committed atomically
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: u64,
    pub events: Vec<GameEvent>,
    pub status: MatchStatus,
}

/// Authoritative driver owning the match state
#[derive(Debug)]
pub struct Match {
    state: MatchState,
    config: MatchConfig,
}

impl Match {
    /// Validate the roster and config, spawn players and loot, enter `Running`
    pub fn start(
        id: Uuid,
        roster: &[RosterEntry],
        config: MatchConfig,
        seed: u64,
    ) -> Result<Self, StartError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let loot = if config.loot_count == 0 {
            Vec::new()
        } else {
            config
                .loot_table
                .spawn(config.loot_count, &config.arena, &mut rng)
                .ok_or(StartError::InvalidLootTable)?
        };
        Self::start_with_loot(id, roster, config, loot, rng, seed)
    }

    /// Start with an explicit loot field instead of the spawner's
    pub fn start_with_loot(
        id: Uuid,
        roster: &[RosterEntry],
        config: MatchConfig,
        loot: Vec<LootItem>,
        mut rng: ChaCha8Rng,
        seed: u64,
    ) -> Result<Self, StartError> {
        validate_roster(roster, config.max_players)?;
        validate_zone(&config.zone)?;
        if let Some(dup) = loot::find_duplicate_id(&loot) {
            return Err(StartError::DuplicateLootId(dup));
        }

        let xs = Uniform::new_inclusive(config.spawn_area.min.x, config.spawn_area.max.x);
        let ys = Uniform::new_inclusive(config.spawn_area.min.y, config.spawn_area.max.y);
        let players = roster
            .iter()
            .map(|entry| {
                let spawn = config.arena.clamp(Vec2::new(xs.sample(&mut rng), ys.sample(&mut rng)));
                PlayerState::new(entry, spawn)
            })
            .collect::<Vec<_>>();

        let state = MatchState {
            id,
            seed,
            tick: 0,
            clock: Duration::ZERO,
            started_at: Utc::now(),
            status: MatchStatus::Running,
            players,
            zone: SafeZone::new(&config.zone),
            loot,
            rng,
        };

        info!(
            match_id = %id,
            players = state.players.len(),
            loot = state.loot.len(),
            "Match started"
        );

        Ok(Self { state, config })
    }

    /// Committed state, read-only
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.status.is_running()
    }

    /// Advance the match by `dt`.
    ///
    /// Order: zone, movement and shooting, pickups, win check. Inputs for
    /// unknown ids are ignored; players without an entry idle. Once ended,
    /// further ticks change nothing and report the terminal status.
    pub fn tick(&mut self, dt: Duration, inputs: &HashMap<PlayerId, TickInput>) -> TickReport {
        if !self.is_running() {
            return self.report(Vec::new());
        }

        let state = &mut self.state;
        state.tick += 1;
        state.clock += dt;
        let now = state.clock;

        let mut events = Vec::new();

        if let Some(shrunk) = zone::advance(&mut state.zone, now, &state.players, &mut state.rng) {
            debug!(match_id = %state.id, radius = state.zone.radius, "Zone shrunk");
            events.push(shrunk);
        }
        events.extend(zone::apply_damage(&state.zone, &mut state.players, dt, now));

        let aligned: Vec<TickInput> = state
            .players
            .iter()
            .map(|p| inputs.get(&p.id).copied().unwrap_or_default())
            .collect();
        events.extend(combat::resolve(
            &mut state.players,
            &aligned,
            dt,
            now,
            &self.config.arena,
        ));

        let pickups: Vec<bool> = aligned.iter().map(|i| i.pickup).collect();
        events.extend(loot::resolve_pickups(&mut state.players, &mut state.loot, &pickups));

        for event in &events {
            if let GameEvent::PlayerKilled { killer_id, victim_id, cause } = event {
                debug!(match_id = %state.id, victim = %victim_id, killer = ?killer_id, ?cause, "Player eliminated");
            }
        }

        if let Some(ended) = self.check_win_condition() {
            events.push(ended);
        }

        self.report(events)
    }

    /// Stop the match between ticks. Returns false if it had already ended.
    pub fn abort(&mut self, reason: impl Into<String>) -> bool {
        if !self.is_running() {
            return false;
        }
        let reason = reason.into();
        info!(match_id = %self.state.id, tick = self.state.tick, %reason, "Match aborted");
        self.state.status = MatchStatus::Ended {
            outcome: MatchOutcome::Aborted { reason },
        };
        true
    }

    /// Per-player results, only for matches that ended with a win or draw
    pub fn stats(&self) -> Option<MatchStats> {
        MatchStats::from_state(&self.state)
    }

    fn check_win_condition(&mut self) -> Option<GameEvent> {
        let outcome = match self.state.alive_count() {
            0 => MatchOutcome::NoWinner,
            1 => {
                let winner = self.state.players.iter().find(|p| p.alive)?;
                MatchOutcome::Winner { player_id: winner.id }
            }
            _ => return None,
        };

        let winner_id = match &outcome {
            MatchOutcome::Winner { player_id } => Some(*player_id),
            _ => None,
        };
        info!(
            match_id = %self.state.id,
            tick = self.state.tick,
            winner = ?winner_id,
            "Match ended"
        );
        self.state.status = MatchStatus::Ended { outcome };
        Some(GameEvent::MatchEnded { winner_id })
    }

    fn report(&self, events: Vec<GameEvent>) -> TickReport {
        TickReport {
            tick: self.state.tick,
            events,
            status: self.state.status.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut MatchState {
        &mut self.state
    }
}

fn validate_roster(roster: &[RosterEntry], max_players: usize) -> Result<(), StartError> {
    if roster.is_empty() {
        return Err(StartError::EmptyRoster);
    }
    if roster.len() > max_players {
        return Err(StartError::RosterTooLarge {
            count: roster.len(),
            max: max_players,
        });
    }
    let mut seen = HashSet::with_capacity(roster.len());
    match roster.iter().find(|entry| !seen.insert(entry.id)) {
        Some(dup) => Err(StartError::DuplicatePlayer(dup.id)),
        None => Ok(()),
    }
}

fn validate_zone(zone: &ZoneConfig) -> Result<(), StartError> {
    let positive = |r: f32| r.is_finite() && r > 0.0;
    if !positive(zone.initial_radius) || !positive(zone.next_radius) {
        return Err(StartError::InvalidZoneRadius);
    }
    if zone.next_radius >= zone.initial_radius {
        return Err(StartError::NextRadiusNotSmaller);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::DeathCause;
    use crate::game::loot::LootKind;
    use crate::game::physics::MoveIntent;
    use crate::game::zone::SHRINK_INTERVAL;

    const DT: Duration = Duration::from_millis(50);

    fn roster(n: usize) -> Vec<RosterEntry> {
        (0..n)
            .map(|i| RosterEntry {
                id: Uuid::new_v4(),
                display_name: format!("player{i}"),
            })
            .collect()
    }

    fn start(n: usize) -> Match {
        Match::start(Uuid::new_v4(), &roster(n), MatchConfig::default(), 42).unwrap()
    }

    fn place(m: &mut Match, idx: usize, x: f32, y: f32) {
        m.state_mut().players[idx].position = Vec2::new(x, y);
    }

    fn no_input() -> HashMap<PlayerId, TickInput> {
        HashMap::new()
    }

    #[test]
    fn start_rejects_structural_problems() {
        let id = Uuid::new_v4();
        assert_eq!(
            Match::start(id, &[], MatchConfig::default(), 1).unwrap_err(),
            StartError::EmptyRoster
        );

        let mut dup = roster(2);
        dup[1].id = dup[0].id;
        assert_eq!(
            Match::start(id, &dup, MatchConfig::default(), 1).unwrap_err(),
            StartError::DuplicatePlayer(dup[0].id)
        );

        let mut config = MatchConfig::default();
        config.zone.initial_radius = -5.0;
        assert_eq!(
            Match::start(id, &roster(2), config, 1).unwrap_err(),
            StartError::InvalidZoneRadius
        );

        let mut config = MatchConfig::default();
        config.zone.next_radius = 0.0;
        assert_eq!(
            Match::start(id, &roster(2), config, 1).unwrap_err(),
            StartError::InvalidZoneRadius
        );

        let mut config = MatchConfig::default();
        config.zone.next_radius = f32::NAN;
        assert_eq!(
            Match::start(id, &roster(2), config, 1).unwrap_err(),
            StartError::InvalidZoneRadius
        );

        let mut config = MatchConfig::default();
        config.zone.next_radius = 300.0;
        assert_eq!(
            Match::start(id, &roster(2), config, 1).unwrap_err(),
            StartError::NextRadiusNotSmaller
        );

        let mut config = MatchConfig::default();
        config.max_players = 2;
        assert_eq!(
            Match::start(id, &roster(3), config, 1).unwrap_err(),
            StartError::RosterTooLarge { count: 3, max: 2 }
        );

        let mut config = MatchConfig::default();
        config.loot_table = LootTable::new(Vec::new());
        assert_eq!(
            Match::start(id, &roster(2), config, 1).unwrap_err(),
            StartError::InvalidLootTable
        );
    }

    #[test]
    fn start_rejects_duplicate_loot_ids() {
        let medkit = LootKind::Health { name: "medkit".to_string(), heal: 50.0 };
        let loot = vec![
            LootItem { id: LootId(3), kind: medkit.clone(), position: Vec2::ZERO },
            LootItem { id: LootId(3), kind: medkit, position: Vec2::ZERO },
        ];
        let err = Match::start_with_loot(
            Uuid::new_v4(),
            &roster(2),
            MatchConfig::default(),
            loot,
            ChaCha8Rng::seed_from_u64(1),
            1,
        )
        .unwrap_err();
        assert_eq!(err, StartError::DuplicateLootId(LootId(3)));
    }

    #[test]
    fn start_spawns_players_in_join_order_with_loadout() {
        let entries = roster(4);
        let m = Match::start(Uuid::new_v4(), &entries, MatchConfig::default(), 5).unwrap();
        let state = m.state();

        assert!(m.is_running());
        assert_eq!(state.loot.len(), DEFAULT_LOOT_COUNT);
        for (player, entry) in state.players.iter().zip(&entries) {
            assert_eq!(player.id, entry.id);
            assert!(m.config.spawn_area.clamp(player.position) == player.position);
            assert_eq!(player.health, 100.0);
        }
    }

    #[test]
    fn same_seed_same_match() {
        let entries = roster(3);
        let a = Match::start(Uuid::new_v4(), &entries, MatchConfig::default(), 9).unwrap();
        let b = Match::start(Uuid::new_v4(), &entries, MatchConfig::default(), 9).unwrap();
        let positions = |m: &Match| m.state().players.iter().map(|p| p.position).collect::<Vec<_>>();
        assert_eq!(positions(&a), positions(&b));
        assert_eq!(a.state().loot, b.state().loot);
    }

    #[test]
    fn zone_win_is_reported_on_the_tick_of_the_third_death() {
        let mut m = start(4);
        place(&mut m, 0, 500.0, 300.0);
        for (idx, health) in [(1, 10.0), (2, 20.0), (3, 29.0)] {
            place(&mut m, idx, 20.0, 20.0);
            m.state_mut().players[idx].health = health;
        }
        let survivor = m.state().players[0].id;

        // 1.5 hp per 50 ms tick outside the zone; 29 hp runs out on tick 20
        let mut ended_at = None;
        for _ in 0..40 {
            let report = m.tick(DT, &no_input());
            if let Some(GameEvent::MatchEnded { winner_id }) = report.events.last() {
                assert_eq!(*winner_id, Some(survivor));
                ended_at = Some(report.tick);
                break;
            }
        }

        assert_eq!(ended_at, Some(20));
        assert_eq!(m.state().alive_count(), 1);
        assert_eq!(
            m.state().status,
            MatchStatus::Ended {
                outcome: MatchOutcome::Winner { player_id: survivor }
            }
        );
    }

    #[test]
    fn simultaneous_last_deaths_end_without_winner() {
        let mut m = start(2);
        for idx in 0..2 {
            place(&mut m, idx, 20.0, 20.0);
            m.state_mut().players[idx].health = 1.0;
        }

        let report = m.tick(DT, &no_input());

        assert_eq!(report.events.last(), Some(&GameEvent::MatchEnded { winner_id: None }));
        assert_eq!(
            report.status,
            MatchStatus::Ended { outcome: MatchOutcome::NoWinner }
        );
        assert!(m.state().players.iter().all(|p| !p.alive && p.health <= 0.0));
    }

    #[test]
    fn ticks_after_end_are_no_ops() {
        let mut m = start(2);
        place(&mut m, 1, 20.0, 20.0);
        m.state_mut().players[1].health = 1.0;
        m.tick(DT, &no_input());
        let frozen_tick = m.state().tick;

        let mut inputs = HashMap::new();
        inputs.insert(
            m.state().players[0].id,
            TickInput {
                movement: MoveIntent { right: true, ..Default::default() },
                ..Default::default()
            },
        );
        let before = m.state().players[0].position;
        let report = m.tick(DT, &inputs);

        assert!(report.events.is_empty());
        assert_eq!(report.tick, frozen_tick);
        assert_eq!(m.state().players[0].position, before);
        assert!(!report.status.is_running());
    }

    #[test]
    fn shot_kill_credits_the_shooter() {
        let mut m = start(3);
        place(&mut m, 0, 500.0, 300.0);
        place(&mut m, 1, 530.0, 300.0);
        place(&mut m, 2, 600.0, 200.0);
        m.state_mut().players[1].health = 20.0;
        let (shooter, victim) = (m.state().players[0].id, m.state().players[1].id);

        let mut inputs = HashMap::new();
        inputs.insert(
            shooter,
            TickInput {
                aim: Some(Vec2::new(700.0, 300.0)),
                fire: true,
                ..Default::default()
            },
        );
        let report = m.tick(DT, &inputs);

        assert!(report.events.contains(&GameEvent::PlayerKilled {
            killer_id: Some(shooter),
            victim_id: victim,
            cause: DeathCause::Shot,
        }));
        assert_eq!(m.state().players[0].kills, 1);
        assert!(m.is_running());
    }

    #[test]
    fn unknown_input_ids_are_ignored() {
        let mut m = start(2);
        let mut inputs = HashMap::new();
        inputs.insert(
            Uuid::new_v4(),
            TickInput { fire: true, pickup: true, ..Default::default() },
        );
        let report = m.tick(DT, &inputs);
        assert_eq!(report.tick, 1);
        assert!(m.is_running());
    }

    #[test]
    fn contested_pickup_through_the_driver() {
        let medkit = LootKind::Health { name: "medkit".to_string(), heal: 50.0 };
        let loot = vec![LootItem { id: LootId(0), kind: medkit, position: Vec2::new(505.0, 300.0) }];
        let mut m = Match::start_with_loot(
            Uuid::new_v4(),
            &roster(2),
            MatchConfig::default(),
            loot,
            ChaCha8Rng::seed_from_u64(1),
            1,
        )
        .unwrap();
        place(&mut m, 0, 500.0, 300.0);
        place(&mut m, 1, 510.0, 300.0);

        let pickup = TickInput { pickup: true, ..Default::default() };
        let inputs: HashMap<_, _> = m.state().players.iter().map(|p| (p.id, pickup)).collect();
        let first = m.state().players[0].id;
        let report = m.tick(DT, &inputs);

        let claims: Vec<_> = report
            .events
            .iter()
            .filter_map(|e| match e {
                GameEvent::LootClaimed { player_id, .. } => Some(*player_id),
                _ => None,
            })
            .collect();
        assert_eq!(claims, vec![first]);
        assert!(m.state().loot.is_empty());
    }

    #[test]
    fn zone_shrink_happens_at_the_deadline() {
        let mut config = MatchConfig::default();
        config.zone.first_shrink_after = Duration::from_millis(100);
        let mut m = Match::start(Uuid::new_v4(), &roster(2), config, 3).unwrap();

        assert!(m.tick(DT, &no_input()).events.iter().all(|e| !matches!(e, GameEvent::ZoneShrunk { .. })));
        let report = m.tick(DT, &no_input());
        assert!(matches!(report.events.first(), Some(GameEvent::ZoneShrunk { .. })));
        assert_eq!(m.state().zone.radius, 200.0);
        assert_eq!(m.state().zone.shrink_deadline, Duration::from_millis(100) + SHRINK_INTERVAL);
    }

    #[test]
    fn abort_is_distinct_from_outcomes() {
        let mut m = start(3);
        assert!(m.abort("server shutdown"));
        assert!(!m.abort("again"));
        assert_eq!(
            m.state().status,
            MatchStatus::Ended {
                outcome: MatchOutcome::Aborted { reason: "server shutdown".to_string() }
            }
        );
        assert!(m.stats().is_none());
        assert!(m.tick(DT, &no_input()).events.is_empty());
    }

    #[test]
    fn health_and_alive_stay_consistent_over_a_long_match() {
        let mut m = start(6);
        let ids: Vec<_> = m.state().players.iter().map(|p| p.id).collect();
        let mut ever_dead = HashSet::new();

        for step in 0..2000u32 {
            let inputs: HashMap<_, _> = ids
                .iter()
                .enumerate()
                .map(|(i, id)| {
                    let input = TickInput {
                        movement: MoveIntent {
                            up: (step + i as u32) % 3 == 0,
                            right: (step + i as u32) % 2 == 0,
                            ..Default::default()
                        },
                        aim: Some(Vec2::new(500.0, 300.0)),
                        fire: step % 4 == 0,
                        pickup: true,
                    };
                    (*id, input)
                })
                .collect();
            m.tick(DT, &inputs);

            for p in &m.state().players {
                assert_eq!(p.health <= 0.0, !p.alive);
                if ever_dead.contains(&p.id) {
                    assert!(!p.alive);
                }
                if !p.alive {
                    ever_dead.insert(p.id);
                }
            }
            assert!(m.state().zone.next_radius < m.state().zone.radius);
        }
    }
}
