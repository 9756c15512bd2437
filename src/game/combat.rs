//! Combat system - movement, hit-scan shooting, damage and kill credit

use std::time::Duration;

use super::events::{DeathCause, GameEvent};
use super::physics::{Arena, PhysicsSystem, Vec2};
use super::state::PlayerState;
use super::TickInput;

/// Minimum time between accepted fire attempts
pub const FIRE_COOLDOWN: Duration = Duration::from_millis(200);
/// Targets must be closer than this to the shooter
pub const HIT_RANGE: f32 = 50.0;
/// Max perpendicular distance between a target and the aim ray
pub const AIM_TOLERANCE: f32 = 20.0;
/// Damage per hit
pub const HIT_DAMAGE: f32 = 20.0;

/// Combat rules
pub struct CombatSystem;

impl CombatSystem {
    /// Check if a player can fire (cooldown check)
    pub fn can_fire(last_fire_at: Option<Duration>, now: Duration) -> bool {
        match last_fire_at {
            Some(last) => now.saturating_sub(last) >= FIRE_COOLDOWN,
            None => true,
        }
    }

    /// Hit-scan test against one target.
    ///
    /// `direction` must be a unit vector. The target has to be within range,
    /// in front of the shooter and close enough to the aim ray.
    pub fn is_hit(shooter: Vec2, direction: Vec2, target: Vec2) -> bool {
        let offset = target - shooter;
        if offset.length() >= HIT_RANGE {
            return false;
        }
        let along = offset.dot(direction);
        if along <= 0.0 {
            return false;
        }
        let lateral = (offset.x * direction.y - offset.y * direction.x).abs();
        lateral < AIM_TOLERANCE
    }
}

/// Move every alive player, then resolve fire inputs in join order.
///
/// `inputs[i]` belongs to `players[i]`. One accepted shot may hit several
/// distinct targets, each at most once. A player eliminated by an earlier
/// shooter in the same tick does not get to fire.
pub fn resolve(
    players: &mut [PlayerState],
    inputs: &[TickInput],
    dt: Duration,
    now: Duration,
    arena: &Arena,
) -> Vec<GameEvent> {
    for (player, input) in players.iter_mut().zip(inputs) {
        if player.alive {
            player.position = PhysicsSystem::integrate(player.position, input.movement, dt, arena);
        }
    }

    let mut events = Vec::new();
    for (shooter_idx, input) in inputs.iter().enumerate().take(players.len()) {
        if input.fire {
            if let Some(aim) = input.aim {
                fire(players, shooter_idx, aim, now, &mut events);
            }
        }
    }
    events
}

fn fire(
    players: &mut [PlayerState],
    shooter_idx: usize,
    aim: Vec2,
    now: Duration,
    events: &mut Vec<GameEvent>,
) {
    let shooter = &mut players[shooter_idx];
    if !shooter.alive || !CombatSystem::can_fire(shooter.last_fire_at, now) {
        return;
    }
    shooter.last_fire_at = Some(now);

    let origin = shooter.position;
    let shooter_id = shooter.id;
    // Aiming at yourself is a miss
    let Some(direction) = (aim - origin).normalized() else {
        return;
    };

    let hits: Vec<usize> = players
        .iter()
        .enumerate()
        .filter(|(idx, target)| *idx != shooter_idx && target.alive)
        .filter(|(_, target)| CombatSystem::is_hit(origin, direction, target.position))
        .map(|(target_idx, _)| target_idx)
        .collect();

    for target_idx in hits {
        // Flat damage; armor does not reduce hits
        let target = &mut players[target_idx];
        let killed = target.take_damage(HIT_DAMAGE, now);
        let victim_id = target.id;
        events.push(GameEvent::PlayerHit {
            shooter_id,
            target_id: victim_id,
            damage: HIT_DAMAGE,
            health_after: target.health,
        });

        if killed {
            players[shooter_idx].kills += 1;
            events.push(GameEvent::PlayerKilled {
                killer_id: Some(shooter_id),
                victim_id,
                cause: DeathCause::Shot,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::physics::MoveIntent;
    use crate::game::state::RosterEntry;
    use uuid::Uuid;

    const DT: Duration = Duration::from_millis(50);

    fn player_at(x: f32, y: f32) -> PlayerState {
        let entry = RosterEntry {
            id: Uuid::new_v4(),
            display_name: "p".to_string(),
        };
        PlayerState::new(&entry, Vec2::new(x, y))
    }

    fn shoot_at(x: f32, y: f32) -> TickInput {
        TickInput {
            aim: Some(Vec2::new(x, y)),
            fire: true,
            ..Default::default()
        }
    }

    #[test]
    fn hit_requires_range_and_alignment() {
        let origin = Vec2::new(100.0, 100.0);
        let right = Vec2::new(1.0, 0.0);
        assert!(CombatSystem::is_hit(origin, right, Vec2::new(140.0, 110.0)));
        assert!(!CombatSystem::is_hit(origin, right, Vec2::new(160.0, 100.0)));
        assert!(!CombatSystem::is_hit(origin, right, Vec2::new(110.0, 125.0)));
        assert!(!CombatSystem::is_hit(origin, right, Vec2::new(70.0, 100.0)));
    }

    #[test]
    fn cooldown_window() {
        assert!(CombatSystem::can_fire(None, Duration::ZERO));
        let last = Some(Duration::from_millis(1000));
        assert!(!CombatSystem::can_fire(last, Duration::from_millis(1199)));
        assert!(CombatSystem::can_fire(last, Duration::from_millis(1200)));
    }

    #[test]
    fn hit_deals_flat_damage_through_armor() {
        let mut players = vec![player_at(100.0, 100.0), player_at(130.0, 100.0)];
        players[1].equip_armor(50.0);
        let inputs = vec![shoot_at(200.0, 100.0), TickInput::default()];

        let events = resolve(&mut players, &inputs, DT, Duration::ZERO, &Arena::STANDARD);

        assert_eq!(players[1].health, 80.0);
        assert_eq!(
            events,
            vec![GameEvent::PlayerHit {
                shooter_id: players[0].id,
                target_id: players[1].id,
                damage: HIT_DAMAGE,
                health_after: 80.0,
            }]
        );
    }

    #[test]
    fn fire_inside_cooldown_is_ignored() {
        let mut players = vec![player_at(100.0, 100.0), player_at(130.0, 100.0)];
        let inputs = vec![shoot_at(200.0, 100.0), TickInput::default()];

        resolve(&mut players, &inputs, DT, Duration::from_millis(0), &Arena::STANDARD);
        let second = resolve(&mut players, &inputs, DT, Duration::from_millis(150), &Arena::STANDARD);
        assert!(second.is_empty());
        assert_eq!(players[1].health, 80.0);

        let third = resolve(&mut players, &inputs, DT, Duration::from_millis(200), &Arena::STANDARD);
        assert_eq!(third.len(), 1);
        assert_eq!(players[1].health, 60.0);
    }

    #[test]
    fn degenerate_aim_is_a_miss_that_uses_the_shot() {
        let mut players = vec![player_at(100.0, 100.0), player_at(110.0, 100.0)];
        let inputs = vec![shoot_at(100.0, 100.0), TickInput::default()];

        let events = resolve(&mut players, &inputs, DT, Duration::from_secs(1), &Arena::STANDARD);

        assert!(events.is_empty());
        assert_eq!(players[1].health, 100.0);
        assert_eq!(players[0].last_fire_at, Some(Duration::from_secs(1)));
    }

    #[test]
    fn one_shot_can_kill_several_targets_once_each() {
        let mut players = vec![
            player_at(100.0, 100.0),
            player_at(120.0, 100.0),
            player_at(140.0, 105.0),
        ];
        players[1].health = 20.0;
        players[2].health = 10.0;
        let inputs = vec![shoot_at(300.0, 100.0), TickInput::default(), TickInput::default()];

        let events = resolve(&mut players, &inputs, DT, Duration::ZERO, &Arena::STANDARD);

        assert!(!players[1].alive);
        assert!(!players[2].alive);
        assert_eq!(players[0].kills, 2);
        let kills = events
            .iter()
            .filter(|e| matches!(e, GameEvent::PlayerKilled { .. }))
            .count();
        assert_eq!(kills, 2);
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn shooter_killed_earlier_in_tick_does_not_fire() {
        let mut players = vec![player_at(100.0, 100.0), player_at(130.0, 100.0)];
        players[1].health = 20.0;
        let inputs = vec![shoot_at(200.0, 100.0), shoot_at(0.0, 100.0)];

        resolve(&mut players, &inputs, DT, Duration::ZERO, &Arena::STANDARD);

        assert!(!players[1].alive);
        assert_eq!(players[0].health, 100.0);
        assert_eq!(players[1].last_fire_at, None);
    }

    #[test]
    fn dead_players_do_not_move() {
        let mut players = vec![player_at(100.0, 100.0)];
        players[0].take_damage(100.0, Duration::ZERO);
        let inputs = vec![TickInput {
            movement: MoveIntent { right: true, ..Default::default() },
            ..Default::default()
        }];

        resolve(&mut players, &inputs, DT, Duration::ZERO, &Arena::STANDARD);
        assert_eq!(players[0].position, Vec2::new(100.0, 100.0));
    }
}
