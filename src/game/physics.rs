//! Geometry helpers and player movement integration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::util::time::per_second;

/// Player movement speed (3 units per frame at the reference rate)
pub const MOVE_SPEED: f32 = per_second(3.0);

/// Below this length a direction is treated as degenerate
pub const DIRECTION_EPSILON: f32 = 1e-4;

/// 2D point / vector in arena units
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    /// Euclidean distance to another point
    pub fn distance(self, other: Vec2) -> f32 {
        (other - self).length()
    }

    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Unit vector in the same direction, `None` for degenerate input
    pub fn normalized(self) -> Option<Vec2> {
        let len = self.length();
        if len < DIRECTION_EPSILON {
            return None;
        }
        Some(Vec2::new(self.x / len, self.y / len))
    }

    pub fn scale(self, factor: f32) -> Vec2 {
        Vec2::new(self.x * factor, self.y * factor)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Rectangular play area
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    pub min: Vec2,
    pub max: Vec2,
}

impl Arena {
    /// 1000x600 field with a 20 unit margin for the player body
    pub const STANDARD: Arena = Arena {
        min: Vec2::new(20.0, 20.0),
        max: Vec2::new(980.0, 580.0),
    };

    /// Clamp a point into the arena rectangle
    pub fn clamp(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            p.x.clamp(self.min.x, self.max.x),
            p.y.clamp(self.min.y, self.max.y),
        )
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Directional intents held by a player this tick (y grows downwards)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveIntent {
    #[serde(default)]
    pub up: bool,
    #[serde(default)]
    pub down: bool,
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
}

impl MoveIntent {
    /// Resolve intents into a direction with length 0 or 1.
    ///
    /// Opposite intents cancel. With one horizontal and one vertical intent
    /// active, each axis is scaled by 1/√2 so diagonals are not faster.
    pub fn direction(self) -> Vec2 {
        let dx = (self.right as i8 - self.left as i8) as f32;
        let dy = (self.down as i8 - self.up as i8) as f32;
        if dx != 0.0 && dy != 0.0 {
            Vec2::new(dx, dy).scale(std::f32::consts::FRAC_1_SQRT_2)
        } else {
            Vec2::new(dx, dy)
        }
    }
}

/// Movement integration for players
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Integrate one step of movement and clamp to the arena
    pub fn integrate(position: Vec2, intent: MoveIntent, dt: Duration, arena: &Arena) -> Vec2 {
        let velocity = intent.direction().scale(MOVE_SPEED);
        arena.clamp(position + velocity.scale(dt.as_secs_f32()))
    }

    /// Check if a point is inside a circle (boundary counts as inside)
    pub fn is_in_circle(p: Vec2, center: Vec2, radius: f32) -> bool {
        p.distance(center) <= radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CENTER: Vec2 = Vec2::new(500.0, 300.0);
    const DT: Duration = Duration::from_millis(100);

    #[test]
    fn diagonal_is_not_faster_than_axial() {
        let axial = PhysicsSystem::integrate(
            CENTER,
            MoveIntent { right: true, ..Default::default() },
            DT,
            &Arena::STANDARD,
        );
        let diagonal = PhysicsSystem::integrate(
            CENTER,
            MoveIntent { right: true, down: true, ..Default::default() },
            DT,
            &Arena::STANDARD,
        );

        let axial_len = axial.distance(CENTER);
        let diagonal_len = diagonal.distance(CENTER);
        assert!((axial_len - MOVE_SPEED * 0.1).abs() < 1e-3);
        assert!((axial_len - diagonal_len).abs() < 1e-3);
    }

    #[test]
    fn opposite_intents_cancel() {
        let intent = MoveIntent { up: true, down: true, left: true, ..Default::default() };
        assert_eq!(intent.direction(), Vec2::new(-1.0, 0.0));

        let all = MoveIntent { up: true, down: true, left: true, right: true };
        assert_eq!(all.direction(), Vec2::ZERO);
    }

    #[test]
    fn movement_is_clamped_to_arena() {
        let corner = Vec2::new(25.0, 25.0);
        let moved = PhysicsSystem::integrate(
            corner,
            MoveIntent { up: true, left: true, ..Default::default() },
            Duration::from_secs(1),
            &Arena::STANDARD,
        );
        assert_eq!(moved, Arena::STANDARD.min);
        assert!(Arena::STANDARD.clamp(moved) == moved);
    }

    #[test]
    fn degenerate_vector_has_no_direction() {
        assert!(Vec2::ZERO.normalized().is_none());
        let unit = Vec2::new(3.0, 4.0).normalized().unwrap();
        assert!((unit.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn circle_boundary_counts_as_inside() {
        assert!(PhysicsSystem::is_in_circle(Vec2::new(10.0, 0.0), Vec2::ZERO, 10.0));
        assert!(!PhysicsSystem::is_in_circle(Vec2::new(10.1, 0.0), Vec2::ZERO, 10.0));
    }
}
