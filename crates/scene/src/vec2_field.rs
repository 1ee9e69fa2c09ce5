//! Visualizes the gravity field with a grid of oriented line segments.

use glam::Vec2;

use crate::entity::{EntityId, EntityTable};
use crate::gravity::GravityPhysicsSystem;

const MIN_LENGTH: f32 = 0.005;
const LENGTH_RANGE: f32 = 0.045;

/// Points each field entity along the net gravitational pull at its
/// position and scales its length by the log of the field strength.
#[derive(Clone, Copy, Debug, Default)]
pub struct Vec2FieldSystem;

impl Vec2FieldSystem {
    pub fn new() -> Self {
        Self
    }

    pub fn update(&self, gravity: &GravityPhysicsSystem, table: &mut EntityTable, field: &[EntityId]) {
        let sources: Vec<(Vec2, f32)> = table
            .physics_ids()
            .into_iter()
            .filter_map(|id| Some((table.transform(id)?.translation, table.body(id)?.mass)))
            .collect();

        for &id in field {
            let Some(transform) = table.transform_mut(id) else {
                continue;
            };

            let direction: Vec2 = sources
                .iter()
                .map(|&(pos, mass)| gravity.compute_force(pos, mass, transform.translation, 1.0))
                .sum();

            transform.scale.x = field_line_length(direction);
            transform.rotation = direction.y.atan2(direction.x);
        }
    }
}

/// `0.005 + 0.045 * clamp(ln(|d| + 1) / 3, 0, 1)`
pub fn field_line_length(direction: Vec2) -> f32 {
    MIN_LENGTH + LENGTH_RANGE * ((direction.length() + 1.0).ln() / 3.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use crate::transform::{RigidBody2d, Transform2d};

    use super::*;

    #[test]
    fn test_length_bounds() {
        assert!((field_line_length(Vec2::ZERO) - MIN_LENGTH).abs() < 1e-7);
        let huge = field_line_length(Vec2::new(1e6, 0.0));
        assert!((huge - (MIN_LENGTH + LENGTH_RANGE)).abs() < 1e-7);
    }

    #[test]
    fn test_field_points_at_body() {
        let gravity = GravityPhysicsSystem::new(1.0);
        let mut table = EntityTable::new();

        let body = table.spawn(Transform2d::new().with_translation(Vec2::new(-1.0, 0.0)));
        table.set_body(body, RigidBody2d::default());
        let line = table.spawn(Transform2d::new().with_scale(Vec2::new(1.0, 0.005)));

        Vec2FieldSystem::new().update(&gravity, &mut table, &[line]);

        let transform = table.transform(line).unwrap();
        assert!((transform.rotation.abs() - PI).abs() < 1e-5);
        // |force| = 1, so ln(2) / 3 of the range
        let expected = MIN_LENGTH + LENGTH_RANGE * (2.0f32.ln() / 3.0);
        assert!((transform.scale.x - expected).abs() < 1e-6);
        assert_eq!(transform.scale.y, 0.005);
    }
}
