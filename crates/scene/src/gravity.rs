//! Pairwise Newtonian attraction between rigid bodies.

use glam::Vec2;

use crate::entity::EntityTable;

/// Squared distances below this produce no force.
const MIN_DISTANCE_SQUARED: f32 = 1e-10;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GravityPhysicsSystem {
    pub strength: f32,
}

impl GravityPhysicsSystem {
    pub fn new(strength: f32) -> Self {
        Self { strength }
    }

    /// Force pulling `to` towards `from`.
    ///
    /// Zero when the two points (nearly) coincide.
    pub fn compute_force(&self, from_pos: Vec2, from_mass: f32, to_pos: Vec2, to_mass: f32) -> Vec2 {
        let offset = from_pos - to_pos;
        let distance_squared = offset.length_squared();
        if distance_squared.abs() < MIN_DISTANCE_SQUARED {
            return Vec2::ZERO;
        }

        let force = self.strength * to_mass * from_mass / distance_squared;
        force * offset / distance_squared.sqrt()
    }

    /// Advance every entity with a rigid body by `dt`, split into `substeps`.
    ///
    /// Zero substeps is treated as one.
    pub fn update(&self, table: &mut EntityTable, dt: f32, substeps: u32) {
        let substeps = substeps.max(1);
        let step = dt / substeps as f32;
        for _ in 0..substeps {
            self.step(table, step);
        }
    }

    fn step(&self, table: &mut EntityTable, dt: f32) {
        let ids = table.physics_ids();

        for (i, &a) in ids.iter().enumerate() {
            for &b in &ids[i + 1..] {
                let (Some(pos_a), Some(body_a), Some(pos_b), Some(body_b)) = (
                    table.transform(a).map(|t| t.translation),
                    table.body(a).copied(),
                    table.transform(b).map(|t| t.translation),
                    table.body(b).copied(),
                ) else {
                    continue;
                };

                let force = self.compute_force(pos_a, body_a.mass, pos_b, body_b.mass);
                if let Some(body) = table.body_mut(a) {
                    body.velocity += dt * -force / body.mass;
                }
                if let Some(body) = table.body_mut(b) {
                    body.velocity += dt * force / body.mass;
                }
            }
        }

        for id in ids {
            if let Some((transform, body)) = table.physics_parts_mut(id) {
                transform.translation += dt * body.velocity;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::entity::EntityId;
    use crate::transform::{RigidBody2d, Transform2d};

    use super::*;

    fn spawn_body(table: &mut EntityTable, at: Vec2, velocity: Vec2) -> EntityId {
        let id = table.spawn(Transform2d::new().with_translation(at));
        table.set_body(id, RigidBody2d::with_velocity(velocity));
        id
    }

    #[test]
    fn test_force_points_from_to_towards_from() {
        let gravity = GravityPhysicsSystem::new(1.0);
        let force = gravity.compute_force(Vec2::new(2.0, 0.0), 1.0, Vec2::ZERO, 1.0);
        // 1 * 1 * 1 / 4 along +x
        assert!((force - Vec2::new(0.25, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_force_scales_with_masses() {
        let gravity = GravityPhysicsSystem::new(0.5);
        let force = gravity.compute_force(Vec2::new(0.0, 1.0), 2.0, Vec2::ZERO, 3.0);
        assert!((force - Vec2::new(0.0, 3.0)).length() < 1e-6);
    }

    #[test]
    fn test_coincident_points_have_no_force() {
        let gravity = GravityPhysicsSystem::new(1.0);
        let p = Vec2::new(0.3, 0.3);
        assert_eq!(gravity.compute_force(p, 1.0, p, 1.0), Vec2::ZERO);
    }

    #[test]
    fn test_bodies_attract_and_conserve_momentum() {
        let gravity = GravityPhysicsSystem::new(0.001);
        let mut table = EntityTable::new();
        let a = spawn_body(&mut table, Vec2::new(-0.5, 0.0), Vec2::ZERO);
        let b = spawn_body(&mut table, Vec2::new(0.5, 0.0), Vec2::ZERO);

        gravity.update(&mut table, 1.0 / 60.0, 5);

        let va = table.body(a).unwrap().velocity;
        let vb = table.body(b).unwrap().velocity;
        assert!(va.x > 0.0, "left body should move right");
        assert!(vb.x < 0.0, "right body should move left");
        assert!((va + vb).length() < 1e-9);

        assert!(table.transform(a).unwrap().translation.x > -0.5);
        assert!(table.transform(b).unwrap().translation.x < 0.5);
    }

    #[test]
    fn test_zero_substeps_still_steps() {
        let gravity = GravityPhysicsSystem::new(0.0);
        let mut table = EntityTable::new();
        let id = spawn_body(&mut table, Vec2::ZERO, Vec2::new(1.0, 0.0));

        gravity.update(&mut table, 0.5, 0);
        assert!((table.transform(id).unwrap().translation.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_entities_without_bodies_do_not_move() {
        let gravity = GravityPhysicsSystem::new(1.0);
        let mut table = EntityTable::new();
        spawn_body(&mut table, Vec2::new(1.0, 0.0), Vec2::ZERO);
        let marker = table.spawn(Transform2d::default());

        gravity.update(&mut table, 1.0, 4);
        assert_eq!(table.transform(marker).unwrap().translation, Vec2::ZERO);
    }
}
