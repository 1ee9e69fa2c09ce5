//! Scene bootstrap for the gravity demo.

use glam::{Vec2, Vec3};
use rand::Rng;

use jvsc_core::SimulationConfig;
use jvsc_scene::{EntityId, EntityTable, MeshId, RigidBody2d, Transform2d};

/// Half-length of a field line at rest; `Vec2FieldSystem` rescales x.
const FIELD_LINE_SCALE: f32 = 0.005;

/// Spawn a `(2 * grid_half_extent)^2` grid of bodies with random position,
/// color and velocity.
pub fn spawn_bodies(
    table: &mut EntityTable,
    config: &SimulationConfig,
    mesh: MeshId,
    rng: &mut impl Rng,
) -> Vec<EntityId> {
    let half = config.grid_half_extent.max(0);
    let speed = config.max_initial_speed.abs();
    let mut ids = Vec::new();

    for _ in -half..half {
        for _ in -half..half {
            let translation = Vec2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
            let color = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            let velocity = if speed > 0.0 {
                Vec2::new(rng.gen_range(-speed..speed), rng.gen_range(-speed..speed))
            } else {
                Vec2::ZERO
            };

            let id = table.spawn(
                Transform2d::new()
                    .with_translation(translation)
                    .with_scale(Vec2::splat(config.body_scale)),
            );
            table.set_color(id, color);
            table.set_mesh(id, mesh);
            table.set_body(id, RigidBody2d::with_velocity(velocity));
            ids.push(id);
        }
    }
    ids
}

/// Spawn a `grid x grid` lattice of white field lines covering clip space.
pub fn spawn_vector_field(table: &mut EntityTable, grid: u32, mesh: MeshId) -> Vec<EntityId> {
    let mut ids = Vec::with_capacity((grid * grid) as usize);
    let cell = 2.0 / grid.max(1) as f32;

    for i in 0..grid {
        for j in 0..grid {
            let translation = Vec2::new(
                -1.0 + (i as f32 + 0.5) * cell,
                -1.0 + (j as f32 + 0.5) * cell,
            );
            let id = table.spawn(
                Transform2d::new()
                    .with_translation(translation)
                    .with_scale(Vec2::splat(FIELD_LINE_SCALE)),
            );
            table.set_color(id, Vec3::ONE);
            table.set_mesh(id, mesh);
            ids.push(id);
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_default_grid_spawns_sixteen_bodies() {
        let config = SimulationConfig::default();
        let mut table = EntityTable::new();
        let mut rng = StdRng::seed_from_u64(7);

        let ids = spawn_bodies(&mut table, &config, MeshId(0), &mut rng);
        assert_eq!(ids.len(), 16);
        assert_eq!(table.physics_ids(), ids);

        for &id in &ids {
            let transform = table.transform(id).unwrap();
            assert!(transform.translation.abs().max_element() <= 1.0);
            assert_eq!(transform.scale, Vec2::splat(config.body_scale));
            let body = table.body(id).unwrap();
            assert!(body.velocity.abs().max_element() <= config.max_initial_speed);
            assert_eq!(table.mesh(id), Some(MeshId(0)));
        }
    }

    #[test]
    fn test_zero_speed_is_allowed() {
        let config = SimulationConfig {
            max_initial_speed: 0.0,
            grid_half_extent: 1,
            ..SimulationConfig::default()
        };
        let mut table = EntityTable::new();
        let mut rng = StdRng::seed_from_u64(1);

        let ids = spawn_bodies(&mut table, &config, MeshId(0), &mut rng);
        assert_eq!(ids.len(), 4);
        assert!(ids.iter().all(|&id| table.body(id).unwrap().velocity == Vec2::ZERO));
    }

    #[test]
    fn test_vector_field_has_no_bodies() {
        let mut table = EntityTable::new();
        let ids = spawn_vector_field(&mut table, 4, MeshId(1));

        assert_eq!(ids.len(), 16);
        assert!(table.physics_ids().is_empty());

        let first = table.transform(ids[0]).unwrap().translation;
        assert!((first - Vec2::new(-0.75, -0.75)).length() < 1e-6);
        assert_eq!(table.color(ids[0]), Some(Vec3::ONE));
    }
}
