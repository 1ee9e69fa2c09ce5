//! 2D transform and rigid-body components.

use glam::{Mat2, Vec2};

/// Position, non-uniform scale and rotation of a 2D object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform2d {
    pub translation: Vec2,
    pub scale: Vec2,
    /// Counter-clockwise, in radians.
    pub rotation: f32,
}

impl Default for Transform2d {
    fn default() -> Self {
        Self {
            translation: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
        }
    }
}

impl Transform2d {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_translation(mut self, translation: Vec2) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_scale(mut self, scale: Vec2) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    /// Linear part of the transform: rotation applied after scale.
    ///
    /// Translation is passed to the shader separately.
    pub fn mat2(&self) -> Mat2 {
        Mat2::from_angle(self.rotation) * Mat2::from_diagonal(self.scale)
    }
}

/// Velocity and mass for entities that take part in the simulation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidBody2d {
    pub velocity: Vec2,
    pub mass: f32,
}

impl Default for RigidBody2d {
    fn default() -> Self {
        Self {
            velocity: Vec2::ZERO,
            mass: 1.0,
        }
    }
}

impl RigidBody2d {
    pub fn with_velocity(velocity: Vec2) -> Self {
        Self {
            velocity,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    #[test]
    fn test_default_transform_is_identity() {
        let transform = Transform2d::default();
        assert_eq!(transform.mat2(), Mat2::IDENTITY);
        assert_eq!(transform.translation, Vec2::ZERO);
    }

    #[test]
    fn test_mat2_scales_then_rotates() {
        let transform = Transform2d::new()
            .with_scale(Vec2::new(2.0, 1.0))
            .with_rotation(FRAC_PI_2);

        // x axis is stretched to length 2, then turned onto +y.
        let x = transform.mat2() * Vec2::X;
        assert!((x - Vec2::new(0.0, 2.0)).length() < 1e-6);

        let y = transform.mat2() * Vec2::Y;
        assert!((y - Vec2::new(-1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_rigid_body_default_mass() {
        let body = RigidBody2d::with_velocity(Vec2::new(0.1, 0.0));
        assert_eq!(body.mass, 1.0);
        assert_eq!(body.velocity, Vec2::new(0.1, 0.0));
    }
}
