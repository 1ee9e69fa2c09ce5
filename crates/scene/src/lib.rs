//! Scene data and simulation systems.
//!
//! - [`EntityTable`]: struct-of-arrays storage for 2D entities
//! - [`GravityPhysicsSystem`]: pairwise attraction between rigid bodies
//! - [`Vec2FieldSystem`]: orients field-line entities along the gravity field

pub mod entity;
pub mod gravity;
pub mod transform;
pub mod vec2_field;

pub use entity::{EntityId, EntityTable, MeshId};
pub use gravity::GravityPhysicsSystem;
pub use transform::{RigidBody2d, Transform2d};
pub use vec2_field::Vec2FieldSystem;
