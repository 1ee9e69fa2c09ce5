//! Vertex format for 2D meshes.
//!
//! # Example
//!
//! ```
//! use glam::{Vec2, Vec3};
//! use jvsc_rhi::vertex::Vertex2D;
//!
//! let triangle = [
//!     Vertex2D::new(Vec2::new(0.0, -0.5), Vec3::X),
//!     Vertex2D::new(Vec2::new(0.5, 0.5), Vec3::Y),
//!     Vertex2D::new(Vec2::new(-0.5, 0.5), Vec3::Z),
//! ];
//! assert_eq!(std::mem::size_of_val(&triangle), 60);
//! assert_eq!(Vertex2D::binding_description().stride, 20);
//! ```

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// 2D vertex with per-vertex color.
///
/// `#[repr(C)]` layout, 20 bytes:
/// - Offset 0: position (vec2), location 0
/// - Offset 8: color (vec3), location 1
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex2D {
    /// Position in normalized device coordinates before the push transform.
    pub position: Vec2,
    /// Linear RGB.
    pub color: Vec3,
}

impl Vertex2D {
    #[inline]
    pub const fn new(position: Vec2, color: Vec3) -> Self {
        Self { position, color }
    }

    /// Vertex at `position` with zero color; the draw color comes from push constants.
    #[inline]
    pub const fn at(position: Vec2) -> Self {
        Self {
            position,
            color: Vec3::ZERO,
        }
    }

    /// Single per-vertex binding at slot 0.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Position at location 0, color at location 1, both from binding 0.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: std::mem::offset_of!(Vertex2D, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(Vertex2D, color) as u32,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_size() {
        // Vec2 (8) + Vec3 (12)
        assert_eq!(std::mem::size_of::<Vertex2D>(), 20);
    }

    #[test]
    fn test_binding_description() {
        let binding = Vertex2D::binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 20);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn test_attribute_descriptions() {
        let attrs = Vertex2D::attribute_descriptions();

        assert_eq!(attrs[0].location, 0);
        assert_eq!(attrs[0].format, vk::Format::R32G32_SFLOAT);
        assert_eq!(attrs[0].offset, 0);

        assert_eq!(attrs[1].location, 1);
        assert_eq!(attrs[1].format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(attrs[1].offset, 8);
    }

    #[test]
    fn test_at_has_zero_color() {
        let v = Vertex2D::at(Vec2::new(0.5, -0.5));
        assert_eq!(v.color, Vec3::ZERO);
        assert_eq!(bytemuck::bytes_of(&v).len(), 20);
    }
}
