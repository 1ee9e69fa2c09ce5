//! Immutable vertex meshes and the builders for the shapes the app draws.
//!
//! # Overview
//!
//! - [`Mesh`] uploads a [`Vertex2D`] list once into a host-visible buffer
//! - [`circle_vertices`] and [`square_vertices`] build the two shapes on the CPU
//! - Fewer than [`MIN_VERTEX_COUNT`] vertices is rejected before allocation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use jvsc_rhi::command::CommandBuffer;
//! use jvsc_rhi::device::Device;
//! use jvsc_renderer::mesh::{Mesh, circle_vertices};
//!
//! # fn example(device: Arc<Device>, cmd: &CommandBuffer) -> jvsc_rhi::RhiResult<()> {
//! let mut circle = Mesh::new(device, &circle_vertices(64)?)?;
//!
//! circle.bind(cmd);
//! circle.draw(cmd);
//!
//! // after the device is idle
//! circle.destroy();
//! # Ok(())
//! # }
//! ```

use std::f32::consts::TAU;
use std::sync::Arc;

use glam::Vec2;
use tracing::debug;

use jvsc_rhi::buffer::Buffer;
use jvsc_rhi::command::CommandBuffer;
use jvsc_rhi::device::Device;
use jvsc_rhi::vertex::Vertex2D;
use jvsc_rhi::{RhiError, RhiResult};

/// Fewest vertices that form a triangle.
pub const MIN_VERTEX_COUNT: usize = 3;

/// Reject vertex lists that cannot form a triangle.
///
/// # Errors
///
/// [`RhiError::InvalidVertexCount`] below [`MIN_VERTEX_COUNT`] or above
/// `u32::MAX`.
pub fn validate_vertex_count(count: usize) -> RhiResult<u32> {
    if count < MIN_VERTEX_COUNT {
        return Err(RhiError::InvalidVertexCount(count));
    }
    u32::try_from(count).map_err(|_| RhiError::InvalidVertexCount(count))
}

/// GPU-resident vertex buffer plus its vertex count.
///
/// Data is written once at construction. Call [`Mesh::destroy`] before the
/// device goes away; dropping afterwards is harmless.
pub struct Mesh {
    /// Vertex data, written once.
    vertex_buffer: Buffer,
    /// Always at least [`MIN_VERTEX_COUNT`].
    vertex_count: u32,
}

impl Mesh {
    /// Upload `vertices` into a new host-visible vertex buffer.
    ///
    /// # Errors
    ///
    /// [`RhiError::InvalidVertexCount`] for fewer than three vertices, checked
    /// before anything is allocated; otherwise any allocation failure.
    pub fn new(device: Arc<Device>, vertices: &[Vertex2D]) -> RhiResult<Self> {
        let vertex_count = validate_vertex_count(vertices.len())?;
        let vertex_buffer = Buffer::vertex(device, vertices)?;

        debug!("Created mesh with {} vertices", vertex_count);
        Ok(Self {
            vertex_buffer,
            vertex_count,
        })
    }

    /// Binds the vertex buffer at binding 0.
    pub fn bind(&self, cmd: &CommandBuffer) {
        cmd.bind_vertex_buffers(0, &[self.vertex_buffer.handle()], &[0]);
    }

    /// Draw every vertex, one instance.
    pub fn draw(&self, cmd: &CommandBuffer) {
        cmd.draw(self.vertex_count, 1, 0, 0);
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Frees the vertex buffer. The GPU must be done with it.
    pub fn destroy(&mut self) {
        self.vertex_buffer.destroy();
    }
}

/// Unit square centered on `offset`, as two triangles.
pub fn square_vertices(offset: Vec2) -> Vec<Vertex2D> {
    [
        Vec2::new(-0.5, -0.5),
        Vec2::new(0.5, 0.5),
        Vec2::new(-0.5, 0.5),
        Vec2::new(-0.5, -0.5),
        Vec2::new(0.5, -0.5),
        Vec2::new(0.5, 0.5),
    ]
    .into_iter()
    .map(|corner| Vertex2D::at(corner + offset))
    .collect()
}

/// Unit circle around the origin as `sides` independent triangles.
///
/// Each triangle is (rim i, rim i + 1, center), so the result holds
/// `3 * sides` vertices.
///
/// # Errors
///
/// [`RhiError::InvalidVertexCount`] for fewer than three sides.
pub fn circle_vertices(sides: u32) -> RhiResult<Vec<Vertex2D>> {
    if (sides as usize) < MIN_VERTEX_COUNT {
        return Err(RhiError::InvalidVertexCount(sides as usize));
    }

    let rim: Vec<Vec2> = (0..sides)
        .map(|i| {
            let angle = i as f32 * TAU / sides as f32;
            Vec2::new(angle.cos(), angle.sin())
        })
        .collect();

    let mut vertices = Vec::with_capacity(3 * sides as usize);
    for i in 0..rim.len() {
        vertices.push(Vertex2D::at(rim[i]));
        vertices.push(Vertex2D::at(rim[(i + 1) % rim.len()]));
        vertices.push(Vertex2D::at(Vec2::ZERO));
    }
    Ok(vertices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_count_too_small() {
        for count in 0..MIN_VERTEX_COUNT {
            assert!(matches!(
                validate_vertex_count(count),
                Err(RhiError::InvalidVertexCount(n)) if n == count
            ));
        }
    }

    #[test]
    fn test_vertex_count_accepted() {
        assert_eq!(validate_vertex_count(3).ok(), Some(3));
        assert_eq!(validate_vertex_count(192).ok(), Some(192));
    }

    #[test]
    fn test_square_is_offset() {
        let offset = Vec2::new(2.0, -1.0);
        let vertices = square_vertices(offset);
        assert_eq!(vertices.len(), 6);

        let centroid: Vec2 =
            vertices.iter().map(|v| v.position).sum::<Vec2>() / vertices.len() as f32;
        // Both triangles share the (-0.5,-0.5)/(0.5,0.5) diagonal.
        assert!((centroid - offset).length() < 0.2);
        assert!(
            vertices
                .iter()
                .all(|v| (v.position - offset).abs().max_element() <= 0.5 + f32::EPSILON)
        );
    }

    #[test]
    fn test_circle_layout() {
        let vertices = circle_vertices(64).unwrap();
        assert_eq!(vertices.len(), 192);

        for triangle in vertices.chunks(3) {
            assert!((triangle[0].position.length() - 1.0).abs() < 1e-5);
            assert!((triangle[1].position.length() - 1.0).abs() < 1e-5);
            assert_eq!(triangle[2].position, Vec2::ZERO);
        }

        // Last triangle wraps back to the first rim vertex.
        assert_eq!(vertices[190].position, vertices[0].position);
    }

    #[test]
    fn test_circle_needs_three_sides() {
        assert!(circle_vertices(2).is_err());
        assert_eq!(circle_vertices(3).unwrap().len(), 9);
    }
}
