//! Struct-of-arrays entity table.
//!
//! Every entity has a transform and a color. Mesh and rigid body columns are
//! optional per entity, so render and physics systems each walk only the
//! columns they need.

use glam::Vec3;

use crate::transform::{RigidBody2d, Transform2d};

/// Row index into an [`EntityTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(u32);

impl EntityId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index into the caller's mesh list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub usize);

#[derive(Clone, Debug, Default)]
pub struct EntityTable {
    transforms: Vec<Transform2d>,
    colors: Vec<Vec3>,
    meshes: Vec<Option<MeshId>>,
    bodies: Vec<Option<RigidBody2d>>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity with a black color and no mesh or body.
    pub fn spawn(&mut self, transform: Transform2d) -> EntityId {
        let id = EntityId(self.transforms.len() as u32);
        self.transforms.push(transform);
        self.colors.push(Vec3::ZERO);
        self.meshes.push(None);
        self.bodies.push(None);
        id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn transform(&self, id: EntityId) -> Option<&Transform2d> {
        self.transforms.get(id.index())
    }

    pub fn transform_mut(&mut self, id: EntityId) -> Option<&mut Transform2d> {
        self.transforms.get_mut(id.index())
    }

    pub fn color(&self, id: EntityId) -> Option<Vec3> {
        self.colors.get(id.index()).copied()
    }

    pub fn set_color(&mut self, id: EntityId, color: Vec3) -> bool {
        set_cell(&mut self.colors, id, color)
    }

    pub fn mesh(&self, id: EntityId) -> Option<MeshId> {
        self.meshes.get(id.index()).copied().flatten()
    }

    pub fn set_mesh(&mut self, id: EntityId, mesh: MeshId) -> bool {
        set_cell(&mut self.meshes, id, Some(mesh))
    }

    pub fn body(&self, id: EntityId) -> Option<&RigidBody2d> {
        self.bodies.get(id.index()).and_then(Option::as_ref)
    }

    pub fn body_mut(&mut self, id: EntityId) -> Option<&mut RigidBody2d> {
        self.bodies.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn set_body(&mut self, id: EntityId, body: RigidBody2d) -> bool {
        set_cell(&mut self.bodies, id, Some(body))
    }

    #[inline]
    pub fn transforms(&self) -> &[Transform2d] {
        &self.transforms
    }

    #[inline]
    pub fn colors(&self) -> &[Vec3] {
        &self.colors
    }

    #[inline]
    pub fn meshes(&self) -> &[Option<MeshId>] {
        &self.meshes
    }

    #[inline]
    pub fn bodies(&self) -> &[Option<RigidBody2d>] {
        &self.bodies
    }

    /// Entities that have a mesh, with the columns the renderer reads.
    pub fn renderables(&self) -> impl Iterator<Item = (EntityId, &Transform2d, Vec3, MeshId)> {
        self.transforms
            .iter()
            .zip(&self.colors)
            .zip(&self.meshes)
            .enumerate()
            .filter_map(|(i, ((transform, &color), mesh))| {
                mesh.map(|mesh| (EntityId(i as u32), transform, color, mesh))
            })
    }

    /// Entities that take part in the physics simulation, in spawn order.
    pub fn physics_ids(&self) -> Vec<EntityId> {
        self.bodies
            .iter()
            .enumerate()
            .filter(|(_, body)| body.is_some())
            .map(|(i, _)| EntityId(i as u32))
            .collect()
    }

    /// Mutable transform and body of a physics entity.
    pub(crate) fn physics_parts_mut(
        &mut self,
        id: EntityId,
    ) -> Option<(&mut Transform2d, &mut RigidBody2d)> {
        let transform = self.transforms.get_mut(id.index())?;
        let body = self.bodies.get_mut(id.index())?.as_mut()?;
        Some((transform, body))
    }
}

fn set_cell<T>(column: &mut [T], id: EntityId, value: T) -> bool {
    match column.get_mut(id.index()) {
        Some(cell) => {
            *cell = value;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;

    #[test]
    fn test_spawn_keeps_columns_aligned() {
        let mut table = EntityTable::new();
        let a = table.spawn(Transform2d::default());
        let b = table.spawn(Transform2d::new().with_translation(Vec2::X));

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(table.len(), 2);
        assert_eq!(table.colors().len(), 2);
        assert_eq!(table.meshes().len(), 2);
        assert_eq!(table.bodies().len(), 2);
        assert_eq!(table.transform(b).map(|t| t.translation), Some(Vec2::X));
    }

    #[test]
    fn test_renderables_skip_meshless() {
        let mut table = EntityTable::new();
        let drawn = table.spawn(Transform2d::default());
        let hidden = table.spawn(Transform2d::default());
        table.set_mesh(drawn, MeshId(0));
        table.set_color(drawn, Vec3::new(1.0, 0.0, 0.0));

        let rows: Vec<_> = table.renderables().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, drawn);
        assert_eq!(rows[0].2, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(rows[0].3, MeshId(0));
        assert_eq!(table.mesh(hidden), None);
    }

    #[test]
    fn test_physics_ids_only_bodies() {
        let mut table = EntityTable::new();
        let _field = table.spawn(Transform2d::default());
        let body = table.spawn(Transform2d::default());
        table.set_body(body, RigidBody2d::default());

        assert_eq!(table.physics_ids(), vec![body]);
        assert!(table.physics_parts_mut(body).is_some());
        assert!(table.body(EntityId(0)).is_none());
    }

    #[test]
    fn test_set_on_unknown_id() {
        let mut table = EntityTable::new();
        assert!(!table.set_color(EntityId(3), Vec3::ONE));
        assert!(table.transform(EntityId(3)).is_none());
    }
}
