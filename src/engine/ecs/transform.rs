// Transform component and the parent/child tree over entities

use anyhow::{bail, Result};
use glam::{Mat4, Quat, Vec3, Vec4Swizzles};
use hecs::{Entity, World};
use log::debug;

use crate::core::math::euler_xyz;

/// World transform of an entity
///
/// Setters update the matrix immediately and remember the change as a
/// pending delta. `Transforms::propagate` later applies that delta to the
/// children, so a parent moved in one pass drags its children along before
/// the next pass runs.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformComponent {
    transform: Mat4,
    parent: Option<Entity>,
    children: Vec<Entity>,
    /// Change since the last propagation, `new * old^-1`
    pending: Option<Mat4>,
}

impl TransformComponent {
    pub fn new() -> Self {
        Self {
            transform: Mat4::IDENTITY,
            parent: None,
            children: Vec::new(),
            pending: None,
        }
    }

    pub fn from_matrix(transform: Mat4) -> Self {
        Self {
            transform,
            ..Self::new()
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::from_matrix(Mat4::from_translation(position))
    }

    fn replace(&mut self, transform: Mat4) -> &mut Self {
        let delta = transform * self.transform.inverse();
        self.pending = Some(match self.pending {
            Some(previous) => delta * previous,
            None => delta,
        });
        self.transform = transform;
        self
    }

    /// Move along the local axes
    pub fn set_position_relative(&mut self, offset: Vec3) -> &mut Self {
        self.replace(self.transform * Mat4::from_translation(offset))
    }

    /// Place at a world position, keeping rotation and scale
    pub fn set_position_warp(&mut self, position: Vec3) -> &mut Self {
        let mut transform = self.transform;
        transform.w_axis = position.extend(1.0);
        self.replace(transform)
    }

    /// Rotate by euler angles (radians, X then Y then Z) around the local axes
    pub fn set_rotation_relative(&mut self, angles: Vec3) -> &mut Self {
        self.replace(self.transform * Mat4::from_quat(euler_xyz(angles)))
    }

    /// Replace the rotation with euler angles, keeping the position
    pub fn set_rotation_warp(&mut self, angles: Vec3) -> &mut Self {
        self.replace(Mat4::from_rotation_translation(euler_xyz(angles), self.position()))
    }

    /// Apply `delta` in the local frame
    pub fn set_transform_relative(&mut self, delta: Mat4) -> &mut Self {
        self.replace(self.transform * delta)
    }

    pub fn set_transform_warp(&mut self, transform: Mat4) -> &mut Self {
        self.replace(transform)
    }

    pub fn matrix(&self) -> Mat4 {
        self.transform
    }

    pub fn position(&self) -> Vec3 {
        self.transform.w_axis.xyz()
    }

    pub fn rotation(&self) -> Quat {
        let (_, rotation, _) = self.transform.to_scale_rotation_translation();
        rotation
    }

    pub fn right(&self) -> Vec3 {
        self.transform.x_axis.xyz().normalize_or_zero()
    }

    pub fn up(&self) -> Vec3 {
        self.transform.y_axis.xyz().normalize_or_zero()
    }

    pub fn forward(&self) -> Vec3 {
        self.transform.z_axis.xyz().normalize_or_zero()
    }

    pub fn parent(&self) -> Option<Entity> {
        self.parent
    }

    pub fn children(&self) -> &[Entity] {
        &self.children
    }

    /// True if a change is waiting to reach the children
    pub fn is_dirty(&self) -> bool {
        self.pending.is_some()
    }
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self::new()
    }
}

/// Tree operations that touch several entities of one scene
pub struct Transforms;

impl Transforms {
    /// Attach `child` under `parent`, detaching it from any previous parent.
    ///
    /// Re-parenting to the current parent is a no-op. A parent inside the
    /// child's own subtree is rejected.
    pub fn use_parent(world: &mut World, child: Entity, parent: Entity) -> Result<()> {
        if child == parent {
            bail!("Entity {:?} cannot be its own parent", child);
        }
        if Self::is_ancestor(world, child, parent) {
            bail!("Entity {:?} is a descendant of {:?}", parent, child);
        }
        let previous = world.get::<&TransformComponent>(child)?.parent;
        if previous == Some(parent) {
            return Ok(());
        }
        // make sure the parent exists before touching the old link
        world.get::<&TransformComponent>(parent)?;

        if let Some(previous) = previous {
            if let Ok(mut old) = world.get::<&mut TransformComponent>(previous) {
                old.children.retain(|c| *c != child);
            }
        }
        world.get::<&mut TransformComponent>(parent)?.children.push(child);
        world.get::<&mut TransformComponent>(child)?.parent = Some(parent);
        Ok(())
    }

    /// Detach `child` from its parent, if any
    pub fn unparent(world: &mut World, child: Entity) -> Result<()> {
        let Some(parent) = world.get::<&TransformComponent>(child)?.parent else {
            return Ok(());
        };
        if let Ok(mut old) = world.get::<&mut TransformComponent>(parent) {
            old.children.retain(|c| *c != child);
        }
        world.get::<&mut TransformComponent>(child)?.parent = None;
        Ok(())
    }

    /// True if `ancestor` is `entity` or lies above it
    fn is_ancestor(world: &World, ancestor: Entity, entity: Entity) -> bool {
        let mut current = Some(entity);
        while let Some(e) = current {
            if e == ancestor {
                return true;
            }
            current = world
                .get::<&TransformComponent>(e)
                .ok()
                .and_then(|t| t.parent);
        }
        false
    }

    /// Drop links to an entity that is about to be despawned
    pub fn detach_all(world: &mut World, entity: Entity) {
        if let Err(e) = Self::unparent(world, entity) {
            debug!("Despawning {:?} without a transform: {}", entity, e);
        }
        let children = match world.get::<&mut TransformComponent>(entity) {
            Ok(mut transform) => std::mem::take(&mut transform.children),
            Err(_) => return,
        };
        for child in children {
            if let Ok(mut transform) = world.get::<&mut TransformComponent>(child) {
                transform.parent = None;
            }
        }
    }

    /// Apply pending deltas down the tree until nothing is dirty
    pub fn propagate(world: &mut World) {
        loop {
            let dirty: Vec<(Mat4, Vec<Entity>)> = world
                .query_mut::<&mut TransformComponent>()
                .into_iter()
                .filter_map(|(_, transform)| {
                    let delta = transform.pending.take()?;
                    Some((delta, transform.children.clone()))
                })
                .filter(|(_, children)| !children.is_empty())
                .collect();
            if dirty.is_empty() {
                return;
            }
            for (delta, children) in dirty {
                for child in children {
                    if let Ok(mut transform) = world.get::<&mut TransformComponent>(child) {
                        let moved = delta * transform.transform;
                        transform.replace(moved);
                    }
                }
            }
        }
    }
}
