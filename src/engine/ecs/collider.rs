// Collider component: static world geometry in the physics world

use glam::Mat4;
use rapier3d::prelude::{ColliderBuilder, InteractionGroups, RigidBodyBuilder};

use crate::core::math::to_isometry;
use crate::engine::fetch::Fetched;
use crate::engine::physics::{ColliderHandle, CollisionGroup, PhysicsWorld, RigidBodyHandle, Shape, MAX_LAYER};
use crate::fatal;

/// Immovable collision geometry
///
/// Grounds and walls block both kinematic and dynamic bodies; layers are
/// only sensed by kinematic bodies that opt in.
#[derive(Debug)]
pub struct ColliderComponent {
    shape: Fetched<Shape>,
    group: CollisionGroup,
    /// Group changed since the collider was instanced
    regroup: bool,
    /// Shape replaced since the collider was instanced
    reshape: bool,
    pub(crate) instance: Option<(RigidBodyHandle, ColliderHandle)>,
}

impl ColliderComponent {
    pub fn new() -> Self {
        Self {
            shape: Fetched::empty(),
            group: CollisionGroup::Ground,
            regroup: false,
            reshape: false,
            instance: None,
        }
    }

    /// Collision shape; replacing it rebuilds an instanced collider
    pub fn use_shape(&mut self, shape: &Fetched<Shape>) -> &mut Self {
        if !self.shape.ptr_eq(shape) {
            self.shape = shape.clone();
            self.reshape = self.instance.is_some();
        }
        self
    }

    pub fn ground(&mut self) -> &mut Self {
        self.set_group(CollisionGroup::Ground)
    }

    pub fn wall(&mut self) -> &mut Self {
        self.set_group(CollisionGroup::Wall)
    }

    /// Move the collider to a user layer, hidden from dynamic bodies
    pub fn layer(&mut self, layer: u8) -> &mut Self {
        if layer > MAX_LAYER {
            fatal!("Collision layer {} out of range (max {})", layer, MAX_LAYER);
        }
        self.set_group(CollisionGroup::Layer(layer))
    }

    fn set_group(&mut self, group: CollisionGroup) -> &mut Self {
        if self.group == group {
            return self;
        }
        self.group = group;
        self.regroup = self.instance.is_some();
        self
    }

    pub fn group(&self) -> CollisionGroup {
        self.group
    }

    pub fn is_instanced(&self) -> bool {
        self.instance.is_some()
    }

    pub(crate) fn shape(&self) -> &Fetched<Shape> {
        &self.shape
    }

    fn groups(&self) -> InteractionGroups {
        self.group.collider_groups()
    }

    /// Create the physics objects once the shape is ready, or apply a
    /// pending group change to existing ones
    pub(crate) fn sync(&mut self, physics: &mut PhysicsWorld, transform: Mat4) {
        if self.reshape && self.shape.has_value() {
            self.remove(physics);
            self.reshape = false;
        }
        match self.instance {
            Some((_, collider)) => {
                if self.regroup {
                    physics.set_collision_groups(collider, self.groups());
                    self.regroup = false;
                }
            }
            None => {
                let Some(shape) = self.shape.try_value() else {
                    return;
                };
                let body = physics.add_rigid_body(
                    RigidBodyBuilder::fixed()
                        .position(to_isometry(transform * shape.feet_to_center()))
                        .build(),
                );
                let collider = physics.add_collider(
                    ColliderBuilder::new(shape.shared().clone())
                        .collision_groups(self.groups())
                        .build(),
                    body,
                );
                self.instance = Some((body, collider));
                self.regroup = false;
            }
        }
    }

    /// Place the collider at the entity transform
    pub(crate) fn place(&self, physics: &mut PhysicsWorld, transform: Mat4) {
        if let (Some((body, _)), Some(shape)) = (self.instance, self.shape.try_value()) {
            physics.set_body_transform(body, transform * shape.feet_to_center());
        }
    }

    pub(crate) fn remove(&mut self, physics: &mut PhysicsWorld) {
        if let Some((body, _)) = self.instance.take() {
            physics.remove_rigid_body(body);
        }
    }
}

impl Default for ColliderComponent {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::GeometryData;
    use crate::engine::physics::ShapeKind;

    fn floor() -> Fetched<Shape> {
        Fetched::ready(Shape::new(&GeometryData::cube(), ShapeKind::Box).unwrap())
    }

    #[test]
    fn test_defaults_to_ground() {
        let collider = ColliderComponent::new();
        assert_eq!(collider.group(), CollisionGroup::Ground);
        assert!(!collider.is_instanced());
    }

    #[test]
    fn test_instanced_once_shape_is_ready() {
        let mut physics = PhysicsWorld::default();
        let mut collider = ColliderComponent::new();
        collider.sync(&mut physics, Mat4::IDENTITY);
        assert!(!collider.is_instanced());

        collider.use_shape(&floor());
        collider.sync(&mut physics, Mat4::IDENTITY);
        collider.sync(&mut physics, Mat4::IDENTITY);
        assert!(collider.is_instanced());
        assert_eq!(physics.body_count(), 1);

        // a new shape replaces the body instead of adding one
        collider.use_shape(&floor());
        collider.sync(&mut physics, Mat4::IDENTITY);
        assert!(collider.is_instanced());
        assert_eq!(physics.body_count(), 1);
    }

    #[test]
    fn test_same_group_twice_is_noop() {
        let mut physics = PhysicsWorld::default();
        let mut collider = ColliderComponent::new();
        collider.use_shape(&floor()).wall();
        collider.sync(&mut physics, Mat4::IDENTITY);

        collider.wall().wall();
        assert!(!collider.regroup);

        collider.layer(2);
        assert!(collider.regroup);
        collider.sync(&mut physics, Mat4::IDENTITY);
        assert!(!collider.regroup);

        let (_, handle) = collider.instance.unwrap();
        let groups = physics.collider(handle).unwrap().collision_groups();
        assert_eq!(groups.memberships, CollisionGroup::Layer(2).bits());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_layer_out_of_range_is_fatal() {
        ColliderComponent::new().layer(MAX_LAYER + 1);
    }
}
