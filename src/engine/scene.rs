// Scene: one hecs world plus deferred structural changes

use anyhow::Result;
use hecs::{CommandBuffer, DynamicBundle, Entity, World};
use log::debug;

use crate::engine::ecs::{ColliderComponent, RigidbodyComponent, TransformComponent, Transforms};
use crate::engine::physics::PhysicsWorld;

/// A set of entities updated together by the runtime
///
/// Despawns are deferred to the end of the frame so passes never see an
/// entity vanish mid-iteration.
pub struct Scene {
    name: String,
    world: World,
    commands: CommandBuffer,
    despawned: Vec<Entity>,
}

impl Scene {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            world: World::new(),
            commands: CommandBuffer::new(),
            despawned: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn spawn(&mut self, components: impl DynamicBundle) -> Entity {
        self.world.spawn(components)
    }

    /// Remove `entity` at the end of the frame
    pub fn despawn(&mut self, entity: Entity) {
        if !self.despawned.contains(&entity) {
            self.despawned.push(entity);
        }
    }

    /// Deferred inserts and removals, applied at the end of the frame
    pub fn commands(&mut self) -> &mut CommandBuffer {
        &mut self.commands
    }

    /// Attach `child` under `parent` in the transform tree
    pub fn use_parent(&mut self, child: Entity, parent: Entity) -> Result<()> {
        Transforms::use_parent(&mut self.world, child, parent)
    }

    pub fn unparent(&mut self, child: Entity) -> Result<()> {
        Transforms::unparent(&mut self.world, child)
    }

    /// Run `f` on the transform of `entity`, if it has one
    pub fn with_transform<R>(&mut self, entity: Entity, f: impl FnOnce(&mut TransformComponent) -> R) -> Option<R> {
        let mut transform = self.world.get::<&mut TransformComponent>(entity).ok()?;
        Some(f(&mut transform))
    }

    pub fn entity_count(&self) -> u32 {
        self.world.len()
    }

    /// Apply deferred despawns and commands
    pub(crate) fn flush(&mut self, mut physics: Option<&mut PhysicsWorld>) {
        for entity in std::mem::take(&mut self.despawned) {
            if let Some(physics) = physics.as_deref_mut() {
                if let Ok(mut collider) = self.world.get::<&mut ColliderComponent>(entity) {
                    collider.remove(physics);
                }
                if let Ok(mut rigidbody) = self.world.get::<&mut RigidbodyComponent>(entity) {
                    rigidbody.remove(physics);
                }
            }
            Transforms::detach_all(&mut self.world, entity);
            self.commands.despawn(entity);
            debug!("Despawned {:?} from scene '{}'", entity, self.name);
        }
        self.commands.run_on(&mut self.world);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::GeometryData;
    use crate::engine::fetch::Fetched;
    use crate::engine::physics::{Shape, ShapeKind};
    use glam::Vec3;

    #[test]
    fn test_despawn_is_deferred() {
        let mut scene = Scene::new("test");
        let parent = scene.spawn((TransformComponent::new(),));
        let child = scene.spawn((TransformComponent::new(),));
        scene.use_parent(child, parent).unwrap();

        scene.despawn(parent);
        assert!(scene.world().contains(parent));

        scene.flush(None);
        assert!(!scene.world().contains(parent));
        let orphan = scene.world().get::<&TransformComponent>(child).unwrap().parent();
        assert_eq!(orphan, None);
    }

    #[test]
    fn test_despawn_removes_physics_body() {
        let mut physics = PhysicsWorld::default();
        let mut scene = Scene::new("test");
        let shape = Fetched::ready(Shape::new(&GeometryData::cube(), ShapeKind::Box).unwrap());
        let mut collider = ColliderComponent::new();
        collider.use_shape(&shape);
        collider.sync(&mut physics, glam::Mat4::IDENTITY);
        let entity = scene.spawn((TransformComponent::from_position(Vec3::ZERO), collider));
        assert_eq!(physics.body_count(), 1);

        scene.despawn(entity);
        scene.flush(Some(&mut physics));
        assert_eq!(physics.body_count(), 0);
        assert_eq!(scene.entity_count(), 0);
    }

    #[test]
    fn test_commands_applied_on_flush() {
        let mut scene = Scene::new("test");
        let entity = scene.spawn((TransformComponent::new(),));
        scene.commands().insert_one(entity, crate::engine::ecs::ListenerComponent);
        assert!(scene.world().get::<&crate::engine::ecs::ListenerComponent>(entity).is_err());
        scene.flush(None);
        assert!(scene.world().get::<&crate::engine::ecs::ListenerComponent>(entity).is_ok());
    }
}
