// Dynamics pass: physics world lifetime, body sync, stepping and write-back

use hecs::World;
use log::info;

use crate::core::RuntimeConfig;
use crate::engine::ecs::{ColliderComponent, RigidbodyComponent, TransformComponent, Transforms};
use crate::engine::physics::PhysicsWorld;
use crate::engine::scene::Scene;

fn needs_physics(world: &World) -> bool {
    world.query::<&ColliderComponent>().iter().next().is_some()
        || world.query::<&RigidbodyComponent>().iter().next().is_some()
}

/// Instance and place bodies from their entity transforms
fn prepare(world: &mut World, physics: &mut PhysicsWorld) {
    for (_, (collider, transform)) in world.query_mut::<(&mut ColliderComponent, &TransformComponent)>() {
        collider.shape().poll(&mut ());
        collider.sync(physics, transform.matrix());
        collider.place(physics, transform.matrix());
    }
    for (_, (rigidbody, transform)) in world.query_mut::<(&mut RigidbodyComponent, &TransformComponent)>() {
        rigidbody.shape().poll(&mut ());
        rigidbody.sync(physics, transform.matrix());
        rigidbody.push(physics, transform.matrix());
    }
}

/// Read contacts and simulated poses back into the components
fn collect(world: &mut World, physics: &PhysicsWorld) {
    for (_, (rigidbody, transform)) in world.query_mut::<(&mut RigidbodyComponent, &mut TransformComponent)>() {
        rigidbody.collect(physics, transform);
    }
    Transforms::propagate(world);
}

/// Run physics for every scene against the shared world.
///
/// The world is created the first time any scene holds a collider or a
/// rigidbody and lives for the rest of the runtime. Returns the number of
/// fixed steps taken.
pub(crate) fn run(physics: &mut Option<PhysicsWorld>, config: &RuntimeConfig, scenes: &mut [Scene], dt: f32) -> u32 {
    if physics.is_none() && scenes.iter().any(|scene| needs_physics(scene.world())) {
        info!(
            "Creating physics world (gravity {:?}, timestep {}s)",
            config.gravity, config.physics_timestep
        );
        *physics = Some(PhysicsWorld::from_config(config));
    }
    let Some(physics) = physics.as_mut() else {
        return 0;
    };

    for scene in scenes.iter_mut() {
        prepare(scene.world_mut(), physics);
    }
    physics.update_queries();
    let steps = physics.step(dt);
    for scene in scenes.iter_mut() {
        collect(scene.world_mut(), physics);
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::GeometryData;
    use crate::engine::fetch::Fetched;
    use crate::engine::physics::{Shape, ShapeKind};
    use glam::Vec3;

    fn unit_box() -> Fetched<Shape> {
        Fetched::ready(Shape::new(&GeometryData::cube(), ShapeKind::Box).unwrap())
    }

    fn floor(scene: &mut Scene) {
        let mut collider = ColliderComponent::new();
        collider.use_shape(&unit_box());
        scene.spawn((TransformComponent::from_position(Vec3::new(0.0, -0.5, 0.0)), collider));
    }

    #[test]
    fn test_world_created_once_when_needed() {
        let config = RuntimeConfig::default();
        let mut physics = None;
        let mut scenes = vec![Scene::new("empty")];

        run(&mut physics, &config, &mut scenes, 0.1);
        assert!(physics.is_none());

        let mut rigidbody = RigidbodyComponent::passive();
        rigidbody.use_shape(&unit_box());
        scenes[0].spawn((TransformComponent::new(), rigidbody));
        run(&mut physics, &config, &mut scenes, 0.1);
        let created = physics.as_ref().map(|p| p.body_count());
        assert_eq!(created, Some(1));

        run(&mut physics, &config, &mut scenes, 0.1);
        assert_eq!(physics.as_ref().map(|p| p.body_count()), Some(1));
    }

    #[test]
    fn test_kinematic_body_sees_ground_in_another_scene() {
        let config = RuntimeConfig::default();
        let mut physics = None;
        let mut level = Scene::new("level");
        floor(&mut level);
        let mut actors = Scene::new("actors");
        let mut rigidbody = RigidbodyComponent::kinematic();
        rigidbody.use_shape(&unit_box());
        let actor = actors.spawn((TransformComponent::from_position(Vec3::new(0.0, 0.01, 0.0)), rigidbody));
        let mut scenes = vec![level, actors];

        run(&mut physics, &config, &mut scenes, 1.0 / 60.0);
        run(&mut physics, &config, &mut scenes, 1.0 / 60.0);

        let rigidbody = scenes[1].world().get::<&RigidbodyComponent>(actor).unwrap();
        let grounded = rigidbody.as_kinematic().map(|k| k.is_grounded());
        assert_eq!(grounded, Some(true));
    }

    #[test]
    fn test_dynamic_body_writes_back_transform() {
        let config = RuntimeConfig::default();
        let mut physics = None;
        let mut scene = Scene::new("fall");
        let mut rigidbody = RigidbodyComponent::dynamic();
        rigidbody.use_shape(&unit_box());
        let body = scene.spawn((TransformComponent::from_position(Vec3::new(0.0, 10.0, 0.0)), rigidbody));
        let mut scenes = vec![scene];

        for _ in 0..30 {
            run(&mut physics, &config, &mut scenes, 1.0 / 60.0);
        }
        let y = scenes[0].world().get::<&TransformComponent>(body).unwrap().position().y;
        assert!(y < 10.0, "body should fall, y = {}", y);
    }
}
