// Motion pass: animation controllers, poses and root motion

use hecs::World;

use crate::engine::ecs::{AnimatorComponent, RigidbodyComponent, TransformComponent, Transforms};

/// Advance every animator by `dt` and apply its root motion.
///
/// Entities with an instanced dynamic body turn root motion into PD targets
/// for the dynamics pass. Everything else moves its transform directly.
pub(crate) fn run(world: &mut World, dt: f32) {
    let animated = world.query_mut::<(
        &mut AnimatorComponent,
        Option<&mut TransformComponent>,
        Option<&mut RigidbodyComponent>,
    )>();
    for (_, (animator, transform, rigidbody)) in animated {
        animator.poll();
        animator.advance(dt);
        animator.animate();

        let Some(transform) = transform else {
            continue;
        };
        let deltas = animator.root_motion();

        if let Some(rigidbody) = rigidbody.filter(|r| r.is_instanced()) {
            if let Some(shape) = rigidbody.shape().try_value() {
                if let Some(dynamic) = rigidbody.as_dynamic_mut() {
                    dynamic.follow_motion(transform.matrix(), shape.feet_to_center(), &deltas, dt);
                    continue;
                }
            }
        }
        for delta in deltas {
            transform.set_transform_relative(delta);
        }
    }
    Transforms::propagate(world);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::animation::{Animation, MotionTrack};
    use crate::engine::assets::{AnimationData, JointTrack, MotionTrackData, Vec3Key};
    use crate::engine::fetch::Fetched;
    use approx::assert_relative_eq;
    use glam::Vec3;

    fn walk_clip() -> (Fetched<Animation>, Fetched<MotionTrack>) {
        let clip = AnimationData {
            duration: 1.0,
            tracks: vec![JointTrack::default()],
        };
        let track = MotionTrackData {
            translations: vec![
                Vec3Key {
                    time: 0.0,
                    value: [0.0, 0.0, 0.0],
                },
                Vec3Key {
                    time: 1.0,
                    value: [0.0, 0.0, 2.0],
                },
            ],
            ..Default::default()
        };
        (
            Fetched::ready(Animation::new(&clip).unwrap()),
            Fetched::ready(MotionTrack::new(&track).unwrap()),
        )
    }

    #[test]
    fn test_root_motion_moves_transform_and_children() {
        let (clip, track) = walk_clip();
        let mut animator = AnimatorComponent::new();
        animator.use_animation("walk", &clip).use_motion_track("walk", &track);
        animator.controller("walk").play().set_loop(true);

        let mut world = World::new();
        let walker = world.spawn((TransformComponent::new(), animator));
        let hat = world.spawn((TransformComponent::from_position(Vec3::Y),));
        Transforms::use_parent(&mut world, hat, walker).unwrap();

        run(&mut world, 0.25);
        let walker_z = world.get::<&TransformComponent>(walker).unwrap().position().z;
        let hat_position = world.get::<&TransformComponent>(hat).unwrap().position();
        assert_relative_eq!(walker_z, 0.5, epsilon = 1e-4);
        assert_relative_eq!(hat_position.z, 0.5, epsilon = 1e-4);
        assert_relative_eq!(hat_position.y, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_animator_without_transform_still_advances() {
        let (clip, _) = walk_clip();
        let mut animator = AnimatorComponent::new();
        animator.use_animation("walk", &clip);
        animator.controller("walk").play();

        let mut world = World::new();
        let entity = world.spawn((animator,));
        run(&mut world, 0.5);

        let mut animator = world.get::<&mut AnimatorComponent>(entity).unwrap();
        assert_relative_eq!(animator.controller("walk").time_ratio(), 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_paused_clip_leaves_transform() {
        let (clip, track) = walk_clip();
        let mut animator = AnimatorComponent::new();
        animator.use_animation("walk", &clip).use_motion_track("walk", &track);

        let mut world = World::new();
        let walker = world.spawn((TransformComponent::new(), animator));
        run(&mut world, 0.25);
        let position = world.get::<&TransformComponent>(walker).unwrap().position();
        assert_eq!(position, Vec3::ZERO);
    }
}
