// Debug overlay: line lists for transforms, skeletons and physics

use glam::Vec3;

use crate::engine::ecs::{AnimatorComponent, RigidbodyComponent, TransformComponent};
use crate::engine::physics::{debug, Contact, PhysicsWorld};
use crate::engine::renderer::DebugLine;
use crate::engine::scene::Scene;

const AXIS_LENGTH: f32 = 0.2;
const BONE_COLOR: Vec3 = Vec3::new(0.0, 1.0, 1.0);

fn transform_axes(transform: &TransformComponent, lines: &mut Vec<DebugLine>) {
    let origin = transform.position();
    for (axis, color) in [
        (transform.right(), Vec3::X),
        (transform.up(), Vec3::Y),
        (transform.forward(), Vec3::Z),
    ] {
        lines.push(DebugLine::new(origin, origin + axis * AXIS_LENGTH, color));
    }
}

/// One segment from each joint to its parent, in world space
fn skeleton_bones(animator: &AnimatorComponent, transform: &TransformComponent, lines: &mut Vec<DebugLine>) {
    let Some(skeleton) = animator.skeleton().try_value() else {
        return;
    };
    let joints = animator.model_transforms();
    let world = transform.matrix();
    for (index, joint) in joints.iter().enumerate() {
        let Some(parent) = skeleton.parent(index).and_then(|p| joints.get(p)) else {
            continue;
        };
        lines.push(DebugLine::new(
            world.transform_point3(parent.w_axis.truncate()),
            world.transform_point3(joint.w_axis.truncate()),
            BONE_COLOR,
        ));
    }
}

/// Every overlay line for this frame
pub(crate) fn collect(scenes: &[Scene], physics: Option<&PhysicsWorld>) -> Vec<DebugLine> {
    let mut lines = Vec::new();
    let mut contacts: Vec<Contact> = Vec::new();

    for scene in scenes {
        let world = scene.world();
        for (_, transform) in world.query::<&TransformComponent>().iter() {
            transform_axes(transform, &mut lines);
        }
        for (_, (animator, transform)) in world.query::<(&AnimatorComponent, &TransformComponent)>().iter() {
            skeleton_bones(animator, transform, &mut lines);
        }
        for (_, rigidbody) in world.query::<&RigidbodyComponent>().iter() {
            if let Some(kinematic) = rigidbody.as_kinematic() {
                contacts.extend(kinematic.all_contacts().copied());
            }
        }
    }

    if let Some(physics) = physics {
        lines.extend(debug::collider_lines(physics));
    }
    lines.extend(debug::contact_lines(&contacts));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::animation::Skeleton;
    use crate::engine::assets::{JointData, SkeletonData};
    use crate::engine::fetch::Fetched;

    #[test]
    fn test_axes_per_transform() {
        let mut scene = Scene::new("debug");
        scene.spawn((TransformComponent::new(),));
        scene.spawn((TransformComponent::from_position(Vec3::ONE),));

        let lines = collect(&[scene], None);
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0].to - lines[0].from, Vec3::X * AXIS_LENGTH);
    }

    #[test]
    fn test_bone_lines_follow_pose() {
        let skeleton = Skeleton::new(&SkeletonData {
            joints: vec![
                JointData::new("hips", -1, [0.0, 1.0, 0.0]),
                JointData::new("spine", 0, [0.0, 0.5, 0.0]),
                JointData::new("head", 1, [0.0, 0.5, 0.0]),
            ],
        })
        .unwrap();
        let mut animator = AnimatorComponent::new();
        animator.use_skeleton(&Fetched::ready(skeleton));
        animator.animate();

        let mut scene = Scene::new("debug");
        scene.spawn((TransformComponent::from_position(Vec3::X), animator));

        let lines = collect(&[scene], None);
        let bones: Vec<_> = lines.iter().filter(|l| l.color == BONE_COLOR).collect();
        assert_eq!(bones.len(), 2);
        assert_eq!(bones[1].to, Vec3::new(1.0, 2.0, 0.0));
    }
}
