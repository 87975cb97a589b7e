// Debug line collection for physics objects

use glam::Vec3;

use super::collision::Contact;
use super::world::PhysicsWorld;
use crate::core::math::from_vector;
use crate::engine::renderer::DebugLine;

/// Colors used by the physics overlay
pub const COLLIDER_COLOR: Vec3 = Vec3::new(0.0, 1.0, 0.0);
pub const SENSOR_COLOR: Vec3 = Vec3::new(1.0, 1.0, 0.0);
pub const CONTACT_COLOR: Vec3 = Vec3::new(1.0, 0.0, 1.0);

/// Length of contact normal lines
const NORMAL_LENGTH: f32 = 0.2;

/// The 12 edges of an axis-aligned box
pub fn box_lines(min: Vec3, max: Vec3, color: Vec3) -> Vec<DebugLine> {
    let corner = |i: usize| {
        Vec3::new(
            if i & 1 == 0 { min.x } else { max.x },
            if i & 2 == 0 { min.y } else { max.y },
            if i & 4 == 0 { min.z } else { max.z },
        )
    };
    let mut lines = Vec::with_capacity(12);
    for i in 0..8 {
        for bit in [1, 2, 4] {
            // each edge once, from the corner with the bit cleared
            if i & bit == 0 {
                lines.push(DebugLine::new(corner(i), corner(i | bit), color));
            }
        }
    }
    lines
}

/// World bounds of every collider; sensors get their own color
pub fn collider_lines(world: &PhysicsWorld) -> Vec<DebugLine> {
    world
        .colliders()
        .flat_map(|(_, collider)| {
            let aabb = collider.compute_aabb();
            let color = if collider.is_sensor() { SENSOR_COLOR } else { COLLIDER_COLOR };
            box_lines(from_vector(&aabb.mins.coords), from_vector(&aabb.maxs.coords), color)
        })
        .collect()
}

/// A short line along each contact normal
pub fn contact_lines(contacts: &[Contact]) -> Vec<DebugLine> {
    contacts
        .iter()
        .map(|contact| {
            DebugLine::new(
                contact.position,
                contact.position + contact.normal.normalize_or_zero() * NORMAL_LENGTH,
                CONTACT_COLOR,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::prelude::{ColliderBuilder, RigidBodyBuilder};

    #[test]
    fn test_box_has_twelve_unit_edges() {
        let lines = box_lines(Vec3::ZERO, Vec3::ONE, COLLIDER_COLOR);
        assert_eq!(lines.len(), 12);
        assert!(lines.iter().all(|l| (l.to - l.from).length() == 1.0));
    }

    #[test]
    fn test_collider_lines_per_collider() {
        let mut world = PhysicsWorld::default();
        let body = world.add_rigid_body(RigidBodyBuilder::fixed().build());
        world.add_collider(ColliderBuilder::cuboid(1.0, 1.0, 1.0).build(), body);
        world.add_collider(ColliderBuilder::ball(1.0).sensor(true).build(), body);

        let lines = collider_lines(&world);
        assert_eq!(lines.len(), 24);
        assert_eq!(lines.iter().filter(|l| l.color == SENSOR_COLOR).count(), 12);
    }

    #[test]
    fn test_contact_lines_follow_normals() {
        let contact = Contact {
            position: Vec3::ZERO,
            normal: Vec3::new(0.0, 2.0, 0.0),
            distance: -0.1,
        };
        let lines = contact_lines(&[contact]);
        assert_eq!(lines[0].to, Vec3::new(0.0, NORMAL_LENGTH, 0.0));
    }
}
