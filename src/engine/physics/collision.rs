// Collision groups and contact reports

use glam::Vec3;
use rapier3d::prelude::*;

/// Highest layer index usable with `CollisionGroup::Layer`
pub const MAX_LAYER: u8 = 27;

/// Membership of a collider or body
///
/// Grounds and walls are static world geometry. Layers are user-defined
/// groups that kinematic bodies can opt into sensing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionGroup {
    Kinematic,
    Dynamic,
    Ground,
    Wall,
    Layer(u8),
}

impl CollisionGroup {
    pub fn bits(self) -> Group {
        match self {
            CollisionGroup::Kinematic => Group::GROUP_1,
            CollisionGroup::Dynamic => Group::GROUP_2,
            CollisionGroup::Ground => Group::GROUP_3,
            CollisionGroup::Wall => Group::GROUP_4,
            CollisionGroup::Layer(n) => Group::from_bits_truncate(1 << (4 + n.min(MAX_LAYER) as u32)),
        }
    }

    /// Recover the group from a membership mask, if it has exactly one bit
    pub fn from_bits(bits: Group) -> Option<Self> {
        let raw = bits.bits();
        if raw.count_ones() != 1 {
            return None;
        }
        Some(match raw.trailing_zeros() {
            0 => CollisionGroup::Kinematic,
            1 => CollisionGroup::Dynamic,
            2 => CollisionGroup::Ground,
            3 => CollisionGroup::Wall,
            n => CollisionGroup::Layer((n - 4) as u8),
        })
    }

    /// Default interaction filter for a static collider in this group
    pub fn collider_groups(self) -> InteractionGroups {
        let filter = match self {
            // Layers are sensed by kinematic bodies only
            CollisionGroup::Layer(_) => CollisionGroup::Kinematic.bits(),
            _ => CollisionGroup::Kinematic.bits() | CollisionGroup::Dynamic.bits(),
        };
        InteractionGroups::new(self.bits(), filter)
    }
}

/// One contact between a kinematic body and another collider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Contact point on the other collider
    pub position: Vec3,
    /// Normal pointing from the other collider toward the body
    pub normal: Vec3,
    /// Signed separation, negative when penetrating
    pub distance: f32,
}

/// Result of a ray query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub position: Vec3,
    pub normal: Vec3,
    pub collider: ColliderHandle,
}
