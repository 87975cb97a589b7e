// Physics system using rapier3d

mod collision;
pub mod debug;
mod shape;
mod world;

pub use collision::{CollisionGroup, Contact, RaycastHit, MAX_LAYER};
pub use shape::{Shape, ShapeKind};
pub use world::PhysicsWorld;

// Re-export the rapier types components hold on to
pub use rapier3d::prelude::{ColliderHandle, RigidBodyHandle};
