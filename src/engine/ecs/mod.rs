// ECS components attached to scene entities

mod animator;
mod collider;
mod interface;
mod model;
mod rigidbody;
mod skybox;
mod speaker;
mod transform;

pub use animator::AnimatorComponent;
pub use collider::ColliderComponent;
pub use interface::{InterfaceComponent, InterfaceFrame, Quad};
pub use model::{ModelComponent, ModelKind};
pub use rigidbody::{DynamicBody, KinematicBody, MotionTargets, PdGains, RigidbodyComponent, RigidbodyKind};
pub use skybox::SkyboxComponent;
pub use speaker::SpeakerComponent;
pub use transform::{TransformComponent, Transforms};

// Cameras are plain `Camera` components next to a transform
pub use crate::engine::renderer::Camera;

/// Marks the entity the audio listener follows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerComponent;
