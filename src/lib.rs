// lucent: an ECS game client runtime with asynchronous, deduplicated asset fetching

pub mod core;
pub mod engine;

pub use crate::core::RuntimeConfig;
pub use crate::engine::{FrameClock, FrameContext, Runtime, Scene, SceneId};
