// Engine modules: fetching, resources, components, passes and the frame driver

pub mod animation;
pub mod assets;
pub mod audio;
pub mod clock;
pub mod ecs;
pub mod fetch;
pub mod input;
pub mod physics;
pub mod release;
pub mod renderer;
pub mod runtime;
pub mod scene;
mod systems;

pub use clock::FrameClock;
pub use runtime::{FrameContext, Runtime, SceneId};
pub use scene::Scene;
