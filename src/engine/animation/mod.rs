// CPU animation runtime: skeletons, clips, root motion and events

mod clip;
mod controller;
mod skeleton;
mod track;

pub use clip::{blend, Animation, BLEND_THRESHOLD};
pub use controller::AnimationController;
pub use skeleton::{JointPose, Skeleton};
pub use track::{EventTrack, MotionTrack};
