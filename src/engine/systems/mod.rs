// Subsystem passes the runtime drives once per frame
//
// Order: motion, dynamics, mixer, rendering, overlay. Each pass polls the
// fetch containers it reads before using them.

pub(crate) mod dynamics;
pub(crate) mod mixer;
pub(crate) mod motion;
pub(crate) mod overlay;
mod rendering;

pub(crate) use rendering::Renderer;
