// Interface component: screen-space quads produced by a user callback

use std::fmt;

use glam::{Vec2, Vec4};

use crate::engine::fetch::{FetchProgress, Fetched};
use crate::engine::renderer::{GraphicsDevice, Texture};

/// One screen-space rectangle, in pixels from the top left
#[derive(Debug, Clone)]
pub struct Quad {
    pub position: Vec2,
    pub size: Vec2,
    pub color: Vec4,
    pub texture: Option<Fetched<Texture>>,
}

/// What an interface callback sees and draws into for one frame
pub struct InterfaceFrame<'a> {
    pub screen: Vec2,
    /// Fetch counters, for loading bars
    pub progress: FetchProgress,
    quads: &'a mut Vec<Quad>,
}

impl<'a> InterfaceFrame<'a> {
    pub(crate) fn new(screen: Vec2, progress: FetchProgress, quads: &'a mut Vec<Quad>) -> Self {
        Self {
            screen,
            progress,
            quads,
        }
    }

    pub fn colored(&mut self, position: Vec2, size: Vec2, color: Vec4) -> &mut Self {
        self.quads.push(Quad {
            position,
            size,
            color,
            texture: None,
        });
        self
    }

    /// Quad sampling `texture`, tinted by `color`; skipped until the texture is ready
    pub fn textured(&mut self, position: Vec2, size: Vec2, texture: &Fetched<Texture>, color: Vec4) -> &mut Self {
        self.quads.push(Quad {
            position,
            size,
            color,
            texture: Some(texture.clone()),
        });
        self
    }
}

type InterfaceCallback = Box<dyn FnMut(&mut InterfaceFrame) + Send + Sync>;

/// Draws a 2D overlay each frame through a callback
pub struct InterfaceComponent {
    callback: InterfaceCallback,
}

impl InterfaceComponent {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(&mut InterfaceFrame) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Run the callback and return this frame's quads, polling their textures
    pub(crate) fn build(&mut self, screen: Vec2, progress: FetchProgress, device: &mut (dyn GraphicsDevice + 'static)) -> Vec<Quad> {
        let mut quads = Vec::new();
        (self.callback)(&mut InterfaceFrame::new(screen, progress, &mut quads));
        for quad in &quads {
            if let Some(texture) = &quad.texture {
                texture.poll(device);
            }
        }
        quads
    }
}

impl fmt::Debug for InterfaceComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceComponent").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::renderer::HeadlessDevice;

    #[test]
    fn test_callback_emits_quads() {
        let mut device = HeadlessDevice::new();
        let mut interface = InterfaceComponent::new(|frame| {
            let width = frame.screen.x * frame.progress.ratio();
            frame.colored(Vec2::ZERO, Vec2::new(width, 8.0), Vec4::ONE);
        });

        let quads = interface.build(Vec2::new(200.0, 100.0), FetchProgress::default(), &mut device);
        assert_eq!(quads.len(), 1);
        assert!(quads[0].texture.is_none());
        assert_eq!(quads[0].size.y, 8.0);
    }
}
