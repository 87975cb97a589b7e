// Per-frame view of keyboard, mouse and screen state

use std::collections::HashSet;

use glam::Vec2;
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

/// Input as seen by one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSnapshot {
    /// Drawable size in physical pixels
    pub screen_width: u32,
    pub screen_height: u32,

    /// Seconds since the previous frame
    pub dt: f32,

    /// Cursor position in pixels from the top left
    pub mouse_position: Vec2,

    /// Cursor movement since the previous frame
    pub mouse_delta: Vec2,

    pub(crate) pressed: HashSet<KeyCode>,
    pub(crate) just_pressed: HashSet<KeyCode>,
    pub(crate) just_released: HashSet<KeyCode>,
    pub(crate) buttons: HashSet<MouseButton>,
    pub(crate) buttons_just_pressed: HashSet<MouseButton>,
}

impl InputSnapshot {
    /// Empty input for a screen of the given size
    pub fn new(screen_width: u32, screen_height: u32, dt: f32) -> Self {
        Self {
            screen_width,
            screen_height,
            dt,
            ..Default::default()
        }
    }

    pub fn screen_size(&self) -> Vec2 {
        Vec2::new(self.screen_width as f32, self.screen_height as f32)
    }

    /// True when there is nothing to draw into, e.g. a minimized window
    pub fn is_minimized(&self) -> bool {
        self.screen_width == 0 || self.screen_height == 0
    }

    /// Check if a key is currently held
    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.pressed.contains(&key)
    }

    /// Check if a key went down this frame
    pub fn just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed.contains(&key)
    }

    /// Check if a key came up this frame
    pub fn just_released(&self, key: KeyCode) -> bool {
        self.just_released.contains(&key)
    }

    pub fn is_button_pressed(&self, button: MouseButton) -> bool {
        self.buttons.contains(&button)
    }

    pub fn button_just_pressed(&self, button: MouseButton) -> bool {
        self.buttons_just_pressed.contains(&button)
    }

    /// -1, 0 or 1 from a pair of opposing keys
    pub fn axis(&self, negative: KeyCode, positive: KeyCode) -> f32 {
        let mut value = 0.0;
        if self.is_pressed(negative) {
            value -= 1.0;
        }
        if self.is_pressed(positive) {
            value += 1.0;
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_is_minimized() {
        assert!(InputSnapshot::new(0, 720, 0.016).is_minimized());
        assert!(InputSnapshot::new(1280, 0, 0.016).is_minimized());
        assert!(!InputSnapshot::new(1280, 720, 0.016).is_minimized());
    }

    #[test]
    fn test_opposing_keys_cancel() {
        let mut snapshot = InputSnapshot::new(10, 10, 0.0);
        snapshot.pressed.insert(KeyCode::KeyA);
        assert_eq!(snapshot.axis(KeyCode::KeyA, KeyCode::KeyD), -1.0);

        snapshot.pressed.insert(KeyCode::KeyD);
        assert_eq!(snapshot.axis(KeyCode::KeyA, KeyCode::KeyD), 0.0);
    }
}
