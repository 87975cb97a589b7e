// Input state accumulated from winit events between frames

use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use super::snapshot::InputSnapshot;

/// Collects window events until the next frame takes a snapshot
#[derive(Debug, Default)]
pub struct InputState {
    screen_width: u32,
    screen_height: u32,

    /// Keys currently held
    pressed: HashSet<KeyCode>,

    /// Keys that went down since the last snapshot
    just_pressed: HashSet<KeyCode>,

    /// Keys that came up since the last snapshot
    just_released: HashSet<KeyCode>,

    buttons: HashSet<MouseButton>,
    buttons_just_pressed: HashSet<MouseButton>,

    mouse_position: Option<Vec2>,
    mouse_delta: Vec2,
}

impl InputState {
    pub fn new(screen_width: u32, screen_height: u32) -> Self {
        Self {
            screen_width,
            screen_height,
            ..Default::default()
        }
    }

    /// Process a window event from winit
    pub fn process_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                // Only physical keys; repeats are not new presses
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed if !event.repeat => self.press(key),
                        ElementState::Pressed => {}
                        ElementState::Released => self.release(key),
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => self.press_button(*button),
                ElementState::Released => self.release_button(*button),
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.move_cursor(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::Resized(size) => self.resize(size.width, size.height),
            WindowEvent::Focused(false) => self.release_all(),
            _ => {}
        }
    }

    /// Register a key press
    pub fn press(&mut self, key: KeyCode) {
        if self.pressed.insert(key) {
            self.just_pressed.insert(key);
        }
    }

    /// Register a key release
    pub fn release(&mut self, key: KeyCode) {
        if self.pressed.remove(&key) {
            self.just_released.insert(key);
        }
    }

    pub fn press_button(&mut self, button: MouseButton) {
        if self.buttons.insert(button) {
            self.buttons_just_pressed.insert(button);
        }
    }

    pub fn release_button(&mut self, button: MouseButton) {
        self.buttons.remove(&button);
    }

    /// Move the cursor; the first position seen produces no delta
    pub fn move_cursor(&mut self, position: Vec2) {
        if let Some(previous) = self.mouse_position {
            self.mouse_delta += position - previous;
        }
        self.mouse_position = Some(position);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.screen_width = width;
        self.screen_height = height;
    }

    pub fn screen_size(&self) -> (u32, u32) {
        (self.screen_width, self.screen_height)
    }

    /// Drop every held key and button, e.g. when focus is lost
    pub fn release_all(&mut self) {
        self.just_released.extend(self.pressed.drain());
        self.buttons.clear();
    }

    /// State for the frame about to run; per-frame edges and the mouse delta
    /// start over afterwards
    pub fn snapshot(&mut self, dt: f32) -> InputSnapshot {
        let snapshot = InputSnapshot {
            screen_width: self.screen_width,
            screen_height: self.screen_height,
            dt,
            mouse_position: self.mouse_position.unwrap_or(Vec2::ZERO),
            mouse_delta: self.mouse_delta,
            pressed: self.pressed.clone(),
            just_pressed: std::mem::take(&mut self.just_pressed),
            just_released: std::mem::take(&mut self.just_released),
            buttons: self.buttons.clone(),
            buttons_just_pressed: std::mem::take(&mut self.buttons_just_pressed),
        };
        self.mouse_delta = Vec2::ZERO;
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_edges_last_one_snapshot() {
        let mut input = InputState::new(800, 600);
        input.press(KeyCode::Space);

        let first = input.snapshot(0.016);
        assert!(first.just_pressed(KeyCode::Space));
        assert!(first.is_pressed(KeyCode::Space));

        let second = input.snapshot(0.016);
        assert!(!second.just_pressed(KeyCode::Space));
        assert!(second.is_pressed(KeyCode::Space));
    }

    #[test]
    fn test_held_key_pressed_again_is_not_new() {
        let mut input = InputState::new(800, 600);
        input.press(KeyCode::KeyW);
        input.snapshot(0.016);
        input.press(KeyCode::KeyW);
        assert!(!input.snapshot(0.016).just_pressed(KeyCode::KeyW));
    }

    #[test]
    fn test_release() {
        let mut input = InputState::new(800, 600);
        input.press(KeyCode::KeyA);
        input.snapshot(0.016);
        input.release(KeyCode::KeyA);

        let snapshot = input.snapshot(0.016);
        assert!(!snapshot.is_pressed(KeyCode::KeyA));
        assert!(snapshot.just_released(KeyCode::KeyA));
    }

    #[test]
    fn test_mouse_delta_accumulates_between_snapshots() {
        let mut input = InputState::new(800, 600);
        input.move_cursor(Vec2::new(10.0, 10.0));
        input.move_cursor(Vec2::new(15.0, 12.0));
        input.move_cursor(Vec2::new(20.0, 20.0));

        let snapshot = input.snapshot(0.016);
        assert_eq!(snapshot.mouse_position, Vec2::new(20.0, 20.0));
        assert_eq!(snapshot.mouse_delta, Vec2::new(10.0, 10.0));
        assert_eq!(input.snapshot(0.016).mouse_delta, Vec2::ZERO);
    }

    #[test]
    fn test_focus_loss_releases_everything() {
        let mut input = InputState::new(800, 600);
        input.press(KeyCode::ShiftLeft);
        input.press_button(MouseButton::Left);
        input.process_window_event(&WindowEvent::Focused(false));

        let snapshot = input.snapshot(0.016);
        assert!(!snapshot.is_pressed(KeyCode::ShiftLeft));
        assert!(snapshot.just_released(KeyCode::ShiftLeft));
        assert!(!snapshot.is_button_pressed(MouseButton::Left));
    }

    #[test]
    fn test_resize_event() {
        let mut input = InputState::new(800, 600);
        input.process_window_event(&WindowEvent::Resized(winit::dpi::PhysicalSize::new(0, 0)));
        assert!(input.snapshot(0.016).is_minimized());
    }
}
