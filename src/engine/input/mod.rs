// Input handling
//
// `InputState` collects winit window events as they arrive. Once per frame
// the runtime takes an `InputSnapshot` from it, which is what game code and
// interface callbacks read.
//
// ## Usage Example
//
// ```rust
// let mut input = InputState::new(1280, 720);
//
// // In the event loop
// input.process_window_event(&event);
//
// // Once per frame
// let snapshot = input.snapshot(clock.tick());
// if snapshot.just_pressed(KeyCode::Space) {
//     // jump
// }
// ```

mod snapshot;
mod state;

pub use snapshot::InputSnapshot;
pub use state::InputState;

pub use winit::event::MouseButton;
pub use winit::keyboard::KeyCode;
