/// Frame timing
///
/// Measures the real time between frames and hands the runtime a clamped
/// delta, so one long stall (a debugger break, a window drag) does not turn
/// into a huge physics and animation step.
use std::time::{Duration, Instant};

/// Longest delta handed to a frame
pub const MAX_FRAME_DELTA: Duration = Duration::from_millis(250);

/// FPS tracking window (average over last N frames)
const FPS_WINDOW_SIZE: usize = 60;

/// Wall clock driving the frame loop
pub struct FrameClock {
    /// Time of last frame
    last_frame_time: Instant,

    /// Time when the clock started
    start_time: Instant,

    paused: bool,

    /// Frame timing history for FPS calculation
    frame_times: Vec<Duration>,

    frame_count: u64,

    /// Current FPS (updated periodically)
    current_fps: f32,

    max_delta: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_max_delta(MAX_FRAME_DELTA)
    }

    pub fn with_max_delta(max_delta: Duration) -> Self {
        let now = Instant::now();
        Self {
            last_frame_time: now,
            start_time: now,
            paused: false,
            frame_times: Vec::with_capacity(FPS_WINDOW_SIZE),
            frame_count: 0,
            current_fps: 0.0,
            max_delta,
        }
    }

    /// Start a new frame, returning its delta in seconds
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let frame_time = now.duration_since(self.last_frame_time);
        self.last_frame_time = now;
        self.advance(frame_time)
    }

    /// Account for a frame that took `frame_time`
    pub fn advance(&mut self, frame_time: Duration) -> f32 {
        self.frame_count += 1;

        self.frame_times.push(frame_time);
        if self.frame_times.len() > FPS_WINDOW_SIZE {
            self.frame_times.remove(0);
        }
        // Update FPS counter every 10 frames
        if self.frame_count % 10 == 0 {
            self.update_fps();
        }

        if self.paused {
            return 0.0;
        }
        frame_time.min(self.max_delta).as_secs_f32()
    }

    pub fn fps(&self) -> f32 {
        self.current_fps
    }

    pub fn elapsed(&self) -> Duration {
        Instant::now().duration_since(self.start_time)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            log::info!("Clock paused");
        }
    }

    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            // the time spent paused is not a frame delta
            self.last_frame_time = Instant::now();
            log::info!("Clock resumed");
        }
    }

    pub fn toggle_pause(&mut self) {
        if self.paused {
            self.resume();
        } else {
            self.pause();
        }
    }

    fn update_fps(&mut self) {
        if self.frame_times.is_empty() {
            self.current_fps = 0.0;
            return;
        }

        let total: Duration = self.frame_times.iter().sum();
        let avg_frame_time = total / self.frame_times.len() as u32;

        self.current_fps = if avg_frame_time.as_secs_f32() > 0.0 {
            1.0 / avg_frame_time.as_secs_f32()
        } else {
            0.0
        };
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::thread;

    #[test]
    fn test_clock_creation() {
        let clock = FrameClock::new();
        assert_eq!(clock.frame_count(), 0);
        assert!(!clock.is_paused());
    }

    #[test]
    fn test_long_frame_clamped() {
        let mut clock = FrameClock::new();
        let dt = clock.advance(Duration::from_secs(3));
        assert_relative_eq!(dt, 0.25);
    }

    #[test]
    fn test_paused_yields_zero() {
        let mut clock = FrameClock::new();
        clock.pause();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(clock.tick(), 0.0);
        assert_eq!(clock.frame_count(), 1);
    }

    #[test]
    fn test_toggle_pause() {
        let mut clock = FrameClock::new();
        clock.toggle_pause();
        assert!(clock.is_paused());
        clock.toggle_pause();
        assert!(!clock.is_paused());
    }

    #[test]
    fn test_fps_over_window() {
        let mut clock = FrameClock::new();
        for _ in 0..10 {
            clock.advance(Duration::from_millis(20));
        }
        assert_relative_eq!(clock.fps(), 50.0, epsilon = 0.01);
    }

    #[test]
    fn test_tick_measures_real_time() {
        let mut clock = FrameClock::new();
        thread::sleep(Duration::from_millis(10));
        let dt = clock.tick();
        assert!(dt >= 0.01);
    }
}
