// Playback state of one animation

use std::collections::HashMap;
use std::fmt;

use super::track::EventTrack;

type EventCallback = Box<dyn FnMut() + Send + Sync>;

/// Time, speed and weight of one named animation on an animator
pub struct AnimationController {
    is_playing: bool,
    is_looping: bool,
    speed: f32,
    weight: f32,
    time_ratio: f32,
    last_time_ratio: f32,
    has_looped: bool,
    stepped: bool,
    computed_weight: f32,
    callbacks: HashMap<String, Vec<EventCallback>>,
}

impl AnimationController {
    pub fn new() -> Self {
        Self {
            is_playing: false,
            is_looping: true,
            speed: 1.0,
            weight: 1.0,
            time_ratio: 0.0,
            last_time_ratio: 0.0,
            has_looped: false,
            stepped: false,
            computed_weight: 0.0,
            callbacks: HashMap::new(),
        }
    }

    pub fn play(&mut self) -> &mut Self {
        self.is_playing = true;
        self
    }

    pub fn pause(&mut self) -> &mut Self {
        self.is_playing = false;
        self.last_time_ratio = self.time_ratio;
        self
    }

    /// Stop and rewind to the start
    pub fn stop(&mut self) -> &mut Self {
        self.is_playing = false;
        self.time_ratio = 0.0;
        self.last_time_ratio = 0.0;
        self
    }

    /// Jump to a normalized time in [0, 1]
    pub fn set_time(&mut self, ratio: f32) -> &mut Self {
        self.time_ratio = ratio.clamp(0.0, 1.0);
        self.last_time_ratio = self.time_ratio;
        self
    }

    pub fn set_loop(&mut self, looping: bool) -> &mut Self {
        self.is_looping = looping;
        self
    }

    /// Playback rate in clip lengths per second
    pub fn set_speed(&mut self, speed: f32) -> &mut Self {
        self.speed = speed;
        self
    }

    pub fn set_weight(&mut self, weight: f32) -> &mut Self {
        self.weight = weight.max(0.0);
        self
    }

    /// Register `callback` for every crossing of the event `name`
    pub fn on_event<F>(&mut self, name: &str, callback: F) -> &mut Self
    where
        F: FnMut() + Send + Sync + 'static,
    {
        self.callbacks
            .entry(name.to_string())
            .or_default()
            .push(Box::new(callback));
        self
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn time_ratio(&self) -> f32 {
        self.time_ratio
    }

    pub fn last_time_ratio(&self) -> f32 {
        self.last_time_ratio
    }

    /// True if the last advance wrapped past the end
    pub fn has_looped(&self) -> bool {
        self.has_looped
    }

    /// True if the last advance moved time forward
    pub fn stepped(&self) -> bool {
        self.stepped
    }

    /// Weight used for blending this frame
    pub fn computed_weight(&self) -> f32 {
        self.computed_weight
    }

    /// Step time by `dt` seconds.
    ///
    /// Looping clips wrap at 1; others clamp there and stop.
    pub fn advance(&mut self, dt: f32) {
        self.stepped = self.is_playing;
        if self.is_playing {
            self.last_time_ratio = self.time_ratio;
            self.time_ratio += self.speed * dt;
        }
        self.has_looped = false;
        if self.time_ratio > 1.0 {
            if self.is_looping {
                self.has_looped = true;
                self.time_ratio = self.time_ratio.rem_euclid(1.0);
            } else {
                self.time_ratio = 1.0;
                self.is_playing = false;
            }
        }
        self.computed_weight = self.weight;
    }

    /// Invoke callbacks for events crossed by the last advance
    pub fn fire_events(&mut self, track: &EventTrack) {
        if !self.stepped {
            return;
        }
        for name in track.crossed(self.last_time_ratio, self.time_ratio) {
            if let Some(callbacks) = self.callbacks.get_mut(name) {
                for callback in callbacks.iter_mut() {
                    callback();
                }
            }
        }
    }
}

impl Default for AnimationController {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AnimationController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationController")
            .field("is_playing", &self.is_playing)
            .field("time_ratio", &self.time_ratio)
            .field("speed", &self.speed)
            .field("weight", &self.weight)
            .field("events", &self.callbacks.len())
            .finish()
    }
}
