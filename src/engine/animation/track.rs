// Root motion and event tracks

use anyhow::Result;
use glam::{Mat4, Quat, Vec3};

use super::clip::{sample_quat, sample_vec3};
use crate::engine::assets::{EventTrackData, MotionTrackData};
use crate::engine::fetch::Resource;

/// Root motion sampled over a normalized ratio
#[derive(Debug, Clone, Default)]
pub struct MotionTrack {
    data: MotionTrackData,
}

impl MotionTrack {
    pub fn new(data: &MotionTrackData) -> Result<Self> {
        data.validate()?;
        Ok(Self { data: data.clone() })
    }

    pub fn transfer(&mut self) -> Self {
        std::mem::take(self)
    }

    pub fn is_owning(&self) -> bool {
        !self.data.translations.is_empty() || !self.data.rotations.is_empty()
    }

    /// Root transform at `ratio`, unit scale
    pub fn sample(&self, ratio: f32) -> Mat4 {
        let translation = sample_vec3(&self.data.translations, ratio).unwrap_or(Vec3::ZERO);
        let rotation = sample_quat(&self.data.rotations, ratio).unwrap_or(Quat::IDENTITY);
        Mat4::from_rotation_translation(rotation, translation)
    }

    /// Motion from `last` to `current`, adding the full cycle when the clip wrapped
    pub fn delta(&self, last: f32, current: f32, looped: bool) -> Mat4 {
        let mut end = self.sample(current);
        if looped {
            end = self.sample(1.0) * self.sample(0.0).inverse() * end;
        }
        end * self.sample(last).inverse()
    }
}

impl Resource for MotionTrack {
    type Context = ();
}

/// Named events at normalized times
#[derive(Debug, Clone, Default)]
pub struct EventTrack {
    events: Vec<(String, f32)>,
}

impl EventTrack {
    pub fn new(data: &EventTrackData) -> Result<Self> {
        Ok(Self {
            events: data
                .events
                .iter()
                .map(|event| (event.name.clone(), event.time.clamp(0.0, 1.0)))
                .collect(),
        })
    }

    pub fn transfer(&mut self) -> Self {
        std::mem::take(self)
    }

    pub fn is_owning(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events whose time lies in `(last, current]`, wrapping past 1 when
    /// `current < last`
    pub fn crossed(&self, last: f32, current: f32) -> impl Iterator<Item = &str> {
        self.events
            .iter()
            .filter(move |(_, t)| {
                if last <= current {
                    last < *t && *t <= current
                } else {
                    last < *t || *t <= current
                }
            })
            .map(|(name, _)| name.as_str())
    }
}

impl Resource for EventTrack {
    type Context = ();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::{EventKey, Vec3Key};
    use approx::assert_relative_eq;

    fn walk() -> MotionTrack {
        MotionTrack::new(&MotionTrackData {
            translations: vec![
                Vec3Key { time: 0.0, value: [0.0, 0.0, 0.0] },
                Vec3Key { time: 1.0, value: [0.0, 0.0, 2.0] },
            ],
            rotations: vec![],
        })
        .unwrap()
    }

    fn steps() -> EventTrack {
        EventTrack::new(&EventTrackData {
            events: vec![
                EventKey { name: "left".to_string(), time: 0.25 },
                EventKey { name: "right".to_string(), time: 0.75 },
            ],
        })
        .unwrap()
    }

    #[test]
    fn test_delta_over_frame() {
        let delta = walk().delta(0.25, 0.5, false);
        assert_relative_eq!(delta.w_axis.z, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_delta_across_loop() {
        // 0.9 -> 1.1 wrapped to 0.1
        let delta = walk().delta(0.9, 0.1, true);
        assert_relative_eq!(delta.w_axis.z, 0.4, epsilon = 1e-5);
    }

    #[test]
    fn test_events_crossed_in_order() {
        let track = steps();
        let crossed: Vec<&str> = track.crossed(0.2, 0.8).collect();
        assert_eq!(crossed, vec!["left", "right"]);
        assert_eq!(track.crossed(0.25, 0.5).count(), 0);
        assert_eq!(track.crossed(0.5, 0.75).collect::<Vec<_>>(), vec!["right"]);
    }

    #[test]
    fn test_events_crossed_with_wrap() {
        let track = steps();
        let crossed: Vec<&str> = track.crossed(0.8, 0.3).collect();
        assert_eq!(crossed, vec!["left"]);
    }
}
