// Keyframe sampling and weighted pose blending

use anyhow::Result;
use glam::{Quat, Vec3};

use super::skeleton::JointPose;
use crate::engine::assets::{AnimationData, QuatKey, Vec3Key};
use crate::engine::fetch::Resource;

/// Below this total weight the rest pose fills in
pub const BLEND_THRESHOLD: f32 = 0.1;

/// Find the keys around `time` and the blend factor between them
fn bracket<K>(keys: &[K], time: f32, key_time: impl Fn(&K) -> f32) -> Option<(usize, usize, f32)> {
    let last = keys.len().checked_sub(1)?;
    let next = keys.partition_point(|k| key_time(k) <= time);
    if next == 0 {
        return Some((0, 0, 0.0));
    }
    if next > last {
        return Some((last, last, 0.0));
    }
    let (t0, t1) = (key_time(&keys[next - 1]), key_time(&keys[next]));
    let span = t1 - t0;
    let alpha = if span > 0.0 { (time - t0) / span } else { 0.0 };
    Some((next - 1, next, alpha))
}

pub(crate) fn sample_vec3(keys: &[Vec3Key], time: f32) -> Option<Vec3> {
    let (a, b, alpha) = bracket(keys, time, |k| k.time)?;
    Some(Vec3::from_array(keys[a].value).lerp(Vec3::from_array(keys[b].value), alpha))
}

pub(crate) fn sample_quat(keys: &[QuatKey], time: f32) -> Option<Quat> {
    let (a, b, alpha) = bracket(keys, time, |k| k.time)?;
    let from = Quat::from_array(keys[a].value).normalize();
    let to = Quat::from_array(keys[b].value).normalize();
    Some(from.slerp(to, alpha))
}

/// Runtime animation clip, one channel per skeleton joint
#[derive(Debug, Clone, Default)]
pub struct Animation {
    data: AnimationData,
}

impl Animation {
    pub fn new(data: &AnimationData) -> Result<Self> {
        data.validate()?;
        Ok(Self { data: data.clone() })
    }

    pub fn transfer(&mut self) -> Self {
        std::mem::take(self)
    }

    pub fn is_owning(&self) -> bool {
        !self.data.tracks.is_empty()
    }

    pub fn duration(&self) -> f32 {
        self.data.duration
    }

    pub fn track_count(&self) -> usize {
        self.data.tracks.len()
    }

    /// Sample every joint at a normalized ratio; joints without keys keep `rest`
    pub fn sample(&self, ratio: f32, rest: &[JointPose]) -> Vec<JointPose> {
        let time = ratio.clamp(0.0, 1.0) * self.data.duration;
        rest.iter()
            .enumerate()
            .map(|(index, rest)| {
                let Some(track) = self.data.tracks.get(index) else {
                    return *rest;
                };
                JointPose {
                    translation: sample_vec3(&track.translations, time).unwrap_or(rest.translation),
                    rotation: sample_quat(&track.rotations, time).unwrap_or(rest.rotation),
                    scale: sample_vec3(&track.scales, time).unwrap_or(rest.scale),
                }
            })
            .collect()
    }
}

impl Resource for Animation {
    type Context = ();
}

/// Blend weighted layers joint by joint.
///
/// When the total weight is under `BLEND_THRESHOLD` the rest pose takes the
/// remainder, so a fading stack never collapses to a degenerate pose.
pub fn blend(layers: &[(Vec<JointPose>, f32)], rest: &[JointPose]) -> Vec<JointPose> {
    let total: f32 = layers.iter().map(|(_, w)| w.max(0.0)).sum();
    let rest_weight = (BLEND_THRESHOLD - total).max(0.0);

    rest.iter()
        .enumerate()
        .map(|(index, rest)| {
            let mut translation = rest.translation * rest_weight;
            let mut scale = rest.scale * rest_weight;
            let mut rotation = rest.rotation * rest_weight;
            let mut weight = rest_weight;

            for (pose, layer_weight) in layers {
                let w = layer_weight.max(0.0);
                let Some(joint) = pose.get(index) else {
                    continue;
                };
                translation += joint.translation * w;
                scale += joint.scale * w;
                // keep quaternions in one hemisphere before summing
                let sign = if rotation.dot(joint.rotation) < 0.0 { -1.0 } else { 1.0 };
                rotation = rotation + joint.rotation * (w * sign);
                weight += w;
            }

            if weight <= 0.0 {
                return *rest;
            }
            JointPose {
                translation: translation / weight,
                rotation: rotation.normalize(),
                scale: scale / weight,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::JointTrack;
    use approx::assert_relative_eq;

    fn slide() -> AnimationData {
        AnimationData {
            duration: 2.0,
            tracks: vec![JointTrack {
                translations: vec![
                    Vec3Key { time: 0.0, value: [0.0, 0.0, 0.0] },
                    Vec3Key { time: 2.0, value: [4.0, 0.0, 0.0] },
                ],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_sample_interpolates_between_keys() {
        let animation = Animation::new(&slide()).unwrap();
        let pose = animation.sample(0.25, &[JointPose::IDENTITY]);
        assert_relative_eq!(pose[0].translation.x, 1.0, epsilon = 1e-6);
        assert_eq!(pose[0].rotation, Quat::IDENTITY);
    }

    #[test]
    fn test_sample_clamps_outside_keys() {
        let keys = [Vec3Key { time: 1.0, value: [2.0, 0.0, 0.0] }];
        assert_eq!(sample_vec3(&keys, 0.0), Some(Vec3::new(2.0, 0.0, 0.0)));
        assert_eq!(sample_vec3(&keys, 5.0), Some(Vec3::new(2.0, 0.0, 0.0)));
        assert_eq!(sample_vec3(&[], 5.0), None);
    }

    #[test]
    fn test_blend_equal_weights_averages() {
        let a = vec![JointPose {
            translation: Vec3::new(2.0, 0.0, 0.0),
            ..JointPose::IDENTITY
        }];
        let b = vec![JointPose {
            translation: Vec3::new(4.0, 0.0, 0.0),
            ..JointPose::IDENTITY
        }];
        let out = blend(&[(a, 1.0), (b, 1.0)], &[JointPose::IDENTITY]);
        assert_relative_eq!(out[0].translation.x, 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_blend_without_layers_is_rest() {
        let rest = [JointPose {
            translation: Vec3::Y,
            ..JointPose::IDENTITY
        }];
        let out = blend(&[], &rest);
        assert_eq!(out[0].translation, Vec3::Y);
    }

    #[test]
    fn test_blend_handles_opposite_quaternions() {
        let q = Quat::from_rotation_y(0.5);
        let a = vec![JointPose {
            rotation: q,
            ..JointPose::IDENTITY
        }];
        let b = vec![JointPose {
            rotation: -q,
            ..JointPose::IDENTITY
        }];
        let out = blend(&[(a, 1.0), (b, 1.0)], &[JointPose::IDENTITY]);
        assert!(out[0].rotation.abs_diff_eq(q, 1e-5) || out[0].rotation.abs_diff_eq(-q, 1e-5));
    }
}
