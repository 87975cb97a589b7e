// Skeletal animation value types: skeletons, clips, motion and event tracks

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use super::codec::{Codec, Reader, Writer};
use super::AssetError;

/// Vector keyframe
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec3Key {
    pub time: f32,
    pub value: [f32; 3],
}

/// Quaternion keyframe, value stored as x, y, z, w
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct QuatKey {
    pub time: f32,
    pub value: [f32; 4],
}

fn check_sorted(name: &str, times: impl Iterator<Item = f32>) -> Result<()> {
    let mut last = f32::NEG_INFINITY;
    for time in times {
        if !time.is_finite() || time < last {
            return Err(AssetError::InvalidData(format!("{} keys are not sorted by time", name)).into());
        }
        last = time;
    }
    Ok(())
}

/// One joint of a skeleton and its rest pose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointData {
    pub name: String,
    /// Index of the parent joint, -1 for roots
    pub parent: i32,
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl JointData {
    pub fn new(name: &str, parent: i32, translation: [f32; 3]) -> Self {
        Self {
            name: name.to_string(),
            parent,
            translation,
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
        }
    }
}

/// Joint hierarchy, parents listed before their children
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkeletonData {
    pub joints: Vec<JointData>,
}

impl SkeletonData {
    pub fn validate(&self) -> Result<()> {
        for (index, joint) in self.joints.iter().enumerate() {
            if joint.parent >= index as i32 || joint.parent < -1 {
                return Err(AssetError::InvalidData(format!(
                    "joint {} has parent {}",
                    joint.name, joint.parent
                ))
                .into());
            }
        }
        Ok(())
    }
}

impl Codec for SkeletonData {
    const TAG: [u8; 4] = *b"SKEL";
    const VERSION: u32 = 1;

    fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::new(Self::TAG, Self::VERSION);
        writer.u32(self.joints.len() as u32);
        for joint in &self.joints {
            writer
                .string(&joint.name)
                .i32(joint.parent)
                .array(&joint.translation)
                .array(&joint.rotation)
                .array(&joint.scale);
        }
        writer.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes, Self::TAG, Self::VERSION)?;
        let count = reader.u32()? as usize;
        let mut joints = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            joints.push(JointData {
                name: reader.string()?,
                parent: reader.i32()?,
                translation: fixed(reader.array()?)?,
                rotation: fixed(reader.array()?)?,
                scale: fixed(reader.array()?)?,
            });
        }
        reader.finish()?;
        let skeleton = Self { joints };
        skeleton.validate()?;
        Ok(skeleton)
    }
}

fn fixed<const N: usize>(values: Vec<f32>) -> Result<[f32; N]> {
    let len = values.len();
    values
        .try_into()
        .map_err(|_| AssetError::InvalidData(format!("expected {} components, got {}", N, len)).into())
}

/// Keyframes of one joint, times in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointTrack {
    pub translations: Vec<Vec3Key>,
    pub rotations: Vec<QuatKey>,
    pub scales: Vec<Vec3Key>,
}

/// Animation clip with one track per skeleton joint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationData {
    pub duration: f32,
    pub tracks: Vec<JointTrack>,
}

impl AnimationData {
    pub fn validate(&self) -> Result<()> {
        if self.duration.is_nan() || self.duration <= 0.0 {
            return Err(AssetError::InvalidData(format!("animation duration {}", self.duration)).into());
        }
        for track in &self.tracks {
            check_sorted("translation", track.translations.iter().map(|k| k.time))?;
            check_sorted("rotation", track.rotations.iter().map(|k| k.time))?;
            check_sorted("scale", track.scales.iter().map(|k| k.time))?;
        }
        Ok(())
    }
}

impl Codec for AnimationData {
    const TAG: [u8; 4] = *b"ANIM";
    const VERSION: u32 = 1;

    fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::new(Self::TAG, Self::VERSION);
        writer.f32(self.duration).u32(self.tracks.len() as u32);
        for track in &self.tracks {
            writer
                .array(&track.translations)
                .array(&track.rotations)
                .array(&track.scales);
        }
        writer.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes, Self::TAG, Self::VERSION)?;
        let duration = reader.f32()?;
        let count = reader.u32()? as usize;
        let mut tracks = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            tracks.push(JointTrack {
                translations: reader.array()?,
                rotations: reader.array()?,
                scales: reader.array()?,
            });
        }
        reader.finish()?;
        let animation = Self { duration, tracks };
        animation.validate()?;
        Ok(animation)
    }
}

/// Root motion over a normalized ratio in [0, 1]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionTrackData {
    pub translations: Vec<Vec3Key>,
    pub rotations: Vec<QuatKey>,
}

impl MotionTrackData {
    pub fn validate(&self) -> Result<()> {
        check_sorted("motion translation", self.translations.iter().map(|k| k.time))?;
        check_sorted("motion rotation", self.rotations.iter().map(|k| k.time))
    }
}

impl Codec for MotionTrackData {
    const TAG: [u8; 4] = *b"MOTN";
    const VERSION: u32 = 1;

    fn encode(&self) -> Vec<u8> {
        Writer::new(Self::TAG, Self::VERSION)
            .array(&self.translations)
            .array(&self.rotations)
            .finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes, Self::TAG, Self::VERSION)?;
        let track = Self {
            translations: reader.array()?,
            rotations: reader.array()?,
        };
        reader.finish()?;
        track.validate()?;
        Ok(track)
    }
}

/// Named event at a normalized time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventKey {
    pub name: String,
    pub time: f32,
}

/// Events authored on an animation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventTrackData {
    pub events: Vec<EventKey>,
}

impl Codec for EventTrackData {
    const TAG: [u8; 4] = *b"EVNT";
    const VERSION: u32 = 1;

    fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::new(Self::TAG, Self::VERSION);
        writer.u32(self.events.len() as u32);
        for event in &self.events {
            writer.string(&event.name).f32(event.time);
        }
        writer.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes, Self::TAG, Self::VERSION)?;
        let count = reader.u32()? as usize;
        let mut events = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            events.push(EventKey {
                name: reader.string()?,
                time: reader.f32()?,
            });
        }
        reader.finish()?;
        Ok(Self { events })
    }
}
