// Audio: the audio device seam, sound buffers and voices
//
// A `Sound` is decoded sample data living on the device. A `Voice` is a
// positioned source a speaker plays sounds through.

mod headless;
#[cfg(feature = "kira-audio")]
mod kira_device;
mod sound;

pub use headless::{HeadlessAudio, VoiceState};
#[cfg(feature = "kira-audio")]
pub use kira_device::KiraAudio;
pub use sound::{Sound, Voice};

use anyhow::Result;
use glam::Vec3;

use crate::engine::assets::AudioData;
use crate::engine::release::Releaser;
use crate::fatal;

/// Opaque audio object id; zero is never valid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AudioHandle(pub u32);

impl AudioHandle {
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    pub(crate) fn checked(self, what: &str) -> Self {
        if self.is_null() {
            fatal!("Audio device returned a null {} handle", what);
        }
        self
    }
}

/// An audio object queued for release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioResource {
    Buffer(AudioHandle),
    Voice(AudioHandle),
}

impl AudioResource {
    pub fn handle(&self) -> AudioHandle {
        match *self {
            AudioResource::Buffer(h) | AudioResource::Voice(h) => h,
        }
    }
}

/// Listener pose; `up` is orthogonal to `forward`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenerPose {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
}

/// Main-thread audio API used by the mixer pass
pub trait AudioDevice {
    /// Store decoded samples as a playable buffer
    fn create_buffer(&mut self, sound: &AudioData) -> Result<AudioHandle>;

    /// Create a positioned voice
    fn create_voice(&mut self) -> Result<AudioHandle>;

    /// Attach a buffer to a voice, stopping whatever it was playing
    fn bind(&mut self, voice: AudioHandle, buffer: AudioHandle) -> Result<()>;

    fn play(&mut self, voice: AudioHandle, looping: bool, volume: f32) -> Result<()>;
    fn stop(&mut self, voice: AudioHandle);
    fn is_playing(&self, voice: AudioHandle) -> bool;
    fn set_voice_position(&mut self, voice: AudioHandle, position: Vec3, forward: Vec3);
    fn set_listener(&mut self, pose: ListenerPose);

    fn releaser(&self) -> Releaser<AudioResource>;

    /// Free every released handle, returning how many were freed
    fn collect_garbage(&mut self) -> usize;
}
