// Audio device backed by kira spatial tracks

use anyhow::Result;
use glam::{Mat3, Quat, Vec3};
use kira::sound::static_sound::{StaticSoundData, StaticSoundHandle, StaticSoundSettings};
use kira::sound::PlaybackState;
use kira::track::{SpatialTrackBuilder, SpatialTrackDistances, SpatialTrackHandle};
use kira::{AudioManager, AudioManagerSettings, Decibels, DefaultBackend, Frame, Tween};
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{AudioDevice, AudioHandle, AudioResource, ListenerPose};
use crate::engine::assets::AudioData;
use crate::engine::release::{ReleaseQueue, Releaser};
use crate::engine::renderer::DeviceError;

const MIN_DISTANCE: f32 = 1.0;
const MAX_DISTANCE: f32 = 50.0;

struct KiraVoice {
    track: SpatialTrackHandle,
    buffer: Option<AudioHandle>,
    sound: Option<StaticSoundHandle>,
}

/// Speaker output through kira; each voice is a spatial sub-track
pub struct KiraAudio {
    manager: AudioManager<DefaultBackend>,
    listener: Option<kira::listener::ListenerHandle>,
    next_handle: u32,
    buffers: HashMap<AudioHandle, StaticSoundData>,
    voices: HashMap<AudioHandle, KiraVoice>,
    release_queue: ReleaseQueue<AudioResource>,
}

impl KiraAudio {
    pub fn new() -> Result<Self> {
        let manager = AudioManager::<DefaultBackend>::new(AudioManagerSettings::default())
            .map_err(|e| DeviceError::Backend(format!("no audio device: {}", e)))?;
        info!("Audio device initialized");
        Ok(Self {
            manager,
            listener: None,
            next_handle: 1,
            buffers: HashMap::new(),
            voices: HashMap::new(),
            release_queue: ReleaseQueue::new(),
        })
    }

    fn next_handle(&mut self) -> AudioHandle {
        let handle = AudioHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }
}

fn immediate() -> Tween {
    Tween {
        duration: Duration::ZERO,
        ..Default::default()
    }
}

/// Convert linear amplitude to decibels
fn amplitude_to_db(amplitude: f32) -> Decibels {
    if amplitude <= 0.0 {
        Decibels(-60.0)
    } else {
        Decibels((20.0 * amplitude.log10()).max(-60.0))
    }
}

/// Listener rotation looking down -Z in its local frame
fn listener_orientation(forward: Vec3, up: Vec3) -> Quat {
    let back = -forward.normalize_or_zero();
    let right = up.cross(back).normalize_or_zero();
    if right == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    Quat::from_mat3(&Mat3::from_cols(right, back.cross(right), back))
}

impl AudioDevice for KiraAudio {
    fn create_buffer(&mut self, sound: &AudioData) -> Result<AudioHandle> {
        sound.validate()?;
        let frames: Arc<[Frame]> = sound.samples.iter().map(|s| Frame::from_mono(*s)).collect();
        let data = StaticSoundData {
            sample_rate: sound.sample_rate,
            frames,
            settings: StaticSoundSettings::default(),
            slice: None,
        };
        let handle = self.next_handle();
        self.buffers.insert(handle, data);
        Ok(handle)
    }

    fn create_voice(&mut self) -> Result<AudioHandle> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| DeviceError::Backend("voice created before the listener".to_string()))?
            .id();
        let builder = SpatialTrackBuilder::new().distances(SpatialTrackDistances {
            min_distance: MIN_DISTANCE,
            max_distance: MAX_DISTANCE,
        });
        let track = self
            .manager
            .add_spatial_sub_track(listener, Vec3::ZERO, builder)
            .map_err(|e| DeviceError::Backend(format!("spatial track: {}", e)))?;

        let handle = self.next_handle();
        self.voices.insert(
            handle,
            KiraVoice {
                track,
                buffer: None,
                sound: None,
            },
        );
        Ok(handle)
    }

    fn bind(&mut self, voice: AudioHandle, buffer: AudioHandle) -> Result<()> {
        if !self.buffers.contains_key(&buffer) {
            return Err(DeviceError::InvalidHandle(buffer.0).into());
        }
        let state = self
            .voices
            .get_mut(&voice)
            .ok_or(DeviceError::InvalidHandle(voice.0))?;
        if let Some(mut sound) = state.sound.take() {
            sound.stop(immediate());
        }
        state.buffer = Some(buffer);
        Ok(())
    }

    fn play(&mut self, voice: AudioHandle, looping: bool, volume: f32) -> Result<()> {
        let state = self
            .voices
            .get_mut(&voice)
            .ok_or(DeviceError::InvalidHandle(voice.0))?;
        let data = state
            .buffer
            .and_then(|buffer| self.buffers.get(&buffer))
            .ok_or(DeviceError::InvalidHandle(voice.0))?;

        let mut data = data.clone().volume(amplitude_to_db(volume));
        if looping {
            data = data.loop_region(..);
        }
        if let Some(mut sound) = state.sound.take() {
            sound.stop(immediate());
        }
        let sound = state
            .track
            .play(data)
            .map_err(|e| DeviceError::Backend(format!("play: {}", e)))?;
        state.sound = Some(sound);
        Ok(())
    }

    fn stop(&mut self, voice: AudioHandle) {
        if let Some(sound) = self.voices.get_mut(&voice).and_then(|v| v.sound.as_mut()) {
            sound.stop(immediate());
        }
    }

    fn is_playing(&self, voice: AudioHandle) -> bool {
        self.voices
            .get(&voice)
            .and_then(|v| v.sound.as_ref())
            .is_some_and(|sound| sound.state() == PlaybackState::Playing)
    }

    fn set_voice_position(&mut self, voice: AudioHandle, position: Vec3, _forward: Vec3) {
        if let Some(state) = self.voices.get_mut(&voice) {
            state.track.set_position(position, immediate());
        }
    }

    fn set_listener(&mut self, pose: ListenerPose) {
        let orientation = listener_orientation(pose.forward, pose.up);
        match &mut self.listener {
            Some(listener) => {
                listener.set_position(pose.position, immediate());
                listener.set_orientation(orientation, immediate());
            }
            None => match self.manager.add_listener(pose.position, orientation) {
                Ok(listener) => {
                    info!("Audio listener created");
                    self.listener = Some(listener);
                }
                Err(e) => warn!("Failed to create audio listener: {}", e),
            },
        }
    }

    fn releaser(&self) -> Releaser<AudioResource> {
        self.release_queue.releaser()
    }

    fn collect_garbage(&mut self) -> usize {
        let mut freed = 0;
        for resource in self.release_queue.drain() {
            let removed = match resource {
                AudioResource::Buffer(h) => self.buffers.remove(&h).is_some(),
                AudioResource::Voice(h) => match self.voices.remove(&h) {
                    Some(mut voice) => {
                        if let Some(mut sound) = voice.sound.take() {
                            sound.stop(immediate());
                        }
                        true
                    }
                    None => false,
                },
            };
            if removed {
                freed += 1;
            }
        }
        freed
    }
}
