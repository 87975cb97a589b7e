// Headless audio device that tracks voice state instead of playing

use anyhow::Result;
use glam::Vec3;
use log::warn;
use std::collections::HashMap;

use super::{AudioDevice, AudioHandle, AudioResource, ListenerPose};
use crate::engine::assets::AudioData;
use crate::engine::release::{ReleaseQueue, Releaser};
use crate::engine::renderer::DeviceError;

/// Observable state of one voice
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceState {
    pub buffer: Option<AudioHandle>,
    pub playing: bool,
    pub looping: bool,
    pub volume: f32,
    pub position: Vec3,
    pub forward: Vec3,
    /// Number of `play` calls
    pub plays: u32,
}

/// Audio device for tests and silent runs
pub struct HeadlessAudio {
    next_handle: u32,
    buffers: HashMap<AudioHandle, f32>,
    voices: HashMap<AudioHandle, VoiceState>,
    listener: Option<ListenerPose>,
    created: usize,
    released: usize,
    release_queue: ReleaseQueue<AudioResource>,
}

impl HeadlessAudio {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            buffers: HashMap::new(),
            voices: HashMap::new(),
            listener: None,
            created: 0,
            released: 0,
            release_queue: ReleaseQueue::new(),
        }
    }

    pub fn created(&self) -> usize {
        self.created
    }

    pub fn released(&self) -> usize {
        self.released
    }

    pub fn live_count(&self) -> usize {
        self.buffers.len() + self.voices.len()
    }

    pub fn voice(&self, voice: AudioHandle) -> Option<&VoiceState> {
        self.voices.get(&voice)
    }

    /// Every live voice
    pub fn voices(&self) -> impl Iterator<Item = (&AudioHandle, &VoiceState)> {
        self.voices.iter()
    }

    pub fn listener(&self) -> Option<ListenerPose> {
        self.listener
    }

    /// Stop a voice as if its sound ran out
    pub fn finish(&mut self, voice: AudioHandle) {
        if let Some(state) = self.voices.get_mut(&voice) {
            state.playing = false;
        }
    }

    fn allocate(&mut self) -> AudioHandle {
        let handle = AudioHandle(self.next_handle);
        self.next_handle += 1;
        self.created += 1;
        handle
    }

    fn voice_mut(&mut self, voice: AudioHandle) -> Result<&mut VoiceState> {
        self.voices
            .get_mut(&voice)
            .ok_or_else(|| DeviceError::InvalidHandle(voice.0).into())
    }
}

impl Default for HeadlessAudio {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDevice for HeadlessAudio {
    fn create_buffer(&mut self, sound: &AudioData) -> Result<AudioHandle> {
        sound.validate()?;
        let handle = self.allocate();
        self.buffers.insert(handle, sound.duration());
        Ok(handle)
    }

    fn create_voice(&mut self) -> Result<AudioHandle> {
        let handle = self.allocate();
        self.voices.insert(
            handle,
            VoiceState {
                volume: 1.0,
                ..Default::default()
            },
        );
        Ok(handle)
    }

    fn bind(&mut self, voice: AudioHandle, buffer: AudioHandle) -> Result<()> {
        if !self.buffers.contains_key(&buffer) {
            return Err(DeviceError::InvalidHandle(buffer.0).into());
        }
        let state = self.voice_mut(voice)?;
        state.playing = false;
        state.buffer = Some(buffer);
        Ok(())
    }

    fn play(&mut self, voice: AudioHandle, looping: bool, volume: f32) -> Result<()> {
        let state = self.voice_mut(voice)?;
        if state.buffer.is_none() {
            return Err(DeviceError::InvalidHandle(voice.0).into());
        }
        state.playing = true;
        state.looping = looping;
        state.volume = volume;
        state.plays += 1;
        Ok(())
    }

    fn stop(&mut self, voice: AudioHandle) {
        if let Some(state) = self.voices.get_mut(&voice) {
            state.playing = false;
        }
    }

    fn is_playing(&self, voice: AudioHandle) -> bool {
        self.voices.get(&voice).is_some_and(|state| state.playing)
    }

    fn set_voice_position(&mut self, voice: AudioHandle, position: Vec3, forward: Vec3) {
        if let Some(state) = self.voices.get_mut(&voice) {
            state.position = position;
            state.forward = forward;
        }
    }

    fn set_listener(&mut self, pose: ListenerPose) {
        self.listener = Some(pose);
    }

    fn releaser(&self) -> Releaser<AudioResource> {
        self.release_queue.releaser()
    }

    fn collect_garbage(&mut self) -> usize {
        let mut freed = 0;
        for resource in self.release_queue.drain() {
            let removed = match resource {
                AudioResource::Buffer(h) => self.buffers.remove(&h).is_some(),
                AudioResource::Voice(h) => self.voices.remove(&h).is_some(),
            };
            if removed {
                freed += 1;
            } else {
                warn!("Release of unknown audio handle {:?}", resource);
            }
        }
        self.released += freed;
        freed
    }
}
