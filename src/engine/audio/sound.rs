// Sound buffers and voices

use anyhow::Result;
use log::debug;

use super::{AudioDevice, AudioHandle, AudioResource};
use crate::engine::assets::AudioData;
use crate::engine::fetch::Resource;
use crate::engine::release::Releaser;
use crate::fatal;

struct OwnedAudio {
    handle: Option<AudioHandle>,
    kind: fn(AudioHandle) -> AudioResource,
    releaser: Releaser<AudioResource>,
}

impl OwnedAudio {
    fn transfer(&mut self) -> Self {
        Self {
            handle: self.handle.take(),
            kind: self.kind,
            releaser: self.releaser.clone(),
        }
    }

    fn get(&self, what: &str) -> AudioHandle {
        match self.handle {
            Some(handle) => handle,
            None => fatal!("Handle of a moved-from {} used", what),
        }
    }
}

impl Drop for OwnedAudio {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.releaser.release((self.kind)(handle));
        }
    }
}

/// Mono samples uploaded to the audio device
pub struct Sound {
    handle: OwnedAudio,
    duration: f32,
}

impl Sound {
    pub fn new(device: &mut dyn AudioDevice, data: &AudioData) -> Result<Self> {
        data.validate()?;
        let handle = device.create_buffer(data)?.checked("sound");
        debug!("Uploaded sound {:?}: {:.2}s", handle, data.duration());
        Ok(Self {
            handle: OwnedAudio {
                handle: Some(handle),
                kind: AudioResource::Buffer,
                releaser: device.releaser(),
            },
            duration: data.duration(),
        })
    }

    pub fn transfer(&mut self) -> Self {
        Self {
            handle: self.handle.transfer(),
            duration: self.duration,
        }
    }

    pub fn handle(&self) -> AudioHandle {
        self.handle.get("sound")
    }

    pub fn is_owning(&self) -> bool {
        self.handle.handle.is_some()
    }

    /// Length in seconds
    pub fn duration(&self) -> f32 {
        self.duration
    }
}

impl Resource for Sound {
    type Context = dyn AudioDevice;
}

/// Positioned source owned by one speaker
pub struct Voice {
    handle: OwnedAudio,
}

impl Voice {
    pub fn new(device: &mut dyn AudioDevice) -> Result<Self> {
        let handle = device.create_voice()?.checked("voice");
        Ok(Self {
            handle: OwnedAudio {
                handle: Some(handle),
                kind: AudioResource::Voice,
                releaser: device.releaser(),
            },
        })
    }

    pub fn transfer(&mut self) -> Self {
        Self {
            handle: self.handle.transfer(),
        }
    }

    pub fn handle(&self) -> AudioHandle {
        self.handle.get("voice")
    }

    pub fn is_owning(&self) -> bool {
        self.handle.handle.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::audio::HeadlessAudio;

    #[test]
    fn test_sound_release_is_deferred() {
        let mut device = HeadlessAudio::new();
        let mut sound = Sound::new(&mut device, &AudioData::new(10, vec![0.0; 20])).unwrap();
        assert_eq!(sound.duration(), 2.0);

        let moved = sound.transfer();
        drop(sound);
        assert_eq!(device.collect_garbage(), 0);
        drop(moved);
        assert_eq!(device.collect_garbage(), 1);
    }

    #[test]
    fn test_zero_rate_rejected() {
        let mut device = HeadlessAudio::new();
        assert!(Sound::new(&mut device, &AudioData::new(0, vec![0.0])).is_err());
    }

    #[test]
    fn test_voice_is_move_only() {
        let mut device = HeadlessAudio::new();
        let mut voice = Voice::new(&mut device).unwrap();
        let handle = voice.handle();
        let moved = voice.transfer();
        assert!(!voice.is_owning());
        assert_eq!(moved.handle(), handle);
    }
}
