// Speaker component: a positioned voice playing one sound

use std::fmt;

use anyhow::Result;
use glam::Vec3;
use log::debug;

use crate::engine::audio::{AudioDevice, AudioHandle, Sound, Voice};
use crate::engine::fetch::Fetched;

/// Plays a sound at the entity position
///
/// `set_play` records what the game wants; the mixer pass compares it with
/// what the device is doing and only issues the difference.
pub struct SpeakerComponent {
    sound: Fetched<Sound>,
    voice: Option<Voice>,
    /// Sound buffer currently attached to the voice
    bound: Option<AudioHandle>,
    want_playing: bool,
    is_playing: bool,
    looping: bool,
    volume: f32,
}

impl SpeakerComponent {
    pub fn new() -> Self {
        Self {
            sound: Fetched::empty(),
            voice: None,
            bound: None,
            want_playing: false,
            is_playing: false,
            looping: false,
            volume: 1.0,
        }
    }

    pub fn use_sound(&mut self, sound: &Fetched<Sound>) -> &mut Self {
        self.sound = sound.clone();
        self
    }

    pub fn set_play(&mut self, play: bool) -> &mut Self {
        self.want_playing = play;
        self
    }

    pub fn set_loop(&mut self, looping: bool) -> &mut Self {
        self.looping = looping;
        self
    }

    /// Linear gain, applied from the next time playback starts
    pub fn set_volume(&mut self, volume: f32) -> &mut Self {
        self.volume = volume.max(0.0);
        self
    }

    pub fn want_playing(&self) -> bool {
        self.want_playing
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn sound(&self) -> &Fetched<Sound> {
        &self.sound
    }

    /// Bring the device voice in line with the wanted state
    pub(crate) fn mix(&mut self, device: &mut (dyn AudioDevice + 'static), position: Vec3, forward: Vec3) -> Result<()> {
        self.sound.poll(device);
        let Some(sound) = self.sound.try_value() else {
            return Ok(());
        };
        if self.voice.is_none() {
            self.voice = Some(Voice::new(device)?);
        }
        let Some(voice) = self.voice.as_ref().map(Voice::handle) else {
            return Ok(());
        };

        // binding a new buffer stops the voice
        if self.bound != Some(sound.handle()) {
            device.bind(voice, sound.handle())?;
            debug!("Speaker voice {:?} bound to {:?}", voice, sound.handle());
            self.bound = Some(sound.handle());
            self.is_playing = false;
        }

        // a one-shot that ran out is done
        if self.is_playing && !device.is_playing(voice) {
            self.is_playing = false;
            if !self.looping {
                self.want_playing = false;
            }
        }

        device.set_voice_position(voice, position, forward);

        match (self.want_playing, self.is_playing) {
            (true, false) => {
                device.play(voice, self.looping, self.volume)?;
                self.is_playing = true;
            }
            (false, true) => {
                device.stop(voice);
                self.is_playing = false;
            }
            _ => {}
        }
        Ok(())
    }
}

impl Default for SpeakerComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SpeakerComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeakerComponent")
            .field("sound", &self.sound)
            .field("bound", &self.bound)
            .field("want_playing", &self.want_playing)
            .field("is_playing", &self.is_playing)
            .field("looping", &self.looping)
            .field("volume", &self.volume)
            .finish()
    }
}
