// Audio value type: mono f32 samples

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::codec::{Codec, Reader, Writer};
use super::AssetError;

/// Mono sample buffer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioData {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl AudioData {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    /// Length in seconds
    pub fn duration(&self) -> f32 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f32 / self.sample_rate as f32
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(AssetError::InvalidData("zero sample rate".to_string()).into());
        }
        Ok(())
    }
}

impl Codec for AudioData {
    const TAG: [u8; 4] = *b"AUDI";
    const VERSION: u32 = 1;

    fn encode(&self) -> Vec<u8> {
        Writer::new(Self::TAG, Self::VERSION)
            .u32(self.sample_rate)
            .array(&self.samples)
            .finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes, Self::TAG, Self::VERSION)?;
        let audio = Self {
            sample_rate: reader.u32()?,
            samples: reader.array()?,
        };
        reader.finish()?;
        audio.validate()?;
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration() {
        let audio = AudioData::new(4, vec![0.0; 10]);
        assert_eq!(audio.duration(), 2.5);
        assert_eq!(AudioData::default().duration(), 0.0);
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        let bytes = AudioData::new(0, vec![0.5]).encode();
        assert!(AudioData::decode(&bytes).is_err());
    }

    #[test]
    fn test_binary_decode() {
        let audio = AudioData::new(44_100, vec![0.0, 0.25, -0.5]);
        assert_eq!(AudioData::decode(&audio.encode()).unwrap(), audio);
    }
}
