// Image value types and compressed format selection

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::codec::{Codec, Reader, Writer};
use super::AssetError;
use crate::engine::fetch::Composite;

/// Block compression of the pixel payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageCompression {
    #[default]
    None,
    Etc2,
    S3tc,
}

impl ImageCompression {
    fn to_u8(self) -> u8 {
        match self {
            ImageCompression::None => 0,
            ImageCompression::Etc2 => 1,
            ImageCompression::S3tc => 2,
        }
    }

    fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ImageCompression::None),
            1 => Ok(ImageCompression::Etc2),
            2 => Ok(ImageCompression::S3tc),
            other => Err(AssetError::InvalidData(format!("unknown compression {}", other)).into()),
        }
    }
}

/// Pixels of a 2D image, raw or block compressed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    pub channels: u32,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    #[serde(default)]
    pub compression: ImageCompression,
}

impl ImageData {
    /// Raw 8-bit image
    pub fn new(channels: u32, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            channels,
            width,
            height,
            pixels,
            compression: ImageCompression::None,
        }
    }

    /// Single-pixel RGBA image
    pub fn solid(color: [u8; 4]) -> Self {
        Self::new(4, 1, 1, color.to_vec())
    }

    /// Decode a PNG or JPEG file into raw RGBA
    pub fn from_encoded(bytes: &[u8]) -> Result<Self> {
        let image = ::image::load_from_memory(bytes)
            .map_err(|e| AssetError::InvalidData(format!("image decode failed: {}", e)))?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self::new(4, width, height, rgba.into_raw()))
    }

    pub fn is_compressed(&self) -> bool {
        self.compression != ImageCompression::None
    }

    /// Channels must be 3 or 4, and raw payloads must match the dimensions
    pub fn validate(&self) -> Result<()> {
        if self.channels != 3 && self.channels != 4 {
            return Err(AssetError::InvalidData(format!(
                "{} channels, expected 3 or 4",
                self.channels
            ))
            .into());
        }
        if self.width == 0 || self.height == 0 {
            return Err(AssetError::InvalidData("zero sized image".to_string()).into());
        }
        if !self.is_compressed() {
            let expected = self.width as usize * self.height as usize * self.channels as usize;
            if self.pixels.len() != expected {
                return Err(AssetError::InvalidData(format!(
                    "{} pixel bytes for {}x{}x{}",
                    self.pixels.len(),
                    self.width,
                    self.height,
                    self.channels
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Raw pixels expanded to RGBA
    pub fn to_rgba(&self) -> Vec<u8> {
        if self.channels == 4 {
            return self.pixels.clone();
        }
        self.pixels
            .chunks_exact(3)
            .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
            .collect()
    }
}

impl Codec for ImageData {
    const TAG: [u8; 4] = *b"IMAG";
    const VERSION: u32 = 1;

    fn encode(&self) -> Vec<u8> {
        Writer::new(Self::TAG, Self::VERSION)
            .u32(self.channels)
            .u32(self.width)
            .u32(self.height)
            .u8(self.compression.to_u8())
            .bytes(&self.pixels)
            .finish()
    }

    /// Tagged binary images, or PNG/JPEG files recognized by their signature
    fn decode(bytes: &[u8]) -> Result<Self> {
        if ::image::guess_format(bytes).is_ok() {
            return Self::from_encoded(bytes);
        }
        let mut reader = Reader::new(bytes, Self::TAG, Self::VERSION)?;
        let image = Self {
            channels: reader.u32()?,
            width: reader.u32()?,
            height: reader.u32()?,
            compression: ImageCompression::from_u8(reader.u8()?)?,
            pixels: reader.bytes()?,
        };
        reader.finish()?;
        image.validate()?;
        Ok(image)
    }
}

/// Face order of a cubemap: +X, -X, +Y, -Y, +Z, -Z
pub const CUBEMAP_FACES: usize = 6;

/// Six images fetched as independent parts
#[derive(Debug, Clone, PartialEq)]
pub struct CubemapFaces {
    pub faces: Vec<ImageData>,
}

impl CubemapFaces {
    /// All faces share one size, channel count and compression
    pub fn validate(&self) -> Result<()> {
        if self.faces.len() != CUBEMAP_FACES {
            return Err(AssetError::InvalidData(format!("{} cubemap faces", self.faces.len())).into());
        }
        let first = &self.faces[0];
        for face in &self.faces {
            face.validate()?;
            if face.width != first.width
                || face.height != first.height
                || face.channels != first.channels
                || face.compression != first.compression
            {
                return Err(AssetError::InvalidData("cubemap faces differ in format".to_string()).into());
            }
        }
        Ok(())
    }
}

impl Composite for CubemapFaces {
    type Part = ImageData;

    fn decode_part(_index: usize, bytes: &[u8]) -> Result<ImageData> {
        ImageData::decode(bytes)
    }

    fn assemble(parts: BTreeMap<usize, ImageData>) -> Result<Self> {
        let cubemap = Self {
            faces: parts.into_values().collect(),
        };
        cubemap.validate()?;
        Ok(cubemap)
    }
}

/// Alternative encodings of one image
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImagePaths {
    pub raw: String,
    pub etc2: Option<String>,
    pub s3tc: Option<String>,
}

impl ImagePaths {
    pub fn raw(path: &str) -> Self {
        Self {
            raw: path.to_string(),
            ..Default::default()
        }
    }

    pub fn with_etc2(mut self, path: &str) -> Self {
        self.etc2 = Some(path.to_string());
        self
    }

    pub fn with_s3tc(mut self, path: &str) -> Self {
        self.s3tc = Some(path.to_string());
        self
    }
}

/// Pick the variant to fetch: ETC2 if supported and given, else S3TC under
/// the same rule, else the raw image.
pub fn select_image_path(paths: &ImagePaths, supports_etc2: bool, supports_s3tc: bool) -> &str {
    match (&paths.etc2, &paths.s3tc) {
        (Some(etc2), _) if supports_etc2 => etc2,
        (_, Some(s3tc)) if supports_s3tc => s3tc,
        _ => &paths.raw,
    }
}
