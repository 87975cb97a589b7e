// Tagged little-endian binary encoding shared by every asset value type
//
// Layout: 4-byte tag, u32 version, then the type's fields. Arrays are a u32
// element count followed by the raw little-endian elements.

use anyhow::Result;
use bytemuck::Pod;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

use super::AssetError;
use crate::engine::fetch::Composite;

/// Binary and JSON encoding of an asset value type
pub trait Codec: Serialize + DeserializeOwned + Sized {
    /// Four-byte tag identifying the type
    const TAG: [u8; 4];

    /// Newest version this build writes and reads
    const VERSION: u32;

    /// Encode into the tagged binary form
    fn encode(&self) -> Vec<u8>;

    /// Decode from the tagged binary form
    fn decode(bytes: &[u8]) -> Result<Self>;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl<T> Composite for T
where
    T: Codec + Send + Sync + 'static,
{
    type Part = T;

    fn decode_part(_index: usize, bytes: &[u8]) -> Result<T> {
        T::decode(bytes)
    }

    fn assemble(parts: BTreeMap<usize, T>) -> Result<T> {
        parts
            .into_values()
            .next()
            .ok_or_else(|| AssetError::InvalidData("no part received".to_string()).into())
    }
}

fn tag_name(tag: &[u8]) -> String {
    String::from_utf8_lossy(tag).into_owned()
}

/// Builds a tagged binary blob
pub struct Writer {
    buffer: Vec<u8>,
}

impl Writer {
    pub fn new(tag: [u8; 4], version: u32) -> Self {
        let mut buffer = Vec::with_capacity(64);
        buffer.extend_from_slice(&tag);
        buffer.extend_from_slice(&version.to_le_bytes());
        Self { buffer }
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buffer.push(value);
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn f32(&mut self, value: f32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Length-prefixed UTF-8 string
    pub fn string(&mut self, value: &str) -> &mut Self {
        self.bytes(value.as_bytes())
    }

    /// Length-prefixed raw bytes
    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.u32(value.len() as u32);
        self.buffer.extend_from_slice(value);
        self
    }

    /// Count-prefixed array of plain values
    pub fn array<T: Pod>(&mut self, values: &[T]) -> &mut Self {
        self.u32(values.len() as u32);
        self.buffer.extend_from_slice(bytemuck::cast_slice(values));
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }
}

/// Reads a tagged binary blob
pub struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
    version: u32,
}

impl<'a> Reader<'a> {
    /// Check the tag and version header and position after it
    pub fn new(bytes: &'a [u8], tag: [u8; 4], max_version: u32) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(AssetError::Truncated {
                needed: 8,
                remaining: bytes.len(),
            }
            .into());
        }
        if bytes[..4] != tag {
            return Err(AssetError::BadTag {
                expected: tag_name(&tag),
                actual: tag_name(&bytes[..4]),
            }
            .into());
        }

        let mut reader = Self {
            bytes,
            offset: 4,
            version: 0,
        };
        let version = reader.u32()?;
        if version == 0 || version > max_version {
            return Err(AssetError::UnsupportedVersion {
                tag: tag_name(&tag),
                version,
            }
            .into());
        }
        reader.version = version;
        Ok(reader)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let remaining = self.bytes.len() - self.offset;
        if count > remaining {
            return Err(AssetError::Truncated {
                needed: count,
                remaining,
            }
            .into());
        }
        let slice = &self.bytes[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    fn word(&mut self) -> Result<[u8; 4]> {
        let mut word = [0u8; 4];
        word.copy_from_slice(self.take(4)?);
        Ok(word)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.word()?))
    }

    pub fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.word()?))
    }

    pub fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.word()?))
    }

    pub fn string(&mut self) -> Result<String> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes)
            .map_err(|e| AssetError::InvalidData(format!("invalid string: {}", e)).into())
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub fn array<T: Pod>(&mut self) -> Result<Vec<T>> {
        let count = self.u32()? as usize;
        let size = count
            .checked_mul(std::mem::size_of::<T>())
            .ok_or_else(|| AssetError::InvalidData(format!("array of {} elements overflows", count)))?;
        let raw = self.take(size)?;
        let mut values = vec![T::zeroed(); count];
        bytemuck::cast_slice_mut::<T, u8>(&mut values).copy_from_slice(raw);
        Ok(values)
    }

    /// Fail if any bytes were left unread
    pub fn finish(self) -> Result<()> {
        let trailing = self.bytes.len() - self.offset;
        if trailing != 0 {
            return Err(AssetError::InvalidData(format!("{} trailing bytes", trailing)).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAG: [u8; 4] = *b"TEST";

    #[test]
    fn test_header_layout() {
        let bytes = Writer::new(TAG, 3).u32(7).finish();
        assert_eq!(&bytes[..4], b"TEST");
        assert_eq!(&bytes[4..8], &3u32.to_le_bytes());
        assert_eq!(&bytes[8..], &7u32.to_le_bytes());
    }

    #[test]
    fn test_reader_fields() {
        let bytes = Writer::new(TAG, 1)
            .u8(4)
            .i32(-1)
            .f32(2.5)
            .string("hips")
            .array(&[[1.0f32, 2.0, 3.0]])
            .finish();

        let mut reader = Reader::new(&bytes, TAG, 1).unwrap();
        assert_eq!(reader.u8().unwrap(), 4);
        assert_eq!(reader.i32().unwrap(), -1);
        assert_eq!(reader.f32().unwrap(), 2.5);
        assert_eq!(reader.string().unwrap(), "hips");
        assert_eq!(reader.array::<[f32; 3]>().unwrap(), vec![[1.0, 2.0, 3.0]]);
        reader.finish().unwrap();
    }

    #[test]
    fn test_tag_mismatch() {
        let bytes = Writer::new(*b"GEOM", 1).finish();
        let err = Reader::new(&bytes, TAG, 1).err().unwrap();
        match err.downcast_ref::<AssetError>() {
            Some(AssetError::BadTag { expected, actual }) => {
                assert_eq!(expected, "TEST");
                assert_eq!(actual, "GEOM");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_future_version_rejected() {
        let bytes = Writer::new(TAG, 9).finish();
        assert!(Reader::new(&bytes, TAG, 1).is_err());
    }

    #[test]
    fn test_truncated_array() {
        let mut bytes = Writer::new(TAG, 1).array(&[1u32, 2, 3]).finish();
        bytes.truncate(bytes.len() - 2);
        let mut reader = Reader::new(&bytes, TAG, 1).unwrap();
        assert!(reader.array::<u32>().is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let bytes = Writer::new(TAG, 1).u32(1).finish();
        let reader = Reader::new(&bytes, TAG, 1).unwrap();
        assert!(reader.finish().is_err());
    }
}
