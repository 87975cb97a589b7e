// Shader value types

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::codec::{Codec, Reader, Writer};
use super::AssetError;
use crate::engine::fetch::Composite;

/// Shader source text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderData {
    pub text: String,
}

impl ShaderData {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl Codec for ShaderData {
    const TAG: [u8; 4] = *b"SHDR";
    const VERSION: u32 = 1;

    fn encode(&self) -> Vec<u8> {
        Writer::new(Self::TAG, Self::VERSION).string(&self.text).finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes, Self::TAG, Self::VERSION)?;
        let text = reader.string()?;
        reader.finish()?;
        Ok(Self { text })
    }
}

/// Vertex and fragment sources fetched as two parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSource {
    pub vertex: ShaderData,
    pub fragment: ShaderData,
}

impl Composite for ProgramSource {
    type Part = ShaderData;

    fn decode_part(_index: usize, bytes: &[u8]) -> Result<ShaderData> {
        ShaderData::decode(bytes)
    }

    fn assemble(mut parts: BTreeMap<usize, ShaderData>) -> Result<Self> {
        match (parts.remove(&0), parts.remove(&1)) {
            (Some(vertex), Some(fragment)) => Ok(Self { vertex, fragment }),
            _ => Err(AssetError::InvalidData("program needs parts 0 and 1".to_string()).into()),
        }
    }
}
