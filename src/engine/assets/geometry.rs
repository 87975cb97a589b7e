// Geometry value type: vertex attributes, triangles and bind poses

use anyhow::Result;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::codec::{Codec, Reader, Writer};
use super::AssetError;

/// Triangle mesh data as produced by the asset compiler
///
/// Every non-empty attribute array has one entry per position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryData {
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 4]>,
    pub normals: Vec<[f32; 3]>,
    pub tangents: Vec<[f32; 3]>,
    pub bitangents: Vec<[f32; 3]>,
    pub texcoords: Vec<[f32; 2]>,
    pub bone_indices: Vec<[i32; 4]>,
    pub bone_weights: Vec<[f32; 4]>,
    pub indices: Vec<[u32; 3]>,
    pub inverse_bind_poses: Vec<[[f32; 4]; 4]>,
}

impl GeometryData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of indices, three per triangle
    pub fn index_count(&self) -> usize {
        self.indices.len() * 3
    }

    /// Axis-aligned bounds of the positions, zero for empty geometry
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let mut points = self.positions.iter().map(|p| Vec3::from_array(*p));
        let Some(first) = points.next() else {
            return (Vec3::ZERO, Vec3::ZERO);
        };
        points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)))
    }

    /// Check attribute lengths and index ranges
    pub fn validate(&self) -> Result<()> {
        let count = self.positions.len();
        let lengths = [
            ("colors", self.colors.len()),
            ("normals", self.normals.len()),
            ("tangents", self.tangents.len()),
            ("bitangents", self.bitangents.len()),
            ("texcoords", self.texcoords.len()),
            ("bone indices", self.bone_indices.len()),
            ("bone weights", self.bone_weights.len()),
        ];
        for (name, len) in lengths {
            if len != 0 && len != count {
                return Err(AssetError::InvalidData(format!(
                    "{} has {} entries for {} positions",
                    name, len, count
                ))
                .into());
            }
        }
        if let Some(index) = self.indices.iter().flatten().find(|i| **i as usize >= count) {
            return Err(AssetError::InvalidData(format!(
                "index {} out of range for {} positions",
                index, count
            ))
            .into());
        }
        Ok(())
    }

    /// Unit cube centered on the origin, with normals and texcoords
    pub fn cube() -> Self {
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            // normal, u axis, v axis
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ];

        let mut geometry = Self::default();
        for (normal, u, v) in faces {
            let base = geometry.positions.len() as u32;
            let n = Vec3::from_array(normal);
            let u = Vec3::from_array(u);
            let v = Vec3::from_array(v);
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let position = (n + u * su + v * sv) * 0.5;
                geometry.positions.push(position.to_array());
                geometry.normals.push(normal);
                geometry.texcoords.push([(su + 1.0) * 0.5, (1.0 - sv) * 0.5]);
                geometry.colors.push([1.0; 4]);
            }
            geometry.indices.push([base, base + 1, base + 2]);
            geometry.indices.push([base, base + 2, base + 3]);
        }
        geometry
    }

    /// Unit quad in the XY plane spanning 0..1, facing +Z
    pub fn quad() -> Self {
        Self {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            colors: vec![[1.0; 4]; 4],
            normals: vec![[0.0, 0.0, 1.0]; 4],
            texcoords: vec![[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]],
            indices: vec![[0, 1, 2], [0, 2, 3]],
            ..Default::default()
        }
    }
}

impl Codec for GeometryData {
    const TAG: [u8; 4] = *b"GEOM";
    const VERSION: u32 = 1;

    fn encode(&self) -> Vec<u8> {
        Writer::new(Self::TAG, Self::VERSION)
            .array(&self.positions)
            .array(&self.colors)
            .array(&self.normals)
            .array(&self.tangents)
            .array(&self.bitangents)
            .array(&self.texcoords)
            .array(&self.bone_indices)
            .array(&self.bone_weights)
            .array(&self.indices)
            .array(&self.inverse_bind_poses)
            .finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes, Self::TAG, Self::VERSION)?;
        let geometry = Self {
            positions: reader.array()?,
            colors: reader.array()?,
            normals: reader.array()?,
            tangents: reader.array()?,
            bitangents: reader.array()?,
            texcoords: reader.array()?,
            bone_indices: reader.array()?,
            bone_weights: reader.array()?,
            indices: reader.array()?,
            inverse_bind_poses: reader.array()?,
        };
        reader.finish()?;
        geometry.validate()?;
        Ok(geometry)
    }
}
