// Vertex layouts for meshes and debug lines

use bytemuck::{Pod, Zeroable};

use crate::engine::assets::GeometryData;

/// Interleaved mesh vertex
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub tex_coords: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    /// Interleave the attributes of `geometry`, filling missing ones with defaults
    pub fn from_geometry(geometry: &GeometryData) -> Vec<Vertex> {
        (0..geometry.vertex_count())
            .map(|i| Vertex {
                position: geometry.positions[i],
                normal: geometry.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
                tangent: geometry.tangents.get(i).copied().unwrap_or([1.0, 0.0, 0.0]),
                tex_coords: geometry.texcoords.get(i).copied().unwrap_or([0.0; 2]),
                color: geometry.colors.get(i).copied().unwrap_or([1.0; 4]),
            })
            .collect()
    }

    const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x3,
        3 => Float32x2,
        4 => Float32x4,
    ];

    /// Get the vertex buffer layout descriptor
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Colored line endpoint
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl LineVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_attributes_get_defaults() {
        let geometry = GeometryData {
            positions: vec![[1.0, 2.0, 3.0]],
            ..Default::default()
        };
        let vertices = Vertex::from_geometry(&geometry);
        assert_eq!(vertices.len(), 1);
        assert_eq!(vertices[0].position, [1.0, 2.0, 3.0]);
        assert_eq!(vertices[0].color, [1.0; 4]);
        assert_eq!(vertices[0].normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_vertex_stride() {
        assert_eq!(std::mem::size_of::<Vertex>(), 60);
        assert_eq!(Vertex::desc().array_stride, 60);
    }
}
