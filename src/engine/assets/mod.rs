// Asset value types and the fetch-based loading API
//
// Value types are plain serializable data. They are decoded on fetch threads
// and later turned into runtime resources on the main thread.

pub mod animation;
pub mod audio;
pub mod codec;
pub mod geometry;
pub mod image;
mod loader;
pub mod shader;

pub use animation::{AnimationData, EventKey, EventTrackData, JointData, JointTrack, MotionTrackData, QuatKey, SkeletonData, Vec3Key};
pub use audio::AudioData;
pub use codec::Codec;
pub use geometry::GeometryData;
pub use image::{select_image_path, CubemapFaces, ImageCompression, ImageData, ImagePaths};
pub use loader::Assets;
pub use shader::{ProgramSource, ShaderData};

/// Asset loading errors
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Bad asset tag: expected {expected}, got {actual}")]
    BadTag { expected: String, actual: String },

    #[error("Unsupported {tag} version {version}")]
    UnsupportedVersion { tag: String, version: u32 },

    #[error("Truncated asset: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("Invalid asset data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_error_display() {
        let err = AssetError::NotFound("meshes/crate.bin".to_string());
        assert_eq!(err.to_string(), "Asset not found: meshes/crate.bin");

        let err = AssetError::BadTag {
            expected: "GEOM".to_string(),
            actual: "IMAG".to_string(),
        };
        assert_eq!(err.to_string(), "Bad asset tag: expected GEOM, got IMAG");
    }
}
