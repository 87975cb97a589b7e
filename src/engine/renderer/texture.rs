// Textures and cubemaps

use anyhow::Result;
use log::debug;

use super::{GpuHandle, GpuResource, GraphicsDevice, OwnedHandle};
use crate::engine::assets::{CubemapFaces, ImageData};
use crate::engine::fetch::Resource;

/// 2D texture owning one device handle
pub struct Texture {
    handle: OwnedHandle,
    width: u32,
    height: u32,
}

impl Texture {
    /// Upload a 3 or 4 channel image, raw or in a compression the device supports
    pub fn new(device: &mut dyn GraphicsDevice, image: &ImageData) -> Result<Self> {
        image.validate()?;
        let handle = device.create_texture(image)?;
        debug!(
            "Uploaded texture {:?}: {}x{} ({:?})",
            handle, image.width, image.height, image.compression
        );
        Ok(Self {
            handle: OwnedHandle::new(device, handle, GpuResource::Texture, "texture"),
            width: image.width,
            height: image.height,
        })
    }

    pub fn transfer(&mut self) -> Self {
        Self {
            handle: self.handle.transfer(),
            width: self.width,
            height: self.height,
        }
    }

    pub fn handle(&self) -> GpuHandle {
        self.handle.get("texture")
    }

    pub fn is_owning(&self) -> bool {
        self.handle.is_owning()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Resource for Texture {
    type Context = dyn GraphicsDevice;
}

/// Cube texture built from six faces
pub struct Cubemap {
    handle: OwnedHandle,
    size: u32,
}

impl Cubemap {
    pub fn new(device: &mut dyn GraphicsDevice, faces: &CubemapFaces) -> Result<Self> {
        faces.validate()?;
        let handle = device.create_cubemap(faces)?;
        let size = faces.faces[0].width;
        debug!("Uploaded cubemap {:?}: {} per face", handle, size);
        Ok(Self {
            handle: OwnedHandle::new(device, handle, GpuResource::Cubemap, "cubemap"),
            size,
        })
    }

    pub fn transfer(&mut self) -> Self {
        Self {
            handle: self.handle.transfer(),
            size: self.size,
        }
    }

    pub fn handle(&self) -> GpuHandle {
        self.handle.get("cubemap")
    }

    pub fn is_owning(&self) -> bool {
        self.handle.is_owning()
    }

    /// Edge length of one face
    pub fn face_size(&self) -> u32 {
        self.size
    }
}

impl Resource for Cubemap {
    type Context = dyn GraphicsDevice;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::ImageCompression;
    use crate::engine::renderer::HeadlessDevice;

    #[test]
    fn test_two_channel_image_rejected() {
        let mut device = HeadlessDevice::new();
        let image = ImageData::new(2, 1, 1, vec![0, 0]);
        assert!(Texture::new(&mut device, &image).is_err());
        assert_eq!(device.created(), 0);
    }

    #[test]
    fn test_rgb_texture_uploads() {
        let mut device = HeadlessDevice::new();
        let texture = Texture::new(&mut device, &ImageData::new(3, 2, 2, vec![0; 12])).unwrap();
        assert_eq!(texture.size(), (2, 2));
        assert!(device.is_live(texture.handle()));
    }

    #[test]
    fn test_compressed_cubemap_without_support() {
        let mut face = ImageData::new(4, 4, 4, vec![0; 16]);
        face.compression = ImageCompression::S3tc;
        let faces = CubemapFaces {
            faces: vec![face; 6],
        };

        let mut device = HeadlessDevice::new().with_compression(true, false);
        assert!(Cubemap::new(&mut device, &faces).is_err());

        let mut device = HeadlessDevice::new().with_compression(false, true);
        let cubemap = Cubemap::new(&mut device, &faces).unwrap();
        assert_eq!(cubemap.face_size(), 4);
    }

    #[test]
    fn test_drop_queues_release() {
        let mut device = HeadlessDevice::new();
        let texture = Texture::new(&mut device, &ImageData::solid([255; 4])).unwrap();
        drop(texture);
        assert_eq!(device.pending_release(), 1);
        assert_eq!(device.collect_garbage(), 1);
        assert_eq!(device.live_count(), 0);
    }
}
