// Mesh: uploaded vertex and index buffers

use anyhow::Result;
use glam::Vec3;
use log::debug;

use super::{GpuHandle, GpuResource, GraphicsDevice, OwnedHandle};
use crate::engine::assets::GeometryData;
use crate::engine::fetch::Resource;

/// GPU mesh owning one device handle
pub struct Mesh {
    handle: OwnedHandle,
    index_count: u32,
    bounds: (Vec3, Vec3),
}

impl Mesh {
    /// Upload `geometry` to the device
    pub fn new(device: &mut dyn GraphicsDevice, geometry: &GeometryData) -> Result<Self> {
        let handle = device.create_mesh(geometry)?;
        debug!(
            "Uploaded mesh {:?}: {} vertices, {} indices",
            handle,
            geometry.vertex_count(),
            geometry.index_count()
        );
        Ok(Self {
            handle: OwnedHandle::new(device, handle, GpuResource::Mesh, "mesh"),
            index_count: geometry.index_count() as u32,
            bounds: geometry.bounds(),
        })
    }

    /// Move the handle out, leaving this mesh empty
    pub fn transfer(&mut self) -> Self {
        Self {
            handle: self.handle.transfer(),
            index_count: std::mem::take(&mut self.index_count),
            bounds: self.bounds,
        }
    }

    pub fn handle(&self) -> GpuHandle {
        self.handle.get("mesh")
    }

    pub fn is_owning(&self) -> bool {
        self.handle.is_owning()
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Local-space bounds of the uploaded positions
    pub fn bounds(&self) -> (Vec3, Vec3) {
        self.bounds
    }
}

impl Resource for Mesh {
    type Context = dyn GraphicsDevice;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::renderer::HeadlessDevice;

    #[test]
    fn test_transfer_moves_ownership() {
        let mut device = HeadlessDevice::new();
        let mut mesh = Mesh::new(&mut device, &GeometryData::cube()).unwrap();
        let handle = mesh.handle();

        let moved = mesh.transfer();
        assert!(!mesh.is_owning());
        assert!(moved.is_owning());
        assert_eq!(moved.handle(), handle);
        assert_eq!(moved.index_count(), 36);

        drop(mesh);
        assert_eq!(device.collect_garbage(), 0);
        drop(moved);
        assert_eq!(device.collect_garbage(), 1);
        assert!(!device.is_live(handle));
    }

    #[test]
    #[should_panic(expected = "moved-from mesh")]
    fn test_moved_from_handle_is_fatal() {
        let mut device = HeadlessDevice::new();
        let mut mesh = Mesh::new(&mut device, &GeometryData::quad()).unwrap();
        let _moved = mesh.transfer();
        mesh.handle();
    }

    #[test]
    fn test_invalid_geometry_is_an_error() {
        let mut device = HeadlessDevice::new();
        let mut geometry = GeometryData::quad();
        geometry.indices.push([0, 0, 12]);
        assert!(Mesh::new(&mut device, &geometry).is_err());
        assert_eq!(device.created(), 0);
    }
}
