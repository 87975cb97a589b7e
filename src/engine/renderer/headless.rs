// Headless graphics device that records instead of rendering

use anyhow::Result;
use glam::Mat4;
use log::warn;
use std::collections::HashMap;

use super::{
    DebugLine, DeviceError, DrawCall, GpuHandle, GpuResource, GraphicsDevice, ShaderStage,
    TextureBinding,
};
use crate::engine::assets::{CubemapFaces, GeometryData, ImageData, ShaderData};
use crate::engine::release::{ReleaseQueue, Releaser};

/// Something the device was asked to do during a frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    Begin { clear_color: [f32; 4] },
    Draw(DrawCall),
    PostProcess,
    Lines { count: usize, view_projection: Mat4 },
    End,
}

/// Graphics device for tests and tooling
///
/// Handles are sequential and never reused. Every created object stays live
/// until its wrapper is dropped and the release queue is collected.
pub struct HeadlessDevice {
    supports_etc2: bool,
    supports_s3tc: bool,
    next_handle: u32,
    live: HashMap<GpuHandle, GpuResource>,
    programs: HashMap<GpuHandle, TextureBinding>,
    created: usize,
    released: usize,
    release_queue: ReleaseQueue<GpuResource>,
    events: Vec<FrameEvent>,
    in_frame: bool,
    frames: u64,
    size: (u32, u32),
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self {
            supports_etc2: false,
            supports_s3tc: false,
            next_handle: 1,
            live: HashMap::new(),
            programs: HashMap::new(),
            created: 0,
            released: 0,
            release_queue: ReleaseQueue::new(),
            events: Vec::new(),
            in_frame: false,
            frames: 0,
            size: (0, 0),
        }
    }

    /// Report compressed texture support
    pub fn with_compression(mut self, etc2: bool, s3tc: bool) -> Self {
        self.supports_etc2 = etc2;
        self.supports_s3tc = s3tc;
        self
    }

    /// Objects created so far
    pub fn created(&self) -> usize {
        self.created
    }

    /// Objects freed by `collect_garbage`
    pub fn released(&self) -> usize {
        self.released
    }

    /// Objects created and not yet freed
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, handle: GpuHandle) -> bool {
        self.live.contains_key(&handle)
    }

    /// Texture binding a live program was linked with
    pub fn program_binding(&self, program: GpuHandle) -> Option<TextureBinding> {
        self.programs.get(&program).copied()
    }

    /// Released handles still waiting for `collect_garbage`
    pub fn pending_release(&self) -> usize {
        self.release_queue.len()
    }

    /// Completed frames
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn events(&self) -> &[FrameEvent] {
        &self.events
    }

    /// Take the recorded events, leaving the log empty
    pub fn take_events(&mut self) -> Vec<FrameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Draw calls recorded since the log was last taken
    pub fn draw_calls(&self) -> impl Iterator<Item = &DrawCall> {
        self.events.iter().filter_map(|event| match event {
            FrameEvent::Draw(call) => Some(call),
            _ => None,
        })
    }

    fn allocate(&mut self, kind: fn(GpuHandle) -> GpuResource) -> GpuHandle {
        let handle = GpuHandle(self.next_handle);
        self.next_handle += 1;
        self.created += 1;
        self.live.insert(handle, kind(handle));
        handle
    }

    fn check_compression(&self, image: &ImageData) -> Result<()> {
        use crate::engine::assets::ImageCompression;
        let supported = match image.compression {
            ImageCompression::None => true,
            ImageCompression::Etc2 => self.supports_etc2,
            ImageCompression::S3tc => self.supports_s3tc,
        };
        if !supported {
            return Err(DeviceError::UnsupportedFormat(format!("{:?}", image.compression)).into());
        }
        Ok(())
    }

    fn expect_live(&self, handle: GpuHandle, kind: fn(GpuHandle) -> GpuResource) -> Result<()> {
        match self.live.get(&handle) {
            Some(resource) if *resource == kind(handle) => Ok(()),
            _ => Err(DeviceError::InvalidHandle(handle.0).into()),
        }
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn supports_etc2(&self) -> bool {
        self.supports_etc2
    }

    fn supports_s3tc(&self) -> bool {
        self.supports_s3tc
    }

    fn create_mesh(&mut self, geometry: &GeometryData) -> Result<GpuHandle> {
        geometry.validate()?;
        Ok(self.allocate(GpuResource::Mesh))
    }

    fn create_texture(&mut self, image: &ImageData) -> Result<GpuHandle> {
        image.validate()?;
        self.check_compression(image)?;
        Ok(self.allocate(GpuResource::Texture))
    }

    fn create_cubemap(&mut self, faces: &CubemapFaces) -> Result<GpuHandle> {
        faces.validate()?;
        self.check_compression(&faces.faces[0])?;
        Ok(self.allocate(GpuResource::Cubemap))
    }

    fn create_shader(&mut self, _stage: ShaderStage, _source: &ShaderData) -> Result<GpuHandle> {
        Ok(self.allocate(GpuResource::Shader))
    }

    fn create_program(
        &mut self,
        vertex: GpuHandle,
        fragment: GpuHandle,
        binding: TextureBinding,
    ) -> Result<GpuHandle> {
        self.expect_live(vertex, GpuResource::Shader)?;
        self.expect_live(fragment, GpuResource::Shader)?;
        let handle = self.allocate(GpuResource::Program);
        self.programs.insert(handle, binding);
        Ok(handle)
    }

    fn releaser(&self) -> Releaser<GpuResource> {
        self.release_queue.releaser()
    }

    fn collect_garbage(&mut self) -> usize {
        let mut freed = 0;
        for resource in self.release_queue.drain() {
            let handle = resource.handle();
            if self.live.remove(&handle).is_none() {
                warn!("Release of unknown handle {:?}", resource);
                continue;
            }
            self.programs.remove(&handle);
            freed += 1;
        }
        self.released += freed;
        freed
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn begin_frame(&mut self, clear_color: [f32; 4]) -> Result<()> {
        self.in_frame = true;
        self.events.push(FrameEvent::Begin { clear_color });
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall) {
        if !self.live.contains_key(&call.mesh) {
            warn!("Draw with unknown mesh {:?}", call.mesh);
        }
        self.events.push(FrameEvent::Draw(call.clone()));
    }

    fn post_process(&mut self) {
        self.events.push(FrameEvent::PostProcess);
    }

    fn draw_lines(&mut self, lines: &[DebugLine], view_projection: Mat4) {
        if lines.is_empty() {
            return;
        }
        self.events.push(FrameEvent::Lines {
            count: lines.len(),
            view_projection,
        });
    }

    fn end_frame(&mut self) -> Result<()> {
        if !self.in_frame {
            return Err(DeviceError::NoFrame.into());
        }
        self.in_frame = false;
        self.frames += 1;
        self.events.push(FrameEvent::End);
        Ok(())
    }
}
