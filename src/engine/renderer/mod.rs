// Rendering: the graphics device seam and the GPU resource wrappers
//
// Passes talk to a `GraphicsDevice`. `WgpuDevice` renders to a window,
// `HeadlessDevice` records what it was asked to do.

mod camera;
mod headless;
mod mesh;
mod program;
mod texture;
mod vertex;
mod wgpu_device;

pub use camera::Camera;
pub use headless::{FrameEvent, HeadlessDevice};
pub use mesh::Mesh;
pub use program::{Program, Shader};
pub use texture::{Cubemap, Texture};
pub use vertex::{LineVertex, Vertex};
pub use wgpu_device::WgpuDevice;

use anyhow::Result;
use glam::{Mat4, Vec3, Vec4};

use crate::engine::assets::{CubemapFaces, GeometryData, ImageData, ShaderData};
use crate::engine::release::Releaser;
use crate::fatal;

/// Opaque device object id; zero is never a valid handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuHandle(pub u32);

impl GpuHandle {
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Reject the zero handle a failed allocation produces
    pub(crate) fn checked(self, what: &str) -> Self {
        if self.is_null() {
            fatal!("Graphics device returned a null {} handle", what);
        }
        self
    }
}

/// A device object queued for release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuResource {
    Mesh(GpuHandle),
    Texture(GpuHandle),
    Cubemap(GpuHandle),
    Shader(GpuHandle),
    Program(GpuHandle),
}

impl GpuResource {
    pub fn handle(&self) -> GpuHandle {
        match *self {
            GpuResource::Mesh(h)
            | GpuResource::Texture(h)
            | GpuResource::Cubemap(h)
            | GpuResource::Shader(h)
            | GpuResource::Program(h) => h,
        }
    }
}

/// Single owner of a device handle, shared by the GPU wrappers
struct OwnedHandle {
    handle: Option<GpuHandle>,
    kind: fn(GpuHandle) -> GpuResource,
    releaser: Releaser<GpuResource>,
}

impl OwnedHandle {
    fn new(
        device: &dyn GraphicsDevice,
        handle: GpuHandle,
        kind: fn(GpuHandle) -> GpuResource,
        what: &str,
    ) -> Self {
        Self {
            handle: Some(handle.checked(what)),
            kind,
            releaser: device.releaser(),
        }
    }

    fn transfer(&mut self) -> Self {
        Self {
            handle: self.handle.take(),
            kind: self.kind,
            releaser: self.releaser.clone(),
        }
    }

    fn get(&self, what: &str) -> GpuHandle {
        match self.handle {
            Some(handle) => handle,
            None => fatal!("Handle of a moved-from {} used", what),
        }
    }

    fn is_owning(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.releaser.release((self.kind)(handle));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Texture layout a program samples from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureBinding {
    /// Up to three 2D textures: color, normal, surface
    Texture2d,
    /// One cubemap
    Cube,
}

/// How a draw is shaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shading {
    Blockout,
    Unlit,
    Pbr,
    Skybox,
    Interface,
    /// User program
    Custom(GpuHandle),
}

/// Stage of the frame a draw belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawPass {
    Skybox,
    Opaque,
    Interface,
}

/// One indexed draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub mesh: GpuHandle,
    pub index_count: u32,
    pub shading: Shading,
    /// Color, normal and surface textures, or the cubemap for skyboxes
    pub textures: Vec<GpuHandle>,
    pub model: Mat4,
    pub view_projection: Mat4,
    pub color: Vec4,
    pub pass: DrawPass,
}

/// Colored world-space segment for the debug overlay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugLine {
    pub from: Vec3,
    pub to: Vec3,
    pub color: Vec3,
}

impl DebugLine {
    pub fn new(from: Vec3, to: Vec3, color: Vec3) -> Self {
        Self { from, to, color }
    }
}

/// Graphics device errors
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Invalid handle: {0}")]
    InvalidHandle(u32),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("No frame in progress")]
    NoFrame,

    #[error("Backend failure: {0}")]
    Backend(String),
}

/// Main-thread graphics API used by wrappers and the rendering pass
pub trait GraphicsDevice {
    fn supports_etc2(&self) -> bool;
    fn supports_s3tc(&self) -> bool;

    fn create_mesh(&mut self, geometry: &GeometryData) -> Result<GpuHandle>;
    fn create_texture(&mut self, image: &ImageData) -> Result<GpuHandle>;
    fn create_cubemap(&mut self, faces: &CubemapFaces) -> Result<GpuHandle>;
    fn create_shader(&mut self, stage: ShaderStage, source: &ShaderData) -> Result<GpuHandle>;
    fn create_program(
        &mut self,
        vertex: GpuHandle,
        fragment: GpuHandle,
        binding: TextureBinding,
    ) -> Result<GpuHandle>;

    /// Sink wrappers send their handles to when dropped
    fn releaser(&self) -> Releaser<GpuResource>;

    /// Free every released handle, returning how many were freed
    fn collect_garbage(&mut self) -> usize;

    fn resize(&mut self, width: u32, height: u32);

    fn begin_frame(&mut self, clear_color: [f32; 4]) -> Result<()>;
    fn draw(&mut self, call: &DrawCall);
    fn post_process(&mut self);
    fn draw_lines(&mut self, lines: &[DebugLine], view_projection: Mat4);
    fn end_frame(&mut self) -> Result<()>;
}
