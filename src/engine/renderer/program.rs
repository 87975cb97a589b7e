// Shader stages and linked programs

use anyhow::Result;
use log::debug;

use super::{GpuHandle, GpuResource, GraphicsDevice, OwnedHandle, ShaderStage, TextureBinding};
use crate::engine::assets::{ProgramSource, ShaderData};
use crate::engine::fetch::Resource;

/// Compiled shader stage
pub struct Shader {
    handle: OwnedHandle,
    stage: ShaderStage,
}

impl Shader {
    pub fn new(device: &mut dyn GraphicsDevice, stage: ShaderStage, source: &ShaderData) -> Result<Self> {
        let handle = device.create_shader(stage, source)?;
        Ok(Self {
            handle: OwnedHandle::new(device, handle, GpuResource::Shader, "shader"),
            stage,
        })
    }

    pub fn transfer(&mut self) -> Self {
        Self {
            handle: self.handle.transfer(),
            stage: self.stage,
        }
    }

    pub fn handle(&self) -> GpuHandle {
        self.handle.get("shader")
    }

    pub fn is_owning(&self) -> bool {
        self.handle.is_owning()
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }
}

impl Resource for Shader {
    type Context = dyn GraphicsDevice;
}

/// Vertex and fragment shaders linked for one texture binding
///
/// The stages are kept alive as long as the program.
pub struct Program {
    handle: OwnedHandle,
    binding: TextureBinding,
    _vertex: Shader,
    _fragment: Shader,
}

impl Program {
    pub fn new(
        device: &mut dyn GraphicsDevice,
        mut vertex: Shader,
        mut fragment: Shader,
        binding: TextureBinding,
    ) -> Result<Self> {
        let handle = device.create_program(vertex.handle(), fragment.handle(), binding)?;
        debug!("Linked program {:?} ({:?})", handle, binding);
        Ok(Self {
            handle: OwnedHandle::new(device, handle, GpuResource::Program, "program"),
            binding,
            _vertex: vertex.transfer(),
            _fragment: fragment.transfer(),
        })
    }

    /// Compile both stages of `source` and link them
    pub fn from_source(
        device: &mut dyn GraphicsDevice,
        source: &ProgramSource,
        binding: TextureBinding,
    ) -> Result<Self> {
        let vertex = Shader::new(device, ShaderStage::Vertex, &source.vertex)?;
        let fragment = Shader::new(device, ShaderStage::Fragment, &source.fragment)?;
        Self::new(device, vertex, fragment, binding)
    }

    pub fn transfer(&mut self) -> Self {
        Self {
            handle: self.handle.transfer(),
            binding: self.binding,
            _vertex: self._vertex.transfer(),
            _fragment: self._fragment.transfer(),
        }
    }

    pub fn handle(&self) -> GpuHandle {
        self.handle.get("program")
    }

    pub fn is_owning(&self) -> bool {
        self.handle.is_owning()
    }

    pub fn binding(&self) -> TextureBinding {
        self.binding
    }
}

impl Resource for Program {
    type Context = dyn GraphicsDevice;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::renderer::HeadlessDevice;

    fn source() -> ProgramSource {
        ProgramSource {
            vertex: ShaderData::new("vertex"),
            fragment: ShaderData::new("fragment"),
        }
    }

    #[test]
    fn test_program_links_both_stages() {
        let mut device = HeadlessDevice::new();
        let program = Program::from_source(&mut device, &source(), TextureBinding::Cube).unwrap();
        assert_eq!(device.created(), 3);
        assert_eq!(device.program_binding(program.handle()), Some(TextureBinding::Cube));
    }

    #[test]
    fn test_dropping_program_releases_stages() {
        let mut device = HeadlessDevice::new();
        let mut program =
            Program::from_source(&mut device, &source(), TextureBinding::Texture2d).unwrap();
        let moved = program.transfer();
        drop(program);
        assert_eq!(device.collect_garbage(), 0);

        drop(moved);
        assert_eq!(device.collect_garbage(), 3);
        assert_eq!(device.live_count(), 0);
    }
}
