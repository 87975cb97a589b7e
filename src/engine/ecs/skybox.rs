// Skybox component: a cubemap drawn behind everything else

use crate::engine::fetch::Fetched;
use crate::engine::renderer::{Cubemap, GraphicsDevice, Program};

/// Cubemap drawn around the camera, optionally with a custom program
///
/// The first skybox found in a scene is drawn.
#[derive(Debug, Clone, Default)]
pub struct SkyboxComponent {
    cubemap: Fetched<Cubemap>,
    program: Option<Fetched<Program>>,
}

impl SkyboxComponent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_cubemap(&mut self, cubemap: &Fetched<Cubemap>) -> &mut Self {
        self.cubemap = cubemap.clone();
        self
    }

    pub fn use_program(&mut self, program: &Fetched<Program>) -> &mut Self {
        self.program = Some(program.clone());
        self
    }

    pub(crate) fn poll(&self, device: &mut (dyn GraphicsDevice + 'static)) {
        self.cubemap.poll(device);
        if let Some(program) = &self.program {
            program.poll(device);
        }
    }

    pub(crate) fn cubemap(&self) -> &Fetched<Cubemap> {
        &self.cubemap
    }

    pub(crate) fn program(&self) -> Option<&Fetched<Program>> {
        self.program.as_ref()
    }
}
