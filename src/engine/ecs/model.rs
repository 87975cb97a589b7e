// Model component: a mesh and the textures it is shaded with

use glam::{Mat4, Vec4};

use crate::engine::fetch::Fetched;
use crate::engine::renderer::{DrawCall, DrawPass, GraphicsDevice, Mesh, Program, Shading, Texture};
use crate::fatal;

/// Which textures a model samples
#[derive(Debug, Clone, Default)]
pub enum ModelKind {
    /// Flat vertex colors, no textures
    #[default]
    Blockout,
    Unlit {
        color: Fetched<Texture>,
    },
    Pbr {
        color: Fetched<Texture>,
        normal: Fetched<Texture>,
        /// Occlusion, roughness and metallic packed in one texture
        surface: Fetched<Texture>,
    },
}

impl ModelKind {
    fn name(&self) -> &'static str {
        match self {
            ModelKind::Blockout => "blockout",
            ModelKind::Unlit { .. } => "unlit",
            ModelKind::Pbr { .. } => "pbr",
        }
    }

    fn textures(&self) -> Vec<&Fetched<Texture>> {
        match self {
            ModelKind::Blockout => Vec::new(),
            ModelKind::Unlit { color } => vec![color],
            ModelKind::Pbr {
                color,
                normal,
                surface,
            } => vec![color, normal, surface],
        }
    }
}

/// Renderable mesh on an entity
#[derive(Debug, Clone, Default)]
pub struct ModelComponent {
    mesh: Fetched<Mesh>,
    kind: ModelKind,
    program: Option<Fetched<Program>>,
    tint: Vec4,
    visible: bool,
}

impl ModelComponent {
    fn with_kind(kind: ModelKind) -> Self {
        Self {
            mesh: Fetched::empty(),
            kind,
            program: None,
            tint: Vec4::ONE,
            visible: true,
        }
    }

    pub fn blockout() -> Self {
        Self::with_kind(ModelKind::Blockout)
    }

    pub fn unlit() -> Self {
        Self::with_kind(ModelKind::Unlit {
            color: Fetched::empty(),
        })
    }

    pub fn pbr() -> Self {
        Self::with_kind(ModelKind::Pbr {
            color: Fetched::empty(),
            normal: Fetched::empty(),
            surface: Fetched::empty(),
        })
    }

    pub fn use_mesh(&mut self, mesh: &Fetched<Mesh>) -> &mut Self {
        self.mesh = mesh.clone();
        self
    }

    /// Base color texture; blockout models have none
    pub fn use_color(&mut self, texture: &Fetched<Texture>) -> &mut Self {
        match &mut self.kind {
            ModelKind::Unlit { color } | ModelKind::Pbr { color, .. } => *color = texture.clone(),
            ModelKind::Blockout => fatal!("A blockout model has no color texture"),
        }
        self
    }

    pub fn use_normal(&mut self, texture: &Fetched<Texture>) -> &mut Self {
        match &mut self.kind {
            ModelKind::Pbr { normal, .. } => *normal = texture.clone(),
            kind => fatal!("A {} model has no normal texture", kind.name()),
        }
        self
    }

    /// Occlusion-roughness-metallic texture
    pub fn use_surface(&mut self, texture: &Fetched<Texture>) -> &mut Self {
        match &mut self.kind {
            ModelKind::Pbr { surface, .. } => *surface = texture.clone(),
            kind => fatal!("A {} model has no surface texture", kind.name()),
        }
        self
    }

    /// Shade with a custom program instead of the built-in one
    pub fn use_program(&mut self, program: &Fetched<Program>) -> &mut Self {
        self.program = Some(program.clone());
        self
    }

    pub fn set_tint(&mut self, tint: Vec4) -> &mut Self {
        self.tint = tint;
        self
    }

    pub fn set_visible(&mut self, visible: bool) -> &mut Self {
        self.visible = visible;
        self
    }

    pub fn kind(&self) -> &ModelKind {
        &self.kind
    }

    pub fn mesh(&self) -> &Fetched<Mesh> {
        &self.mesh
    }

    /// Realize whatever has arrived
    pub(crate) fn poll(&self, device: &mut (dyn GraphicsDevice + 'static)) {
        self.mesh.poll(device);
        for texture in self.kind.textures() {
            texture.poll(device);
        }
        if let Some(program) = &self.program {
            program.poll(device);
        }
    }

    /// Draw for this frame, once the mesh and every texture are ready
    pub(crate) fn draw_call(&self, model: Mat4, view_projection: Mat4) -> Option<DrawCall> {
        if !self.visible {
            return None;
        }
        let mesh = self.mesh.try_value()?;
        let textures = self
            .kind
            .textures()
            .into_iter()
            .map(|t| t.try_value().map(|t| t.handle()))
            .collect::<Option<Vec<_>>>()?;

        let shading = match &self.program {
            Some(program) => Shading::Custom(program.try_value()?.handle()),
            None => match self.kind {
                ModelKind::Blockout => Shading::Blockout,
                ModelKind::Unlit { .. } => Shading::Unlit,
                ModelKind::Pbr { .. } => Shading::Pbr,
            },
        };

        Some(DrawCall {
            mesh: mesh.handle(),
            index_count: mesh.index_count(),
            shading,
            textures,
            model,
            view_projection,
            color: self.tint,
            pass: DrawPass::Opaque,
        })
    }
}
