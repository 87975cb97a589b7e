// Rendering pass: camera, skybox, opaque models and interface quads

use anyhow::Result;
use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::engine::assets::GeometryData;
use crate::engine::ecs::{Camera, InterfaceComponent, ModelComponent, Quad, SkyboxComponent, TransformComponent};
use crate::engine::fetch::{FetchCache, FetchProgress, Fetched};
use crate::engine::renderer::{DrawCall, DrawPass, GraphicsDevice, Mesh, Shading};
use crate::engine::scene::Scene;

/// Projection and view of the first camera found in any scene
struct View {
    projection: Mat4,
    view: Mat4,
}

fn find_camera(scenes: &[Scene], aspect: f32) -> Option<View> {
    scenes.iter().find_map(|scene| {
        let mut query = scene.world().query::<(&Camera, &TransformComponent)>();
        let view = query.iter().next().map(|(_, (camera, transform))| View {
            projection: camera.projection(aspect),
            view: Camera::view(transform.matrix()),
        });
        view
    })
}

/// Draws one frame of every scene
pub(crate) struct Renderer {
    clear_color: [f32; 4],
    cube: Fetched<Mesh>,
    quad: Fetched<Mesh>,
}

impl Renderer {
    pub(crate) fn new(clear_color: [f32; 4]) -> Self {
        Self {
            clear_color,
            cube: Fetched::<Mesh>::pending(FetchCache::ready(GeometryData::cube()), |geometry, device| {
                Mesh::new(device, geometry)
            }),
            quad: Fetched::<Mesh>::pending(FetchCache::ready(GeometryData::quad()), |geometry, device| {
                Mesh::new(device, geometry)
            }),
        }
    }

    /// Clear, draw the skybox, models and interface, then post-process.
    ///
    /// Returns the world view-projection for the overlay, or `None` when no
    /// scene has a camera. Without a camera only the interface is drawn.
    pub(crate) fn draw(
        &mut self,
        scenes: &mut [Scene],
        device: &mut (dyn GraphicsDevice + 'static),
        screen: Vec2,
        progress: FetchProgress,
    ) -> Result<Option<Mat4>> {
        device.begin_frame(self.clear_color)?;
        self.cube.poll(device);
        self.quad.poll(device);

        let camera = find_camera(scenes, screen.x / screen.y.max(1.0));
        if let Some(camera) = &camera {
            self.draw_skybox(scenes, device, camera);
            Self::draw_models(scenes, device, camera.projection * camera.view);
        }
        self.draw_interface(scenes, device, screen, progress);
        device.post_process();

        Ok(camera.map(|camera| camera.projection * camera.view))
    }

    fn draw_skybox(&self, scenes: &[Scene], device: &mut (dyn GraphicsDevice + 'static), camera: &View) {
        let Some(cube) = self.cube.try_value() else {
            return;
        };
        let skybox = scenes.iter().find_map(|scene| {
            let mut query = scene.world().query::<&SkyboxComponent>();
            let call = query.iter().next().and_then(|(_, skybox)| {
                skybox.poll(device);
                let cubemap = skybox.cubemap().try_value()?;
                let shading = match skybox.program() {
                    Some(program) => Shading::Custom(program.try_value()?.handle()),
                    None => Shading::Skybox,
                };
                Some(DrawCall {
                    mesh: cube.handle(),
                    index_count: cube.index_count(),
                    shading,
                    textures: vec![cubemap.handle()],
                    model: Mat4::IDENTITY,
                    view_projection: camera.projection * Camera::skybox_view(camera.view),
                    color: Vec4::ONE,
                    pass: DrawPass::Skybox,
                })
            });
            call
        });
        if let Some(call) = skybox {
            device.draw(&call);
        }
    }

    fn draw_models(scenes: &[Scene], device: &mut (dyn GraphicsDevice + 'static), view_projection: Mat4) {
        for scene in scenes {
            let mut query = scene.world().query::<(&ModelComponent, &TransformComponent)>();
            for (_, (model, transform)) in query.iter() {
                model.poll(device);
                if let Some(call) = model.draw_call(transform.matrix(), view_projection) {
                    device.draw(&call);
                }
            }
        }
    }

    fn draw_interface(
        &self,
        scenes: &mut [Scene],
        device: &mut (dyn GraphicsDevice + 'static),
        screen: Vec2,
        progress: FetchProgress,
    ) {
        let Some(quad_mesh) = self.quad.try_value() else {
            return;
        };
        let projection = Camera::interface_projection(screen.x, screen.y);
        for scene in scenes.iter_mut() {
            for (_, interface) in scene.world_mut().query_mut::<&mut InterfaceComponent>() {
                for quad in interface.build(screen, progress, device) {
                    let Some(call) = Self::quad_call(&quad, &quad_mesh, projection) else {
                        continue;
                    };
                    device.draw(&call);
                }
            }
        }
    }

    /// Draw for one quad; textured quads wait for their texture
    fn quad_call(quad: &Quad, mesh: &Mesh, projection: Mat4) -> Option<DrawCall> {
        let textures = match &quad.texture {
            Some(texture) => vec![texture.try_value()?.handle()],
            None => Vec::new(),
        };
        Some(DrawCall {
            mesh: mesh.handle(),
            index_count: mesh.index_count(),
            shading: Shading::Interface,
            textures,
            model: Mat4::from_translation(quad.position.extend(0.0))
                * Mat4::from_scale(Vec3::new(quad.size.x, quad.size.y, 1.0)),
            view_projection: projection,
            color: quad.color,
            pass: DrawPass::Interface,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::{CubemapFaces, ImageData};
    use crate::engine::ecs::SkyboxComponent;
    use crate::engine::renderer::{Cubemap, FrameEvent, HeadlessDevice};

    fn passes(device: &HeadlessDevice) -> Vec<DrawPass> {
        device.draw_calls().map(|call| call.pass).collect()
    }

    fn cube_model() -> ModelComponent {
        let mut model = ModelComponent::blockout();
        model.use_mesh(&Fetched::<Mesh>::pending(FetchCache::ready(GeometryData::cube()), |g, device| {
            Mesh::new(device, g)
        }));
        model
    }

    #[test]
    fn test_passes_in_order() {
        let mut device = HeadlessDevice::new();
        let faces = CubemapFaces {
            faces: vec![ImageData::solid([40, 80, 200, 255]); 6],
        };
        let cubemap = Fetched::ready(Cubemap::new(&mut device, &faces).unwrap());

        let mut scene = Scene::new("world");
        scene.spawn((TransformComponent::new(), cube_model()));
        scene.spawn((TransformComponent::from_position(Vec3::new(0.0, 0.0, -5.0)), Camera::default()));
        let mut skybox = SkyboxComponent::new();
        skybox.use_cubemap(&cubemap);
        scene.spawn((skybox,));
        scene.spawn((InterfaceComponent::new(|frame| {
            frame.colored(Vec2::new(10.0, 10.0), Vec2::new(100.0, 20.0), Vec4::ONE);
        }),));
        let mut scenes = vec![scene];

        let mut renderer = Renderer::new([0.0; 4]);
        let view_projection = renderer
            .draw(&mut scenes, &mut device, Vec2::new(640.0, 480.0), FetchProgress::default())
            .unwrap();
        assert!(view_projection.is_some());
        assert_eq!(passes(&device), vec![DrawPass::Skybox, DrawPass::Opaque, DrawPass::Interface]);
        assert!(matches!(device.events().first(), Some(FrameEvent::Begin { .. })));
        assert!(matches!(device.events().last(), Some(FrameEvent::PostProcess)));

        let skybox = device.draw_calls().next().unwrap();
        assert_eq!(skybox.shading, Shading::Skybox);
        assert_eq!(skybox.textures, vec![cubemap.value().handle()]);
    }

    #[test]
    fn test_no_camera_draws_interface_only() {
        let mut device = HeadlessDevice::new();
        let mut scene = Scene::new("menu");
        scene.spawn((TransformComponent::new(), cube_model()));
        scene.spawn((InterfaceComponent::new(|frame| {
            frame.colored(Vec2::ZERO, Vec2::ONE, Vec4::ONE);
        }),));
        let mut scenes = vec![scene];

        let mut renderer = Renderer::new([0.0; 4]);
        let view_projection = renderer
            .draw(&mut scenes, &mut device, Vec2::new(320.0, 200.0), FetchProgress::default())
            .unwrap();
        assert!(view_projection.is_none());
        assert_eq!(passes(&device), vec![DrawPass::Interface]);
    }

    #[test]
    fn test_quad_scaled_to_pixels() {
        let mut device = HeadlessDevice::new();
        let mut scene = Scene::new("hud");
        scene.spawn((InterfaceComponent::new(|frame| {
            frame.colored(Vec2::new(5.0, 6.0), Vec2::new(30.0, 40.0), Vec4::ONE);
        }),));
        let mut scenes = vec![scene];

        Renderer::new([0.0; 4])
            .draw(&mut scenes, &mut device, Vec2::new(100.0, 100.0), FetchProgress::default())
            .unwrap();
        let call = device.draw_calls().next().unwrap();
        let far_corner = call.model.transform_point3(Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(far_corner, Vec3::new(35.0, 46.0, 0.0));
        assert!(call.textures.is_empty());
    }
}
