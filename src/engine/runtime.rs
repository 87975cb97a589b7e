// Runtime: owns the scenes and devices and drives one frame per tick

use std::sync::Arc;

use anyhow::Result;
use glam::Vec2;
use log::{debug, info};

use crate::core::RuntimeConfig;
use crate::engine::assets::Assets;
use crate::engine::audio::{AudioDevice, ListenerPose};
use crate::engine::fetch::{ByteSource, FetchCache, FetchEngine, FetchProgress};
use crate::engine::input::InputSnapshot;
use crate::engine::physics::PhysicsWorld;
use crate::engine::renderer::GraphicsDevice;
use crate::engine::scene::Scene;
use crate::engine::systems::{dynamics, mixer, motion, overlay, Renderer};

/// Index of a scene added to the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneId(usize);

/// What the update callback can touch during a frame
pub struct FrameContext<'a> {
    pub input: &'a InputSnapshot,
    pub scenes: &'a mut [Scene],
    pub assets: &'a Assets,
    /// `None` until some scene first needs physics
    pub physics: Option<&'a mut PhysicsWorld>,
}

impl FrameContext<'_> {
    pub fn scene(&mut self, id: SceneId) -> &mut Scene {
        &mut self.scenes[id.0]
    }
}

type UpdateCallback = Box<dyn FnMut(&mut FrameContext<'_>)>;

/// Owns everything one game instance needs
///
/// `tick` runs the frame in a fixed order: input, update callback, motion,
/// dynamics, mixer, rendering, debug overlay, present and release. Scenes
/// are visited in the order they were added.
pub struct Runtime<G: GraphicsDevice, A: AudioDevice> {
    config: RuntimeConfig,
    scenes: Vec<Scene>,
    graphics: G,
    audio: A,
    assets: Assets,
    physics: Option<PhysicsWorld>,
    renderer: Renderer,
    listener: Option<ListenerPose>,
    update: Option<UpdateCallback>,
    screen: (u32, u32),
    frame_count: u64,
}

impl<G: GraphicsDevice + 'static, A: AudioDevice + 'static> Runtime<G, A> {
    pub fn new(config: RuntimeConfig, source: Arc<dyn ByteSource>, graphics: G, audio: A) -> Self {
        let cache = FetchCache::new(FetchEngine::new(source));
        let assets = Assets::new(cache, &graphics);
        info!(
            "Runtime started (etc2: {}, s3tc: {}, debug overlay: {})",
            graphics.supports_etc2(),
            graphics.supports_s3tc(),
            config.debug_overlay
        );
        Self {
            renderer: Renderer::new(config.clear_color),
            config,
            scenes: Vec::new(),
            graphics,
            audio,
            assets,
            physics: None,
            listener: None,
            update: None,
            screen: (0, 0),
            frame_count: 0,
        }
    }

    /// Set the callback run at the start of every frame, before any pass
    pub fn on_update<F>(&mut self, callback: F)
    where
        F: FnMut(&mut FrameContext<'_>) + 'static,
    {
        self.update = Some(Box::new(callback));
    }

    /// Add a scene; later scenes are updated and drawn after earlier ones
    pub fn add_scene(&mut self, scene: Scene) -> SceneId {
        info!("Added scene '{}'", scene.name());
        self.scenes.push(scene);
        SceneId(self.scenes.len() - 1)
    }

    pub fn scene(&self, id: SceneId) -> &Scene {
        &self.scenes[id.0]
    }

    pub fn scene_mut(&mut self, id: SceneId) -> &mut Scene {
        &mut self.scenes[id.0]
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn assets(&self) -> &Assets {
        &self.assets
    }

    /// Fetch counters, for loading screens
    pub fn fetch_progress(&self) -> FetchProgress {
        self.assets.progress()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn physics(&self) -> Option<&PhysicsWorld> {
        self.physics.as_ref()
    }

    pub fn physics_mut(&mut self) -> Option<&mut PhysicsWorld> {
        self.physics.as_mut()
    }

    pub fn graphics(&self) -> &G {
        &self.graphics
    }

    pub fn graphics_mut(&mut self) -> &mut G {
        &mut self.graphics
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut A {
        &mut self.audio
    }

    pub fn set_debug_overlay(&mut self, enabled: bool) {
        self.config.debug_overlay = enabled;
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Run one frame. Returns false when the frame was skipped because
    /// the screen has no area.
    pub fn tick(&mut self, input: &InputSnapshot) -> Result<bool> {
        if input.is_minimized() {
            return Ok(false);
        }
        let size = (input.screen_width, input.screen_height);
        if self.screen != size {
            debug!("Screen resized to {}x{}", size.0, size.1);
            self.graphics.resize(size.0, size.1);
            self.screen = size;
        }
        let dt = input.dt.max(0.0);

        if let Some(update) = self.update.as_mut() {
            let mut context = FrameContext {
                input,
                scenes: &mut self.scenes,
                assets: &self.assets,
                physics: self.physics.as_mut(),
            };
            update(&mut context);
        }

        for scene in self.scenes.iter_mut() {
            motion::run(scene.world_mut(), dt);
        }
        dynamics::run(&mut self.physics, &self.config, &mut self.scenes, dt);
        mixer::run(&mut self.scenes, &mut self.audio, &mut self.listener);

        let screen = Vec2::new(size.0 as f32, size.1 as f32);
        let progress = self.assets.progress();
        let view_projection = self.renderer.draw(&mut self.scenes, &mut self.graphics, screen, progress)?;
        if self.config.debug_overlay {
            if let Some(view_projection) = view_projection {
                let lines = overlay::collect(&self.scenes, self.physics.as_ref());
                self.graphics.draw_lines(&lines, view_projection);
            }
        }
        self.graphics.end_frame()?;

        for scene in self.scenes.iter_mut() {
            scene.flush(self.physics.as_mut());
        }
        self.graphics.collect_garbage();
        self.audio.collect_garbage();

        self.frame_count += 1;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::animation::{Animation, MotionTrack};
    use crate::engine::assets::{
        AnimationData, Codec, GeometryData, ImageData, ImagePaths, JointTrack, MotionTrackData, Vec3Key,
    };
    use crate::engine::audio::HeadlessAudio;
    use crate::engine::ecs::{
        AnimatorComponent, Camera, InterfaceComponent, ListenerComponent, ModelComponent, RigidbodyComponent,
        SkyboxComponent, TransformComponent,
    };
    use crate::engine::fetch::{Fetched, MemorySource};
    use crate::engine::physics::{Shape, ShapeKind};
    use crate::engine::renderer::{DrawPass, FrameEvent, HeadlessDevice};
    use glam::{Vec3, Vec4};

    type TestRuntime = Runtime<HeadlessDevice, HeadlessAudio>;

    fn runtime(source: &Arc<MemorySource>) -> TestRuntime {
        let config = RuntimeConfig::default().with_debug_overlay(true);
        Runtime::new(config, source.clone(), HeadlessDevice::new(), HeadlessAudio::new())
    }

    fn input() -> InputSnapshot {
        InputSnapshot::new(640, 480, 1.0 / 60.0)
    }

    /// Frame events with draws reduced to their pass
    fn outline(events: &[FrameEvent]) -> Vec<String> {
        events
            .iter()
            .map(|event| match event {
                FrameEvent::Begin { .. } => "begin".to_string(),
                FrameEvent::Draw(call) => format!("{:?}", call.pass),
                FrameEvent::PostProcess => "post".to_string(),
                FrameEvent::Lines { .. } => "lines".to_string(),
                FrameEvent::End => "end".to_string(),
            })
            .collect()
    }

    fn populate(runtime: &mut TestRuntime) {
        let faces: [ImagePaths; 6] = std::array::from_fn(|i| ImagePaths::raw(&format!("sky{}.bin", i)));
        let cubemap = runtime.assets().cubemap(&faces);
        let mesh = runtime.assets().mesh("crate.geom");

        let mut scene = Scene::new("world");
        let mut model = ModelComponent::blockout();
        model.use_mesh(&mesh);
        scene.spawn((TransformComponent::new(), model));
        scene.spawn((TransformComponent::from_position(Vec3::new(0.0, 1.0, -4.0)), Camera::default()));
        let mut skybox = SkyboxComponent::new();
        skybox.use_cubemap(&cubemap);
        scene.spawn((skybox,));
        scene.spawn((InterfaceComponent::new(|frame| {
            frame.colored(Vec2::ZERO, Vec2::new(frame.screen.x * frame.progress.ratio(), 4.0), Vec4::ONE);
        }),));
        runtime.add_scene(scene);
    }

    fn assets_source() -> Arc<MemorySource> {
        let source = Arc::new(MemorySource::immediate());
        source.insert("crate.geom", GeometryData::cube().encode());
        for i in 0..6 {
            source.insert(&format!("sky{}.bin", i), ImageData::solid([10, 20, 30, 255]).encode());
        }
        source
    }

    #[test]
    fn test_frame_order() {
        let source = assets_source();
        let mut runtime = runtime(&source);
        populate(&mut runtime);

        assert!(runtime.tick(&input()).unwrap());
        assert_eq!(
            outline(runtime.graphics().events()),
            vec!["begin", "Skybox", "Opaque", "Interface", "post", "lines", "end"]
        );
        assert_eq!(runtime.fetch_progress().completed, 7);
    }

    #[test]
    fn test_identical_runs_draw_identically() {
        let mut outlines = Vec::new();
        for _ in 0..2 {
            let source = assets_source();
            let mut runtime = runtime(&source);
            populate(&mut runtime);
            for _ in 0..3 {
                runtime.tick(&input()).unwrap();
            }
            let draws: Vec<_> = runtime.graphics().draw_calls().cloned().collect();
            outlines.push(draws);
        }
        assert_eq!(outlines[0], outlines[1]);
    }

    #[test]
    fn test_minimized_frame_skipped() {
        let source = Arc::new(MemorySource::immediate());
        let mut runtime = runtime(&source);
        let ran = std::rc::Rc::new(std::cell::Cell::new(false));
        let flag = ran.clone();
        runtime.on_update(move |_| flag.set(true));

        assert!(!runtime.tick(&InputSnapshot::new(0, 480, 0.016)).unwrap());
        assert!(!ran.get());
        assert_eq!(runtime.graphics().frames(), 0);
        assert_eq!(runtime.frame_count(), 0);
    }

    #[test]
    fn test_motion_reaches_physics_and_listener_same_tick() {
        let clip = AnimationData {
            duration: 1.0,
            tracks: vec![JointTrack::default()],
        };
        let track = MotionTrackData {
            translations: vec![
                Vec3Key {
                    time: 0.0,
                    value: [0.0, 0.0, 0.0],
                },
                Vec3Key {
                    time: 1.0,
                    value: [0.0, 0.0, 2.0],
                },
            ],
            ..Default::default()
        };
        let clip = Fetched::ready(Animation::new(&clip).unwrap());
        let track = Fetched::ready(MotionTrack::new(&track).unwrap());
        let mut animator = AnimatorComponent::new();
        animator.use_animation("walk", &clip).use_motion_track("walk", &track);
        animator.controller("walk").play().set_loop(true);

        let shape = Fetched::ready(Shape::new(&GeometryData::cube(), ShapeKind::Box).unwrap());
        let mut body = RigidbodyComponent::kinematic();
        body.use_shape(&shape);

        let source = Arc::new(MemorySource::immediate());
        let mut runtime = runtime(&source);
        let id = runtime.add_scene(Scene::new("world"));
        let walker = runtime
            .scene_mut(id)
            .spawn((TransformComponent::new(), animator, body, ListenerComponent));

        let mut snapshot = input();
        snapshot.dt = 0.25;
        runtime.tick(&snapshot).unwrap();

        // the listener is placed from the pose motion produced this tick
        let listener = runtime.audio().listener().unwrap();
        assert!((listener.position.z - 0.5).abs() < 1e-4);

        // the body was created and pushed after motion, before the mixer
        let (handle, _) = runtime
            .scene(id)
            .world()
            .get::<&RigidbodyComponent>(walker)
            .unwrap()
            .instance
            .unwrap();
        let center = runtime.physics().unwrap().body_transform(handle).unwrap();
        assert!((center.w_axis.z - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_update_sees_input_before_motion() {
        let source = Arc::new(MemorySource::immediate());
        let mut runtime = runtime(&source);
        let id = runtime.add_scene(Scene::new("world"));
        let player = runtime.scene_mut(id).spawn((TransformComponent::new(),));

        runtime.on_update(move |frame| {
            let step = frame.input.dt * 10.0;
            frame.scene(id).with_transform(player, |t| {
                t.set_position_relative(Vec3::new(step, 0.0, 0.0));
            });
        });
        let mut snapshot = input();
        snapshot.dt = 0.1;
        runtime.tick(&snapshot).unwrap();

        let x = runtime.scene(id).world().get::<&TransformComponent>(player).unwrap().position().x;
        assert!((x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_despawned_model_released_same_frame() {
        let source = assets_source();
        let mut runtime = runtime(&source);
        let id = runtime.add_scene(Scene::new("world"));
        let mut model = ModelComponent::blockout();
        model.use_mesh(&runtime.assets().mesh("crate.geom"));
        let mut rigidbody = RigidbodyComponent::passive();
        rigidbody.use_shape(&runtime.assets().shape("crate.geom", ShapeKind::Box));
        let entity = runtime.scene_mut(id).spawn((TransformComponent::new(), model, rigidbody));

        runtime.tick(&input()).unwrap();
        assert_eq!(runtime.physics().map(|p| p.body_count()), Some(1));
        let live = runtime.graphics().live_count();

        runtime.scene_mut(id).despawn(entity);
        runtime.tick(&input()).unwrap();
        assert_eq!(runtime.physics().map(|p| p.body_count()), Some(0));
        // the asset loader still holds the mesh container
        assert_eq!(runtime.graphics().live_count(), live);
        assert_eq!(runtime.scene(id).entity_count(), 0);
    }

    #[test]
    fn test_resize_reaches_device() {
        let source = Arc::new(MemorySource::immediate());
        let mut runtime = runtime(&source);
        runtime.tick(&InputSnapshot::new(320, 200, 0.016)).unwrap();
        assert_eq!(runtime.graphics().size(), (320, 200));
        assert!(matches!(
            runtime.graphics().draw_calls().next().map(|c| c.pass),
            None | Some(DrawPass::Interface)
        ));
    }
}
