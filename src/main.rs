use std::sync::Arc;

use anyhow::Result;
use glam::{Vec2, Vec3, Vec4};
use log::{error, info};
use winit::{
    event::{Event, WindowEvent},
    event_loop::EventLoop,
    window::WindowBuilder,
};

use lucent::engine::assets::GeometryData;
use lucent::engine::ecs::{
    Camera, ColliderComponent, InterfaceComponent, ListenerComponent, ModelComponent, RigidbodyComponent,
    TransformComponent,
};
use lucent::engine::fetch::{FetchCache, Fetched, FileSource};
use lucent::engine::input::{InputState, KeyCode};
use lucent::engine::physics::{Shape, ShapeKind};
use lucent::engine::renderer::{Mesh, WgpuDevice};
use lucent::{FrameClock, Runtime, RuntimeConfig, Scene};

#[cfg(feature = "kira-audio")]
fn audio_device() -> Result<lucent::engine::audio::KiraAudio> {
    lucent::engine::audio::KiraAudio::new()
}

#[cfg(not(feature = "kira-audio"))]
fn audio_device() -> Result<lucent::engine::audio::HeadlessAudio> {
    Ok(lucent::engine::audio::HeadlessAudio::new())
}

/// Config from the first argument, `lucent.json` if present, or defaults
fn load_config() -> Result<RuntimeConfig> {
    match std::env::args().nth(1) {
        Some(path) => RuntimeConfig::load(path),
        None if std::path::Path::new("lucent.json").exists() => RuntimeConfig::load("lucent.json"),
        None => Ok(RuntimeConfig::default()),
    }
}

fn cube_mesh() -> Fetched<Mesh> {
    Fetched::<Mesh>::pending(FetchCache::ready(GeometryData::cube()), |geometry, device| {
        Mesh::new(device, geometry)
    })
}

/// A floor, a falling crate, a camera and a loading bar
fn demo_scene() -> Result<Scene> {
    let mesh = cube_mesh();
    let shape = Fetched::ready(Shape::new(&GeometryData::cube(), ShapeKind::Box)?);
    let mut scene = Scene::new("demo");

    let mut floor_model = ModelComponent::blockout();
    floor_model.use_mesh(&mesh).set_tint(Vec4::new(0.4, 0.4, 0.45, 1.0));
    let mut floor_collider = ColliderComponent::new();
    floor_collider.use_shape(&shape);
    scene.spawn((
        TransformComponent::from_position(Vec3::new(0.0, -0.5, 0.0)),
        floor_model,
        floor_collider,
    ));

    let mut crate_model = ModelComponent::blockout();
    crate_model.use_mesh(&mesh).set_tint(Vec4::new(0.8, 0.5, 0.2, 1.0));
    let mut crate_body = RigidbodyComponent::dynamic();
    crate_body.use_shape(&shape);
    scene.spawn((
        TransformComponent::from_position(Vec3::new(0.0, 4.0, 0.0)),
        crate_model,
        crate_body,
    ));

    let mut eye = TransformComponent::from_position(Vec3::new(0.0, 2.0, -6.0));
    eye.set_rotation_relative(Vec3::new(0.2, 0.0, 0.0));
    scene.spawn((eye, Camera::default(), ListenerComponent));

    scene.spawn((InterfaceComponent::new(|frame| {
        if !frame.progress.is_idle() {
            let width = frame.screen.x * 0.5 * frame.progress.ratio();
            frame.colored(
                Vec2::new(frame.screen.x * 0.25, frame.screen.y - 24.0),
                Vec2::new(width, 8.0),
                Vec4::ONE,
            );
        }
    }),));
    Ok(scene)
}

fn main() -> Result<()> {
    let config = load_config()?;

    // Initialize logger
    env_logger::Builder::from_default_env()
        .filter_level(config.log_filter())
        .init();

    info!("Starting {}...", config.window_title);

    let fetch_runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.fetch_workers.max(1))
        .thread_name("lucent-fetch")
        .enable_all()
        .build()?;
    let source = Arc::new(FileSource::new(&config.asset_root, fetch_runtime.handle().clone()));

    // Create event loop and window
    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(config.window_width, config.window_height))
            .with_resizable(true)
            .build(&event_loop)?,
    );
    let graphics = pollster::block_on(WgpuDevice::new(window.clone()))?;
    let audio = audio_device()?;

    let size = window.inner_size();
    let mut input = InputState::new(size.width, size.height);
    let mut clock = FrameClock::new();
    let mut runtime = Runtime::new(config, source, graphics, audio);
    runtime.add_scene(demo_scene()?);

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { event, .. } => {
                input.process_window_event(&event);
                match event {
                    WindowEvent::CloseRequested => {
                        info!("Close requested, shutting down...");
                        elwt.exit();
                    }
                    WindowEvent::RedrawRequested => {
                        let snapshot = input.snapshot(clock.tick());
                        if snapshot.just_pressed(KeyCode::Escape) {
                            elwt.exit();
                            return;
                        }
                        if snapshot.just_pressed(KeyCode::F3) {
                            let enabled = !runtime.config().debug_overlay;
                            runtime.set_debug_overlay(enabled);
                        }
                        if snapshot.just_pressed(KeyCode::KeyP) {
                            clock.toggle_pause();
                        }
                        if let Err(e) = runtime.tick(&snapshot) {
                            error!("Frame failed: {:#}", e);
                            elwt.exit();
                        }
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                // Request redraw on next frame
                window.request_redraw();
            }
            _ => {}
        })
        .map_err(|e| anyhow::anyhow!("Event loop error: {}", e))?;

    Ok(())
}
