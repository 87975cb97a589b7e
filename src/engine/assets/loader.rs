// Asset loading: fetch containers for every runtime resource type

use log::debug;
use parking_lot::Mutex;
use std::any::{type_name, Any};
use std::collections::HashMap;

use super::{select_image_path, AudioData, CubemapFaces, EventTrackData, GeometryData, ImageData, ImagePaths};
use super::{AnimationData, MotionTrackData, ProgramSource, SkeletonData};
use crate::engine::animation::{Animation, EventTrack, MotionTrack, Skeleton};
use crate::engine::audio::Sound;
use crate::engine::fetch::{FetchCache, FetchFuture, FetchProgress, Fetched, Resource, ResourceKey};
use crate::engine::physics::{Shape, ShapeKind};
use crate::engine::renderer::{Cubemap, GraphicsDevice, Mesh, Program, Texture, TextureBinding};
use crate::fatal;

/// Hands out fetch containers for assets by path
///
/// Byte fetches are deduplicated by the cache. Containers are deduplicated
/// here as well, so every component asking for the same resource shares one
/// container and the native object is created once.
pub struct Assets {
    cache: FetchCache,
    supports_etc2: bool,
    supports_s3tc: bool,
    /// Containers by key, with the resource type name they were created as
    containers: Mutex<HashMap<ResourceKey, (&'static str, Box<dyn Any + Send + Sync>)>>,
}

impl Assets {
    /// Create a loader selecting compressed image variants the device supports
    pub fn new(cache: FetchCache, device: &dyn GraphicsDevice) -> Self {
        Self::with_compression(cache, device.supports_etc2(), device.supports_s3tc())
    }

    pub fn with_compression(cache: FetchCache, supports_etc2: bool, supports_s3tc: bool) -> Self {
        Self {
            cache,
            supports_etc2,
            supports_s3tc,
            containers: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    /// Fetch counters for loading screens
    pub fn progress(&self) -> FetchProgress {
        self.cache.progress()
    }

    /// Container stored under `key`, created by `make` on first use
    fn shared<T: Resource>(&self, key: ResourceKey, make: impl FnOnce() -> Fetched<T>) -> Fetched<T> {
        let mut containers = self.containers.lock();
        if let Some((loaded_as, existing)) = containers.get(&key) {
            return match existing.downcast_ref::<Fetched<T>>() {
                Some(fetched) => fetched.clone(),
                None => fatal!("Asset {:?} requested as {} but loaded as {}", key, type_name::<T>(), loaded_as),
            };
        }
        debug!("Loading {:?} as {}", key, type_name::<T>());
        let fetched = make();
        containers.insert(key, (type_name::<T>(), Box::new(fetched.clone())));
        fetched
    }

    /// Decoded geometry, shared by meshes and shapes of the same file
    pub fn geometry(&self, path: &str) -> FetchFuture<GeometryData> {
        self.cache.fetch(ResourceKey::from_path(path), [(0, path)])
    }

    pub fn mesh(&self, path: &str) -> Fetched<Mesh> {
        self.shared(ResourceKey::from_path(path).with_param("mesh"), || {
            Fetched::<Mesh>::pending(self.geometry(path), |geometry, device| Mesh::new(device, geometry))
        })
    }

    /// Collision shape of `kind` fitted to the geometry at `path`
    pub fn shape(&self, path: &str, kind: ShapeKind) -> Fetched<Shape> {
        let key = ResourceKey::from_path(path).with_param("shape").with_param(kind.name());
        self.shared(key, || {
            Fetched::<Shape>::pending(self.geometry(path), move |geometry, _: &mut ()| Shape::new(geometry, kind))
        })
    }

    /// Texture from the best variant the device can sample; only that
    /// variant is fetched
    pub fn texture(&self, paths: &ImagePaths) -> Fetched<Texture> {
        let path = select_image_path(paths, self.supports_etc2, self.supports_s3tc);
        self.shared(ResourceKey::from_path(path).with_param("texture"), || {
            let image = self.cache.fetch::<ImageData, _, _>(ResourceKey::from_path(path), [(0, path)]);
            Fetched::<Texture>::pending(image, |image, device| Texture::new(device, image))
        })
    }

    /// Cubemap from six faces in +X, -X, +Y, -Y, +Z, -Z order
    pub fn cubemap(&self, faces: &[ImagePaths; 6]) -> Fetched<Cubemap> {
        let paths: Vec<&str> = faces
            .iter()
            .map(|face| select_image_path(face, self.supports_etc2, self.supports_s3tc))
            .collect();
        let key = ResourceKey::from_paths(paths.iter().copied());
        self.shared(key.with_param("cubemap"), || {
            let faces = self
                .cache
                .fetch::<CubemapFaces, _, _>(key, paths.iter().copied().enumerate());
            Fetched::<Cubemap>::pending(faces, |faces, device| Cubemap::new(device, faces))
        })
    }

    /// Program linked from a vertex and a fragment shader
    pub fn program(&self, vertex: &str, fragment: &str, binding: TextureBinding) -> Fetched<Program> {
        let key = ResourceKey::from_paths([vertex, fragment]);
        let binding_name = match binding {
            TextureBinding::Texture2d => "texture2d",
            TextureBinding::Cube => "cube",
        };
        self.shared(key.with_param("program").with_param(binding_name), || {
            let source = self
                .cache
                .fetch::<ProgramSource, _, _>(key, [(0, vertex), (1, fragment)]);
            Fetched::<Program>::pending(source, move |source, device| Program::from_source(device, source, binding))
        })
    }

    pub fn sound(&self, path: &str) -> Fetched<Sound> {
        self.shared(ResourceKey::from_path(path).with_param("sound"), || {
            let audio = self.cache.fetch::<AudioData, _, _>(ResourceKey::from_path(path), [(0, path)]);
            Fetched::<Sound>::pending(audio, |audio, device| Sound::new(device, audio))
        })
    }

    pub fn skeleton(&self, path: &str) -> Fetched<Skeleton> {
        self.shared(ResourceKey::from_path(path).with_param("skeleton"), || {
            let data = self.cache.fetch::<SkeletonData, _, _>(ResourceKey::from_path(path), [(0, path)]);
            Fetched::<Skeleton>::pending(data, |data, _: &mut ()| Skeleton::new(data))
        })
    }

    pub fn animation(&self, path: &str) -> Fetched<Animation> {
        self.shared(ResourceKey::from_path(path).with_param("animation"), || {
            let data = self.cache.fetch::<AnimationData, _, _>(ResourceKey::from_path(path), [(0, path)]);
            Fetched::<Animation>::pending(data, |data, _: &mut ()| Animation::new(data))
        })
    }

    pub fn motion_track(&self, path: &str) -> Fetched<MotionTrack> {
        self.shared(ResourceKey::from_path(path).with_param("motion"), || {
            let data = self.cache.fetch::<MotionTrackData, _, _>(ResourceKey::from_path(path), [(0, path)]);
            Fetched::<MotionTrack>::pending(data, |data, _: &mut ()| MotionTrack::new(data))
        })
    }

    pub fn event_track(&self, path: &str) -> Fetched<EventTrack> {
        self.shared(ResourceKey::from_path(path).with_param("events"), || {
            let data = self.cache.fetch::<EventTrackData, _, _>(ResourceKey::from_path(path), [(0, path)]);
            Fetched::<EventTrack>::pending(data, |data, _: &mut ()| EventTrack::new(data))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::Codec;
    use crate::engine::fetch::{FetchEngine, MemorySource};
    use crate::engine::renderer::HeadlessDevice;
    use std::sync::Arc;

    fn assets(source: &Arc<MemorySource>, device: &HeadlessDevice) -> Assets {
        Assets::new(FetchCache::new(FetchEngine::new(source.clone())), device)
    }

    #[test]
    fn test_mesh_and_shape_share_one_read() {
        let source = Arc::new(MemorySource::new());
        source.insert("crate.geom", GeometryData::cube().encode());
        let mut device = HeadlessDevice::new();
        let assets = assets(&source, &device);

        let mesh = assets.mesh("crate.geom");
        let again = assets.mesh("crate.geom");
        let shape = assets.shape("crate.geom", ShapeKind::Box);
        assert!(mesh.ptr_eq(&again));
        assert_eq!(source.request_count("crate.geom"), 1);

        source.deliver_all();
        assert!(mesh.poll(&mut device));
        assert!(!again.poll(&mut device));
        assert!(shape.poll(&mut ()));
        assert_eq!(device.created(), 1);
        assert_eq!(mesh.value().index_count(), 36);
    }

    #[test]
    fn test_texture_fetches_selected_variant_only() {
        let source = Arc::new(MemorySource::new());
        source.insert("wall.s3tc", ImageData::solid([9; 4]).encode());
        let device = HeadlessDevice::new().with_compression(false, true);
        let assets = assets(&source, &device);

        let paths = ImagePaths::raw("wall.bin")
            .with_etc2("wall.etc2")
            .with_s3tc("wall.s3tc");
        assets.texture(&paths);
        assert_eq!(source.requests(), vec!["wall.s3tc".to_string()]);
    }

    #[test]
    fn test_shape_kinds_are_separate() {
        let source = Arc::new(MemorySource::new());
        let device = HeadlessDevice::new();
        let assets = assets(&source, &device);

        let boxed = assets.shape("rock.geom", ShapeKind::Box);
        let hull = assets.shape("rock.geom", ShapeKind::ConvexHull);
        assert!(!boxed.ptr_eq(&hull));
        assert_eq!(source.request_count("rock.geom"), 1);
    }

    #[test]
    #[should_panic(expected = "requested as lucent::engine::renderer::mesh::Mesh but loaded as lucent::engine::animation::skeleton::Skeleton")]
    fn test_container_type_mismatch_is_fatal() {
        let source = Arc::new(MemorySource::new());
        let device = HeadlessDevice::new();
        let assets = assets(&source, &device);

        let key = ResourceKey::from_path("a").with_param("mesh");
        assets.shared(key, || Fetched::<Skeleton>::empty());
        assets.mesh("a");
    }
}
