// Graphics device backed by wgpu

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::window::Window;

use super::{
    DebugLine, DeviceError, DrawCall, DrawPass, GpuHandle, GpuResource, GraphicsDevice, LineVertex,
    ShaderStage, Shading, TextureBinding, Vertex,
};
use crate::engine::assets::{CubemapFaces, GeometryData, ImageCompression, ImageData, ShaderData};
use crate::engine::release::{ReleaseQueue, Releaser};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Per-draw uniforms, padded to the dynamic offset alignment
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct DrawUniform {
    model: [[f32; 4]; 4],
    view_projection: [[f32; 4]; 4],
    color: [f32; 4],
    _padding: [f32; 28],
}

const UNIFORM_SIZE: u64 = std::mem::size_of::<DrawUniform>() as u64;

impl DrawUniform {
    fn new(model: Mat4, view_projection: Mat4, color: [f32; 4]) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            view_projection: view_projection.to_cols_array_2d(),
            color,
            _padding: [0.0; 28],
        }
    }
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    cube: bool,
}

struct GpuShader {
    stage: ShaderStage,
    module: wgpu::ShaderModule,
}

struct GpuProgram {
    pipeline: wgpu::RenderPipeline,
    binding: TextureBinding,
}

struct BuiltinPipelines {
    blockout: wgpu::RenderPipeline,
    unlit: wgpu::RenderPipeline,
    pbr: wgpu::RenderPipeline,
    skybox: wgpu::RenderPipeline,
    interface: wgpu::RenderPipeline,
    lines: wgpu::RenderPipeline,
}

/// How a pipeline treats depth and blending
#[derive(Clone, Copy, PartialEq, Eq)]
enum PipelineKind {
    Opaque,
    Skybox,
    Interface,
    Lines,
}

struct Layouts {
    uniform: wgpu::BindGroupLayout,
    texture2d: wgpu::BindGroupLayout,
    cube: wgpu::BindGroupLayout,
    pipeline2d: wgpu::PipelineLayout,
    pipeline_cube: wgpu::PipelineLayout,
    pipeline_lines: wgpu::PipelineLayout,
}

struct Frame {
    output: wgpu::SurfaceTexture,
    clear_color: [f32; 4],
    draws: Vec<DrawCall>,
    lines: Vec<LineVertex>,
    lines_view_projection: Mat4,
}

/// Window-backed graphics device
pub struct WgpuDevice {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    features: wgpu::Features,
    depth_view: wgpu::TextureView,
    layouts: Layouts,
    pipelines: BuiltinPipelines,
    sampler: wgpu::Sampler,
    default_textures: [GpuTexture; 3],
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniform_capacity: u64,
    next_handle: u32,
    meshes: HashMap<GpuHandle, GpuMesh>,
    textures: HashMap<GpuHandle, GpuTexture>,
    shaders: HashMap<GpuHandle, GpuShader>,
    programs: HashMap<GpuHandle, GpuProgram>,
    release_queue: ReleaseQueue<GpuResource>,
    frame: Option<Frame>,
}

impl WgpuDevice {
    /// Create a device rendering to `window`
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| DeviceError::Backend("no suitable GPU adapter".to_string()))?;

        info!("Using GPU: {}", adapter.get_info().name);

        let features = adapter.features()
            & (wgpu::Features::TEXTURE_COMPRESSION_ETC2 | wgpu::Features::TEXTURE_COMPRESSION_BC);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Main Device"),
                    required_features: features,
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| DeviceError::Backend("surface has no formats".to_string()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_view = create_depth_view(&device, config.width, config.height);
        let layouts = create_layouts(&device);
        let pipelines = create_builtin_pipelines(&device, &layouts, surface_format);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Texture Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        // color, flat normal, full occlusion with mid roughness and no metal
        let default_textures = [
            solid_texture(&device, &queue, [255, 255, 255, 255], "Default Color"),
            solid_texture(&device, &queue, [128, 128, 255, 255], "Default Normal"),
            solid_texture(&device, &queue, [255, 128, 0, 255], "Default Surface"),
        ];

        let uniform_capacity = 64;
        let (uniform_buffer, uniform_bind_group) =
            create_uniforms(&device, &layouts.uniform, uniform_capacity);

        info!(
            "Graphics device initialized with {}x{} resolution (etc2: {}, s3tc: {})",
            config.width,
            config.height,
            features.contains(wgpu::Features::TEXTURE_COMPRESSION_ETC2),
            features.contains(wgpu::Features::TEXTURE_COMPRESSION_BC)
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            features,
            depth_view,
            layouts,
            pipelines,
            sampler,
            default_textures,
            uniform_buffer,
            uniform_bind_group,
            uniform_capacity,
            next_handle: 1,
            meshes: HashMap::new(),
            textures: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            release_queue: ReleaseQueue::new(),
            frame: None,
        })
    }

    fn next_handle(&mut self) -> GpuHandle {
        let handle = GpuHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn texture_format(&self, image: &ImageData) -> Result<(wgpu::TextureFormat, u32, u32)> {
        let (format, block_bytes) = match (image.compression, image.channels) {
            (ImageCompression::None, _) => return Ok((wgpu::TextureFormat::Rgba8UnormSrgb, 1, 4)),
            (ImageCompression::Etc2, 3) => (wgpu::TextureFormat::Etc2Rgb8UnormSrgb, 8),
            (ImageCompression::Etc2, _) => (wgpu::TextureFormat::Etc2Rgba8UnormSrgb, 16),
            (ImageCompression::S3tc, 3) => (wgpu::TextureFormat::Bc1RgbaUnormSrgb, 8),
            (ImageCompression::S3tc, _) => (wgpu::TextureFormat::Bc3RgbaUnormSrgb, 16),
        };
        let feature = match image.compression {
            ImageCompression::Etc2 => wgpu::Features::TEXTURE_COMPRESSION_ETC2,
            _ => wgpu::Features::TEXTURE_COMPRESSION_BC,
        };
        if !self.features.contains(feature) {
            return Err(DeviceError::UnsupportedFormat(format!("{:?}", image.compression)).into());
        }
        if image.width % 4 != 0 || image.height % 4 != 0 {
            return Err(DeviceError::UnsupportedFormat(format!(
                "compressed image of {}x{} is not block aligned",
                image.width, image.height
            ))
            .into());
        }
        Ok((format, 4, block_bytes))
    }

    fn upload(&mut self, images: &[ImageData], cube: bool, label: &str) -> Result<GpuHandle> {
        let first = &images[0];
        let (format, block, block_bytes) = self.texture_format(first)?;
        let size = wgpu::Extent3d {
            width: first.width,
            height: first.height,
            depth_or_array_layers: images.len() as u32,
        };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (layer, image) in images.iter().enumerate() {
            let pixels = if image.is_compressed() {
                std::borrow::Cow::Borrowed(image.pixels.as_slice())
            } else {
                std::borrow::Cow::Owned(image.to_rgba())
            };
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: layer as u32,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                &pixels,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(image.width / block * block_bytes),
                    rows_per_image: Some(image.height / block),
                },
                wgpu::Extent3d {
                    width: image.width,
                    height: image.height,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(if cube {
                wgpu::TextureViewDimension::Cube
            } else {
                wgpu::TextureViewDimension::D2
            }),
            ..Default::default()
        });

        let handle = self.next_handle();
        self.textures.insert(handle, GpuTexture { texture, view, cube });
        Ok(handle)
    }

    fn ensure_uniform_capacity(&mut self, count: u64) {
        if count <= self.uniform_capacity {
            return;
        }
        let capacity = count.next_power_of_two();
        let (buffer, bind_group) = create_uniforms(&self.device, &self.layouts.uniform, capacity);
        self.uniform_buffer = buffer;
        self.uniform_bind_group = bind_group;
        self.uniform_capacity = capacity;
        debug!("Uniform buffer grown to {} draws", capacity);
    }

    fn pipeline_for(&self, shading: Shading) -> Option<(&wgpu::RenderPipeline, TextureBinding)> {
        let pipelines = &self.pipelines;
        match shading {
            Shading::Blockout => Some((&pipelines.blockout, TextureBinding::Texture2d)),
            Shading::Unlit => Some((&pipelines.unlit, TextureBinding::Texture2d)),
            Shading::Pbr => Some((&pipelines.pbr, TextureBinding::Texture2d)),
            Shading::Skybox => Some((&pipelines.skybox, TextureBinding::Cube)),
            Shading::Interface => Some((&pipelines.interface, TextureBinding::Texture2d)),
            Shading::Custom(handle) => self
                .programs
                .get(&handle)
                .map(|program| (&program.pipeline, program.binding)),
        }
    }

    fn texture_bind_group(&self, binding: TextureBinding, textures: &[GpuHandle]) -> Option<wgpu::BindGroup> {
        match binding {
            TextureBinding::Cube => {
                let cubemap = textures
                    .first()
                    .and_then(|handle| self.textures.get(handle))
                    .filter(|texture| texture.cube)?;
                Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Cubemap Bind Group"),
                    layout: &self.layouts.cube,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&cubemap.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                    ],
                }))
            }
            TextureBinding::Texture2d => {
                let view = |slot: usize| {
                    textures
                        .get(slot)
                        .and_then(|handle| self.textures.get(handle))
                        .filter(|texture| !texture.cube)
                        .map_or(&self.default_textures[slot].view, |texture| &texture.view)
                };
                Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Texture Bind Group"),
                    layout: &self.layouts.texture2d,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(view(0)),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(view(1)),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::TextureView(view(2)),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                    ],
                }))
            }
        }
    }
}

impl GraphicsDevice for WgpuDevice {
    fn supports_etc2(&self) -> bool {
        self.features.contains(wgpu::Features::TEXTURE_COMPRESSION_ETC2)
    }

    fn supports_s3tc(&self) -> bool {
        self.features.contains(wgpu::Features::TEXTURE_COMPRESSION_BC)
    }

    fn create_mesh(&mut self, geometry: &GeometryData) -> Result<GpuHandle> {
        geometry.validate()?;
        let vertices = Vertex::from_geometry(geometry);

        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Index Buffer"),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let handle = self.next_handle();
        self.meshes.insert(
            handle,
            GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: geometry.index_count() as u32,
            },
        );
        Ok(handle)
    }

    fn create_texture(&mut self, image: &ImageData) -> Result<GpuHandle> {
        image.validate()?;
        self.upload(std::slice::from_ref(image), false, "Texture")
    }

    fn create_cubemap(&mut self, faces: &CubemapFaces) -> Result<GpuHandle> {
        faces.validate()?;
        self.upload(&faces.faces, true, "Cubemap")
    }

    fn create_shader(&mut self, stage: ShaderStage, source: &ShaderData) -> Result<GpuHandle> {
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("User Shader"),
            source: wgpu::ShaderSource::Wgsl(source.text.as_str().into()),
        });
        let handle = self.next_handle();
        self.shaders.insert(handle, GpuShader { stage, module });
        Ok(handle)
    }

    /// Link a user program; vertex entry `vs_main`, fragment entry `fs_main`,
    /// with the same bind groups as the built-in mesh or skybox shaders
    fn create_program(
        &mut self,
        vertex: GpuHandle,
        fragment: GpuHandle,
        binding: TextureBinding,
    ) -> Result<GpuHandle> {
        let vs = self
            .shaders
            .get(&vertex)
            .filter(|shader| shader.stage == ShaderStage::Vertex)
            .ok_or(DeviceError::InvalidHandle(vertex.0))?;
        let fs = self
            .shaders
            .get(&fragment)
            .filter(|shader| shader.stage == ShaderStage::Fragment)
            .ok_or(DeviceError::InvalidHandle(fragment.0))?;

        let layout = match binding {
            TextureBinding::Texture2d => &self.layouts.pipeline2d,
            TextureBinding::Cube => &self.layouts.pipeline_cube,
        };
        let kind = match binding {
            TextureBinding::Texture2d => PipelineKind::Opaque,
            TextureBinding::Cube => PipelineKind::Skybox,
        };
        let pipeline = create_pipeline(
            &self.device,
            "User Pipeline",
            layout,
            (&vs.module, "vs_main"),
            (&fs.module, "fs_main"),
            self.config.format,
            kind,
        );

        let handle = self.next_handle();
        self.programs.insert(handle, GpuProgram { pipeline, binding });
        Ok(handle)
    }

    fn releaser(&self) -> Releaser<GpuResource> {
        self.release_queue.releaser()
    }

    fn collect_garbage(&mut self) -> usize {
        let mut freed = 0;
        for resource in self.release_queue.drain() {
            let removed = match resource {
                GpuResource::Mesh(h) => self.meshes.remove(&h).is_some(),
                GpuResource::Texture(h) | GpuResource::Cubemap(h) => match self.textures.remove(&h) {
                    Some(texture) => {
                        texture.texture.destroy();
                        true
                    }
                    None => false,
                },
                GpuResource::Shader(h) => self.shaders.remove(&h).is_some(),
                GpuResource::Program(h) => self.programs.remove(&h).is_some(),
            };
            if removed {
                freed += 1;
            } else {
                warn!("Release of unknown handle {:?}", resource);
            }
        }
        freed
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.depth_view = create_depth_view(&self.device, width, height);
            info!("Graphics device resized to {}x{}", width, height);
        }
    }

    fn begin_frame(&mut self, clear_color: [f32; 4]) -> Result<()> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                self.surface.get_current_texture()?
            }
            Err(e) => return Err(DeviceError::Backend(e.to_string()).into()),
        };
        self.frame = Some(Frame {
            output,
            clear_color,
            draws: Vec::new(),
            lines: Vec::new(),
            lines_view_projection: Mat4::IDENTITY,
        });
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall) {
        if let Some(frame) = &mut self.frame {
            frame.draws.push(call.clone());
        }
    }

    fn post_process(&mut self) {}

    fn draw_lines(&mut self, lines: &[DebugLine], view_projection: Mat4) {
        let Some(frame) = &mut self.frame else {
            return;
        };
        frame.lines_view_projection = view_projection;
        frame.lines.extend(lines.iter().flat_map(|line| {
            let color = line.color.to_array();
            [
                LineVertex {
                    position: line.from.to_array(),
                    color,
                },
                LineVertex {
                    position: line.to.to_array(),
                    color,
                },
            ]
        }));
    }

    fn end_frame(&mut self) -> Result<()> {
        let mut frame = self.frame.take().ok_or(DeviceError::NoFrame)?;
        frame.draws.sort_by_key(|call| match call.pass {
            DrawPass::Skybox => 0,
            DrawPass::Opaque => 1,
            DrawPass::Interface => 2,
        });

        // one slot per draw, plus one for the lines
        let mut uniforms: Vec<DrawUniform> = frame
            .draws
            .iter()
            .map(|call| DrawUniform::new(call.model, call.view_projection, call.color.to_array()))
            .collect();
        uniforms.push(DrawUniform::new(
            Mat4::IDENTITY,
            frame.lines_view_projection,
            [1.0; 4],
        ));
        self.ensure_uniform_capacity(uniforms.len() as u64);
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&uniforms));

        let mut prepared = Vec::with_capacity(frame.draws.len());
        for (slot, call) in frame.draws.iter().enumerate() {
            let Some(mesh) = self.meshes.get(&call.mesh) else {
                warn!("Draw with unknown mesh {:?}", call.mesh);
                continue;
            };
            let Some((pipeline, binding)) = self.pipeline_for(call.shading) else {
                warn!("Draw with unknown program {:?}", call.shading);
                continue;
            };
            let Some(textures) = self.texture_bind_group(binding, &call.textures) else {
                warn!("Draw without a cubemap for {:?}", call.shading);
                continue;
            };
            let index_count = call.index_count.min(mesh.index_count);
            prepared.push((pipeline, textures, mesh, (slot as u64 * UNIFORM_SIZE) as u32, index_count));
        }

        let line_buffer = (!frame.lines.is_empty()).then(|| {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Debug Line Buffer"),
                contents: bytemuck::cast_slice(&frame.lines),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });
        let line_offset = ((uniforms.len() as u64 - 1) * UNIFORM_SIZE) as u32;

        let view = frame
            .output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let [r, g, b, a] = frame.clear_color;
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Main Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for (pipeline, textures, mesh, offset, index_count) in &prepared {
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, &self.uniform_bind_group, &[*offset]);
                render_pass.set_bind_group(1, textures, &[]);
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..*index_count, 0, 0..1);
            }

            if let Some(buffer) = &line_buffer {
                render_pass.set_pipeline(&self.pipelines.lines);
                render_pass.set_bind_group(0, &self.uniform_bind_group, &[line_offset]);
                render_pass.set_vertex_buffer(0, buffer.slice(..));
                render_pass.draw(0..frame.lines.len() as u32, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.output.present();
        Ok(())
    }
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn solid_texture(device: &wgpu::Device, queue: &wgpu::Queue, color: [u8; 4], label: &str) -> GpuTexture {
    let size = wgpu::Extent3d {
        width: 1,
        height: 1,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &color,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture {
        texture,
        view,
        cube: false,
    }
}

fn create_uniforms(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    capacity: u64,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Draw Uniform Buffer"),
        size: capacity * UNIFORM_SIZE,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Draw Uniform Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: NonZeroU64::new(UNIFORM_SIZE),
            }),
        }],
    });
    (buffer, bind_group)
}

fn texture_entry(binding: u32, view_dimension: wgpu::TextureViewDimension) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn create_layouts(device: &wgpu::Device) -> Layouts {
    let uniform = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Draw Uniform Layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: NonZeroU64::new(UNIFORM_SIZE),
            },
            count: None,
        }],
    });

    let texture2d = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Texture Layout"),
        entries: &[
            texture_entry(0, wgpu::TextureViewDimension::D2),
            texture_entry(1, wgpu::TextureViewDimension::D2),
            texture_entry(2, wgpu::TextureViewDimension::D2),
            sampler_entry(3),
        ],
    });

    let cube = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Cubemap Layout"),
        entries: &[texture_entry(0, wgpu::TextureViewDimension::Cube), sampler_entry(1)],
    });

    let pipeline_layout = |label: &str, groups: &[&wgpu::BindGroupLayout]| {
        device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: groups,
            push_constant_ranges: &[],
        })
    };

    Layouts {
        pipeline2d: pipeline_layout("Mesh Pipeline Layout", &[&uniform, &texture2d]),
        pipeline_cube: pipeline_layout("Skybox Pipeline Layout", &[&uniform, &cube]),
        pipeline_lines: pipeline_layout("Line Pipeline Layout", &[&uniform]),
        uniform,
        texture2d,
        cube,
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    vertex: (&wgpu::ShaderModule, &str),
    fragment: (&wgpu::ShaderModule, &str),
    format: wgpu::TextureFormat,
    kind: PipelineKind,
) -> wgpu::RenderPipeline {
    let buffers = [if kind == PipelineKind::Lines {
        LineVertex::desc()
    } else {
        Vertex::desc()
    }];

    // every pass shares the depth attachment; interface and lines ignore it
    let depth_stencil = Some(wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: kind == PipelineKind::Opaque,
        depth_compare: match kind {
            PipelineKind::Opaque => wgpu::CompareFunction::Less,
            PipelineKind::Skybox => wgpu::CompareFunction::LessEqual,
            PipelineKind::Interface | PipelineKind::Lines => wgpu::CompareFunction::Always,
        },
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: vertex.0,
            entry_point: vertex.1,
            buffers: &buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: fragment.0,
            entry_point: fragment.1,
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: if kind == PipelineKind::Lines {
                wgpu::PrimitiveTopology::LineList
            } else {
                wgpu::PrimitiveTopology::TriangleList
            },
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: match kind {
                PipelineKind::Opaque => Some(wgpu::Face::Back),
                _ => None,
            },
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

fn create_builtin_pipelines(
    device: &wgpu::Device,
    layouts: &Layouts,
    format: wgpu::TextureFormat,
) -> BuiltinPipelines {
    let mesh = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Mesh Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
    });
    let skybox = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Skybox Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/skybox.wgsl").into()),
    });
    let lines = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Line Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/lines.wgsl").into()),
    });

    let mesh_pipeline = |label: &str, entry: &str, kind: PipelineKind| {
        create_pipeline(
            device,
            label,
            &layouts.pipeline2d,
            (&mesh, "vs_main"),
            (&mesh, entry),
            format,
            kind,
        )
    };

    BuiltinPipelines {
        blockout: mesh_pipeline("Blockout Pipeline", "fs_blockout", PipelineKind::Opaque),
        unlit: mesh_pipeline("Unlit Pipeline", "fs_unlit", PipelineKind::Opaque),
        pbr: mesh_pipeline("PBR Pipeline", "fs_pbr", PipelineKind::Opaque),
        interface: mesh_pipeline("Interface Pipeline", "fs_unlit", PipelineKind::Interface),
        skybox: create_pipeline(
            device,
            "Skybox Pipeline",
            &layouts.pipeline_cube,
            (&skybox, "vs_main"),
            (&skybox, "fs_main"),
            format,
            PipelineKind::Skybox,
        ),
        lines: create_pipeline(
            device,
            "Line Pipeline",
            &layouts.pipeline_lines,
            (&lines, "vs_main"),
            (&lines, "fs_main"),
            format,
            PipelineKind::Lines,
        ),
    }
}
