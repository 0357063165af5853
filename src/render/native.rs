use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::{bytes_of, Pod, Zeroable};
use glam::{Mat3, Mat4};
use log::debug;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use super::CameraParams;
use crate::mesh::{MeshData, Primitive};
use crate::scene::{Lighting, Material, PostProcessing, Scene};

/// GPU renderer backed by wgpu: a lit HDR scene pass followed by a
/// full-screen pass for the post-processing stack.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    targets: RenderTargets,
    scene_pipeline: wgpu::RenderPipeline,
    post_pipeline: wgpu::RenderPipeline,
    global_buffer: wgpu::Buffer,
    global_bind_group: wgpu::BindGroup,
    object_layout: wgpu::BindGroupLayout,
    post_layout: wgpu::BindGroupLayout,
    post_buffer: wgpu::Buffer,
    post_bind_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,
    mesh_cache: HashMap<String, MeshBuffers>,
    /// Uniform slots indexed by scene node, created on first draw.
    objects: Vec<Option<ObjectSlot>>,
    clear: wgpu::Color,
}

impl Renderer {
    /// Initializes the GPU renderer for the provided window.
    pub async fn new(window: Arc<Window>, lighting: &Lighting) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("renderer-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("surface reports no formats")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let targets = RenderTargets::create(&device, config.width, config.height);

        let scene_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene-shader"),
            source: wgpu::ShaderSource::Wgsl(SCENE_SHADER.into()),
        });
        let post_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("post-shader"),
            source: wgpu::ShaderSource::Wgsl(POST_SHADER.into()),
        });

        let global_layout =
            uniform_layout::<GlobalUniform>(&device, "global-bind-layout");
        // Per-object uniform layout
        let object_layout =
            uniform_layout::<ObjectConstants>(&device, "object-bind-layout");

        let post_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("post-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(std::mem::size_of::<PostUniform>() as u64),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let scene_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene-pipeline-layout"),
            bind_group_layouts: &[&global_layout, &object_layout],
            push_constant_ranges: &[],
        });
        let post_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("post-pipeline-layout"),
            bind_group_layouts: &[&post_layout],
            push_constant_ranges: &[],
        });

        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global-uniform"),
            size: std::mem::size_of::<GlobalUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global-bind-group"),
            layout: &global_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            }],
        });

        let post_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("post-uniform"),
            size: std::mem::size_of::<PostUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("post-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let post_bind_group =
            create_post_bind_group(&device, &post_layout, &post_buffer, &targets, &sampler);

        let scene_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("scene-pipeline"),
            layout: Some(&scene_layout),
            vertex: wgpu::VertexState {
                module: &scene_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: (6 * std::mem::size_of::<f32>()) as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 0,
                        },
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: (3 * std::mem::size_of::<f32>()) as u64,
                            shader_location: 1,
                        },
                    ],
                }],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: RenderTargets::DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &scene_shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: RenderTargets::HDR_FORMAT,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        let post_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("post-pipeline"),
            layout: Some(&post_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &post_shader,
                entry_point: Some("vs_fullscreen"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &post_shader,
                entry_point: Some("fs_post"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        let background = lighting.background;
        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            targets,
            scene_pipeline,
            post_pipeline,
            global_buffer,
            global_bind_group,
            object_layout,
            post_layout,
            post_buffer,
            post_bind_group,
            sampler,
            mesh_cache: HashMap::new(),
            objects: Vec::new(),
            clear: wgpu::Color {
                r: background.x as f64,
                g: background.y as f64,
                b: background.z as f64,
                a: 1.0,
            },
        })
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Exposes the inner window for event handling.
    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn aspect(&self) -> f32 {
        self.size.width as f32 / self.size.height.max(1) as f32
    }

    /// Resizes the swap chain and offscreen targets to match the window.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.targets = RenderTargets::create(&self.device, new_size.width, new_size.height);
        self.post_bind_group = create_post_bind_group(
            &self.device,
            &self.post_layout,
            &self.post_buffer,
            &self.targets,
            &self.sampler,
        );
    }

    /// Updates the camera, lighting and post-processing uniforms.
    pub fn update_globals(&self, camera: &CameraParams, scene: &Scene) {
        let uniform = GlobalUniform::new(camera, &scene.lighting);
        self.queue
            .write_buffer(&self.global_buffer, 0, bytes_of(&uniform));
        let post = PostUniform::new(&scene.post, camera, self.size.width, self.size.height);
        self.queue.write_buffer(&self.post_buffer, 0, bytes_of(&post));
    }

    /// Draws the scene graph and runs the post stack onto the surface.
    pub fn render(&mut self, scene: &Scene) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("renderer-encoder"),
            });

        // Opaque nodes first so translucent shadows and dust blend over them.
        let mut draw_list: Vec<(usize, String)> = Vec::new();
        let mut translucent = Vec::new();
        for (id, node, world) in scene.drawables() {
            let Some(mesh) = node.mesh else { continue };
            let key = self.ensure_mesh(&mesh);
            self.write_object(id.0, &ObjectConstants::new(world, &node.material));
            if node.material.opacity < 1.0 {
                translucent.push((id.0, key));
            } else {
                draw_list.push((id.0, key));
            }
        }
        draw_list.extend(translucent);

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.hdr_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.scene_pipeline);
            pass.set_bind_group(0, &self.global_bind_group, &[]);
            for (index, key) in &draw_list {
                let (Some(mesh), Some(Some(slot))) =
                    (self.mesh_cache.get(key), self.objects.get(*index))
                else {
                    continue;
                };
                pass.set_vertex_buffer(0, mesh.vertex.slice(..));
                pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
                pass.set_bind_group(1, &slot.bind_group, &[]);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("post-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.post_pipeline);
            pass.set_bind_group(0, &self.post_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn ensure_mesh(&mut self, primitive: &Primitive) -> String {
        let key = primitive.cache_key();
        if !self.mesh_cache.contains_key(&key) {
            debug!("uploading mesh {key}");
            let mesh = MeshBuffers::from_mesh(&self.device, &primitive.build(), &key);
            self.mesh_cache.insert(key.clone(), mesh);
        }
        key
    }

    fn write_object(&mut self, index: usize, constants: &ObjectConstants) {
        if self.objects.len() <= index {
            self.objects.resize_with(index + 1, || None);
        }
        match &self.objects[index] {
            Some(slot) => self.queue.write_buffer(&slot.buffer, 0, bytes_of(constants)),
            None => {
                let buffer = self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("object-uniform"),
                        contents: bytes_of(constants),
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    });
                let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    layout: &self.object_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                    label: Some("object-bind-group"),
                });
                self.objects[index] = Some(ObjectSlot { buffer, bind_group });
            }
        }
    }
}

fn uniform_layout<T>(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: NonZeroU64::new(std::mem::size_of::<T>() as u64),
            },
            count: None,
        }],
    })
}

fn create_post_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniform: &wgpu::Buffer,
    targets: &RenderTargets,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("post-bind-group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&targets.hdr_view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&targets.depth_view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

struct ObjectSlot {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn from_mesh(device: &wgpu::Device, mesh: &MeshData, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: mesh.indices.len() as u32,
        }
    }
}

/// Offscreen colour and depth the post pass samples from.
struct RenderTargets {
    _hdr: wgpu::Texture,
    hdr_view: wgpu::TextureView,
    _depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
}

impl RenderTargets {
    const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
    const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = |label: &str, format: wgpu::TextureFormat| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: width.max(1),
                    height: height.max(1),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        };
        let hdr = texture("hdr-texture", Self::HDR_FORMAT);
        let depth = texture("depth-texture", Self::DEPTH_FORMAT);
        Self {
            hdr_view: hdr.create_view(&wgpu::TextureViewDescriptor::default()),
            _hdr: hdr,
            depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            _depth: depth,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
struct GlobalUniform {
    view_proj: [[f32; 4]; 4],
    camera_position: [f32; 4],
    /// xyz towards the sun, w intensity.
    sun_direction: [f32; 4],
    sun_color: [f32; 4],
    /// rgb sky colour, a hemisphere intensity.
    sky_color: [f32; 4],
    ground_color: [f32; 4],
}

impl GlobalUniform {
    fn new(camera: &CameraParams, lighting: &Lighting) -> Self {
        let sun = lighting.sun.position.normalize_or_zero();
        Self {
            view_proj: camera.view_proj.to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).into(),
            sun_direction: sun.extend(lighting.sun.intensity).into(),
            sun_color: lighting.sun.color.extend(1.0).into(),
            sky_color: lighting
                .hemisphere
                .sky
                .extend(lighting.hemisphere.intensity)
                .into(),
            ground_color: lighting.hemisphere.ground.extend(1.0).into(),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
struct ObjectConstants {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 3],
    color: [f32; 4],
    /// rgb emissive, a unused.
    emissive: [f32; 4],
    /// x roughness, y metalness.
    surface: [f32; 4],
}

impl ObjectConstants {
    fn new(model: Mat4, material: &Material) -> Self {
        let normal = Mat3::from_mat4(model).inverse().transpose();
        Self {
            model: model.to_cols_array_2d(),
            normal: mat3_to_3x4(normal),
            color: material.color.extend(material.opacity).into(),
            emissive: material.emissive.extend(0.0).into(),
            surface: [material.roughness, material.metalness, 0.0, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
struct PostUniform {
    /// focus distance, focal length, bokeh scale, enabled.
    depth_of_field: [f32; 4],
    /// intensity, threshold, enabled, tone mapping enabled.
    bloom: [f32; 4],
    /// darkness, offset, enabled, unused.
    vignette: [f32; 4],
    /// near, far, texel width, texel height.
    frame: [f32; 4],
}

impl PostUniform {
    fn new(post: &PostProcessing, camera: &CameraParams, width: u32, height: u32) -> Self {
        let flag = |on: bool| if on { 1.0 } else { 0.0 };
        let dof = post.depth_of_field;
        let bloom = post.bloom;
        let vignette = post.vignette;
        Self {
            depth_of_field: [
                dof.map_or(0.0, |d| d.focus_distance),
                dof.map_or(0.0, |d| d.focal_length),
                dof.map_or(0.0, |d| d.bokeh_scale),
                flag(dof.is_some()),
            ],
            bloom: [
                bloom.map_or(0.0, |b| b.intensity),
                bloom.map_or(1.0, |b| b.luminance_threshold),
                flag(bloom.is_some()),
                flag(post.tone_mapping),
            ],
            vignette: [
                vignette.map_or(0.0, |v| v.darkness),
                vignette.map_or(0.0, |v| v.offset),
                flag(vignette.is_some()),
                0.0,
            ],
            frame: [
                camera.near,
                camera.far,
                1.0 / width.max(1) as f32,
                1.0 / height.max(1) as f32,
            ],
        }
    }
}

const SCENE_SHADER: &str = r#"
struct GlobalUniform {
    view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    sun_direction: vec4<f32>,
    sun_color: vec4<f32>,
    sky_color: vec4<f32>,
    ground_color: vec4<f32>,
}

struct ObjectConstants {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    color: vec4<f32>,
    emissive: vec4<f32>,
    surface: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: GlobalUniform;

@group(1) @binding(0)
var<uniform> object: ObjectConstants;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = object.model * vec4<f32>(input.position, 1.0);
    out.position = globals.view_proj * world_position;
    out.world_pos = world_position.xyz;

    let world_normal = mat3x3<f32>(
        object.normal[0].xyz,
        object.normal[1].xyz,
        object.normal[2].xyz
    ) * input.normal;

    out.normal = normalize(world_normal);
    return out;
}

@fragment
fn fs_main(input: VertexOutput, @builtin(front_facing) front: bool) -> @location(0) vec4<f32> {
    var normal = normalize(input.normal);
    if (!front) {
        normal = -normal;
    }
    let albedo = object.color.rgb;
    let roughness = clamp(object.surface.x, 0.04, 1.0);
    let metalness = object.surface.y;

    let hemi = mix(globals.ground_color.rgb, globals.sky_color.rgb, normal.y * 0.5 + 0.5)
        * globals.sky_color.w;

    let light_dir = normalize(globals.sun_direction.xyz);
    let view_dir = normalize(globals.camera_position.xyz - input.world_pos);
    let diffuse = max(dot(normal, light_dir), 0.0);
    let half_dir = normalize(light_dir + view_dir);
    let shininess = 2.0 / (roughness * roughness * roughness * roughness) - 2.0;
    let specular = pow(max(dot(normal, half_dir), 0.0), max(shininess, 1.0)) * (1.0 - roughness);
    let spec_color = mix(vec3<f32>(0.04), albedo, metalness);
    let sun = globals.sun_color.rgb * globals.sun_direction.w;

    let lit = albedo * (1.0 - metalness) * (hemi + sun * diffuse)
        + spec_color * sun * specular * diffuse
        + object.emissive.rgb;
    return vec4<f32>(lit, object.color.a);
}
"#;

const POST_SHADER: &str = r#"
struct PostUniform {
    depth_of_field: vec4<f32>,
    bloom: vec4<f32>,
    vignette: vec4<f32>,
    frame: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> post: PostUniform;
@group(0) @binding(1)
var hdr: texture_2d<f32>;
@group(0) @binding(2)
var depth: texture_depth_2d;
@group(0) @binding(3)
var hdr_sampler: sampler;

struct FullscreenOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> FullscreenOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: FullscreenOutput;
    out.position = vec4<f32>(uv * vec2<f32>(2.0, -2.0) + vec2<f32>(-1.0, 1.0), 0.0, 1.0);
    out.uv = uv;
    return out;
}

fn linear_depth(uv: vec2<f32>) -> f32 {
    let size = vec2<f32>(textureDimensions(depth));
    let texel = vec2<i32>(clamp(uv * size, vec2<f32>(0.0), size - 1.0));
    let d = textureLoad(depth, texel, 0);
    let near = post.frame.x;
    let far = post.frame.y;
    let z = near * far / (far - d * (far - near));
    return (z - near) / (far - near);
}

fn luminance(color: vec3<f32>) -> f32 {
    return dot(color, vec3<f32>(0.2126, 0.7152, 0.0722));
}

fn aces(color: vec3<f32>) -> vec3<f32> {
    let a = 2.51;
    let b = 0.03;
    let c = 2.43;
    let d = 0.59;
    let e = 0.14;
    return clamp((color * (a * color + b)) / (color * (c * color + d) + e), vec3<f32>(0.0), vec3<f32>(1.0));
}

@fragment
fn fs_post(input: FullscreenOutput) -> @location(0) vec4<f32> {
    let texel = post.frame.zw;
    var color = textureSampleLevel(hdr, hdr_sampler, input.uv, 0.0).rgb;

    // Depth of field: blur radius grows with distance from the focus plane.
    if (post.depth_of_field.w > 0.5) {
        let focus = post.depth_of_field.x;
        let range = max(post.depth_of_field.y, 1e-4);
        let coc = clamp(abs(linear_depth(input.uv) - focus) / range, 0.0, 1.0);
        let radius = coc * post.depth_of_field.z * 2.0;
        if (radius > 0.01) {
            var sum = color;
            var weight = 1.0;
            for (var i = 0; i < 12; i = i + 1) {
                let angle = f32(i) * 0.5235988;
                let offset = vec2<f32>(cos(angle), sin(angle)) * texel * radius * (1.0 + f32(i % 3));
                sum = sum + textureSampleLevel(hdr, hdr_sampler, input.uv + offset, 0.0).rgb;
                weight = weight + 1.0;
            }
            color = sum / weight;
        }
    }

    // Bloom: bright-pass over a small ring of taps.
    if (post.bloom.z > 0.5) {
        var glow = vec3<f32>(0.0);
        for (var i = 0; i < 16; i = i + 1) {
            let angle = f32(i) * 0.3926991;
            let ring = 4.0 + 4.0 * f32(i % 2);
            let tap = textureSampleLevel(hdr, hdr_sampler, input.uv + vec2<f32>(cos(angle), sin(angle)) * texel * ring, 0.0).rgb;
            glow = glow + tap * max(luminance(tap) - post.bloom.y, 0.0);
        }
        color = color + glow / 16.0 * post.bloom.x;
    }

    if (post.bloom.w > 0.5) {
        color = aces(color);
    }

    if (post.vignette.z > 0.5) {
        let d = distance(input.uv, vec2<f32>(0.5)) * (post.vignette.x + post.vignette.y);
        let t = clamp((d - 0.8) / (post.vignette.y * 0.799 - 0.8), 0.0, 1.0);
        color = color * t * t * (3.0 - 2.0 * t);
    }

    return vec4<f32>(color, 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{hex_color, Bloom, DepthOfField, Vignette};
    use glam::Vec3;

    fn camera() -> CameraParams {
        CameraParams {
            view_proj: Mat4::IDENTITY,
            position: Vec3::ZERO,
            near: 0.01,
            far: 50.0,
        }
    }

    #[test]
    fn uniforms_match_wgsl_alignment() {
        assert_eq!(std::mem::size_of::<GlobalUniform>() % 16, 0);
        assert_eq!(std::mem::size_of::<ObjectConstants>() % 16, 0);
        assert_eq!(std::mem::size_of::<PostUniform>(), 64);
    }

    #[test]
    fn object_constants_carry_material() {
        let material = Material::new(hex_color(0xd3322b), 0.5)
            .with_metalness(0.2)
            .with_opacity(0.35);
        let constants = ObjectConstants::new(Mat4::from_scale(Vec3::splat(2.0)), &material);
        assert_eq!(constants.color[3], 0.35);
        assert_eq!(constants.surface[..2], [0.5, 0.2]);
        // Uniform scale keeps normals parallel.
        assert!((constants.normal[0][0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn post_uniform_flags_follow_stack() {
        let stack = PostProcessing {
            tone_mapping: true,
            depth_of_field: Some(DepthOfField {
                focus_distance: 0.008,
                focal_length: 0.018,
                bokeh_scale: 2.2,
            }),
            bloom: Some(Bloom {
                intensity: 0.3,
                luminance_threshold: 0.6,
            }),
            vignette: None,
        };
        let uniform = PostUniform::new(&stack, &camera(), 800, 400);
        assert_eq!(uniform.depth_of_field, [0.008, 0.018, 2.2, 1.0]);
        assert_eq!(uniform.bloom, [0.3, 0.6, 1.0, 1.0]);
        assert_eq!(uniform.vignette[2], 0.0);
        assert_eq!(uniform.frame, [0.01, 50.0, 1.0 / 800.0, 1.0 / 400.0]);

        let framed = PostProcessing {
            vignette: Some(Vignette {
                darkness: 0.35,
                offset: 0.25,
            }),
            ..stack
        };
        assert_eq!(PostUniform::new(&framed, &camera(), 1, 1).vignette, [0.35, 0.25, 1.0, 0.0]);
    }

    #[test]
    fn global_uniform_points_at_sun() {
        let uniform = GlobalUniform::new(&camera(), &Lighting::default());
        let direction = Vec3::from_slice(&uniform.sun_direction[..3]);
        assert!((direction.length() - 1.0).abs() < 1e-5);
        assert_eq!(uniform.sun_direction[3], 1.0);
    }
}
