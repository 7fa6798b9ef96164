pub mod window_surface;

use crate::mesh::{MeshData, MeshVertex};
use crate::stage::Stage;
use anyhow::{Context, Result};
use glam::{Mat4, Vec2, Vec3};
use std::collections::HashSet;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const DRAW_UNIFORM_STRIDE: u64 = 256;
const SHADOW_BIAS: f32 = 0.002;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4],
    light_dir: [f32; 4],
    light_color: [f32; 4],
    hover_color: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ShadowUniform {
    light_view_proj: [[f32; 4]; 4],
    params: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct DrawData {
    model: [[f32; 4]; 4],
    tint: [f32; 4],
    overlay: [f32; 4],
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    texture: wgpu::Texture,
    texture_size: (u32, u32),
    bind_group: wgpu::BindGroup,
}

/// The shadow map and the bind group the mesh pass samples it with. Rebuilt
/// whenever the configured resolution changes.
struct ShadowTarget {
    map_view: wgpu::TextureView,
    sample_bind_group: wgpu::BindGroup,
    resolution: u32,
}

/// The stage's mesh pipeline: a depth-only shadow pass over the configured
/// casters, then opaque-to-translucent draws with a per-draw dynamic uniform,
/// lit by one directional light.
pub struct StageRenderer {
    pipeline: wgpu::RenderPipeline,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    draw_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    draw_buffer: wgpu::Buffer,
    draw_bind_group: wgpu::BindGroup,
    draw_capacity: u64,
    meshes: Vec<GpuMesh>,
    shadow_pipeline: wgpu::RenderPipeline,
    shadow_sample_layout: wgpu::BindGroupLayout,
    shadow_uniform: wgpu::Buffer,
    shadow_pass_bind_group: wgpu::BindGroup,
    shadow_sampler: wgpu::Sampler,
    shadow: Option<ShadowTarget>,
}

impl StageRenderer {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Stage Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("renderer/stage.wgsl").into()),
        });

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Globals Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<DrawData>() as u64),
                },
                count: None,
            }],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Mesh Texture Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let shadow_sample_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Sample Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Stage Pipeline Layout"),
            bind_group_layouts: &[&globals_layout, &draw_layout, &texture_layout, &shadow_sample_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Stage Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[MeshVertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Globals Buffer"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Globals Bind Group"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Mesh Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let draw_capacity = 64;
        let (draw_buffer, draw_bind_group) =
            Self::create_draw_buffer(device, &draw_layout, draw_capacity);

        let shadow_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shadow Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("renderer/shadow.wgsl").into()),
        });
        let shadow_pass_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Pass Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let shadow_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Pipeline Layout"),
            bind_group_layouts: &[&shadow_pass_layout, &draw_layout],
            push_constant_ranges: &[],
        });
        let shadow_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Shadow Pipeline"),
            layout: Some(&shadow_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shadow_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[MeshVertex::layout()],
            },
            fragment: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                // Several models carry mirrored scales, so no culling here
                // either.
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let shadow_uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shadow Uniform Buffer"),
            size: std::mem::size_of::<ShadowUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let shadow_pass_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow Pass Bind Group"),
            layout: &shadow_pass_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: shadow_uniform.as_entire_binding(),
            }],
        });
        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        Self {
            pipeline,
            globals_buffer,
            globals_bind_group,
            draw_layout,
            texture_layout,
            sampler,
            draw_buffer,
            draw_bind_group,
            draw_capacity,
            meshes: Vec::new(),
            shadow_pipeline,
            shadow_sample_layout,
            shadow_uniform,
            shadow_pass_bind_group,
            shadow_sampler,
            shadow: None,
        }
    }

    /// Lazily (re)builds the shadow map at the configured resolution.
    fn ensure_shadow_target(&mut self, device: &wgpu::Device, resolution: u32) {
        if self.shadow.as_ref().is_some_and(|target| target.resolution == resolution) {
            return;
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Shadow Map"),
            size: wgpu::Extent3d { width: resolution, height: resolution, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let map_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sample_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow Sample Bind Group"),
            layout: &self.shadow_sample_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.shadow_uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&map_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.shadow_sampler),
                },
            ],
        });
        self.shadow = Some(ShadowTarget { map_view, sample_bind_group, resolution });
    }

    fn create_draw_buffer(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        capacity: u64,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Draw Uniforms"),
            size: capacity * DRAW_UNIFORM_STRIDE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<DrawData>() as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    /// Uploads the whole mesh bank once the Loading phase is done. Safe to
    /// call again after a reload; everything is rebuilt.
    pub fn upload_meshes(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        meshes: &[MeshData],
    ) -> Result<()> {
        self.meshes.clear();
        for (index, mesh) in meshes.iter().enumerate() {
            let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("Mesh {index} Vertices")),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("Mesh {index} Indices")),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            let (texture, texture_size) = match &mesh.texture {
                Some(image) => (self.create_texture(device, queue, image)?, image.dimensions()),
                None => (self.create_white_texture(device, queue), (1, 1)),
            };
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("Mesh {index} Texture")),
                layout: &self.texture_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });
            self.meshes.push(GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: mesh.indices.len() as u32,
                texture,
                texture_size,
                bind_group,
            });
        }
        Ok(())
    }

    /// Re-uploads a dynamic texture (the sketch board repaints in place).
    pub fn update_texture(
        &mut self,
        queue: &wgpu::Queue,
        mesh_index: usize,
        image: &image::RgbaImage,
    ) -> Result<()> {
        let mesh = self
            .meshes
            .get(mesh_index)
            .with_context(|| format!("No GPU mesh at index {mesh_index}"))?;
        let (width, height) = image.dimensions();
        if (width, height) != mesh.texture_size {
            anyhow::bail!("Texture size changed for mesh {mesh_index}");
        }
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &mesh.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );
        Ok(())
    }

    fn create_texture(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &image::RgbaImage,
    ) -> Result<wgpu::Texture> {
        let (width, height) = image.dimensions();
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Mesh Texture"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );
        Ok(texture)
    }

    fn create_white_texture(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> wgpu::Texture {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("White Texture"),
            size: wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[255, 255, 255, 255],
            wgpu::TexelCopyBufferLayout { offset: 0, bytes_per_row: Some(4), rows_per_image: Some(1) },
            wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
        );
        texture
    }

    /// Encodes the mesh pass for the current frame. Draws are sorted far to
    /// near so the visibility fades blend correctly.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
        stage: &Stage,
        viewport: PhysicalSize<u32>,
    ) -> Result<()> {
        let palette = stage.theme.active();
        let eye = stage.camera.position();

        let mut draws: Vec<(f32, crate::scene_graph::NodeId, usize, DrawData)> = Vec::new();
        for id in stage.graph.ids() {
            let Some(node) = stage.graph.node(id) else { continue };
            let Some(mesh_index) = node.mesh else { continue };
            if node.rendered_visibility <= 0.003 || mesh_index >= self.meshes.len() {
                continue;
            }
            let world = stage.graph.world_matrix(id);
            let position = world.transform_point3(Vec3::ZERO);
            draws.push((
                eye.distance_squared(position),
                id,
                mesh_index,
                DrawData {
                    model: world.to_cols_array_2d(),
                    tint: [node.tint.x, node.tint.y, node.tint.z, node.rendered_visibility],
                    overlay: [node.overlay_alpha, 0.0, 0.0, 0.0],
                },
            ));
        }
        draws.sort_by(|a, b| b.0.total_cmp(&a.0));

        if draws.len() as u64 > self.draw_capacity {
            self.draw_capacity = (draws.len() as u64).next_power_of_two();
            let (buffer, bind_group) =
                Self::create_draw_buffer(device, &self.draw_layout, self.draw_capacity);
            self.draw_buffer = buffer;
            self.draw_bind_group = bind_group;
        }
        for (slot, (_, _, _, draw)) in draws.iter().enumerate() {
            queue.write_buffer(
                &self.draw_buffer,
                slot as u64 * DRAW_UNIFORM_STRIDE,
                bytemuck::bytes_of(draw),
            );
        }

        let lighting = stage.lighting;
        let globals = Globals {
            view_proj: stage.camera.view_projection(viewport).to_cols_array_2d(),
            light_dir: [lighting.direction.x, lighting.direction.y, lighting.direction.z, 0.0],
            light_color: [lighting.color.x, lighting.color.y, lighting.color.z, lighting.ambient],
            hover_color: [palette.hover.x, palette.hover.y, palette.hover.z, 0.0],
        };
        queue.write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));

        // Shadow pass over the configured casters. Lateral bounds track the
        // casters where they are this frame; the depth range was fixed at
        // Processed time.
        let shadows = &stage.shadows;
        let resolution = shadows.resolution.clamp(256, 4096);
        self.ensure_shadow_target(device, resolution);
        let caster_set: HashSet<_> = shadows.casters.iter().copied().collect();
        let caster_positions: Vec<Vec3> =
            shadows.casters.iter().map(|&id| stage.graph.world_position(id)).collect();
        let light_matrix =
            light_space_matrix(&caster_positions, lighting.direction, shadows.z_min, shadows.z_max);
        let spread = shadows.blur_kernel.max(1) as f32 / (8.0 * resolution as f32);
        let shadow_uniform = ShadowUniform {
            light_view_proj: light_matrix.to_cols_array_2d(),
            params: [shadows.strength.clamp(0.0, 1.0), spread, SHADOW_BIAS, 0.0],
        };
        queue.write_buffer(&self.shadow_uniform, 0, bytemuck::bytes_of(&shadow_uniform));

        let target = self.shadow.as_ref().context("Shadow target missing")?;
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.map_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.shadow_pipeline);
            pass.set_bind_group(0, &self.shadow_pass_bind_group, &[]);
            for (slot, (_, id, mesh_index, _)) in draws.iter().enumerate() {
                if !caster_set.contains(id) {
                    continue;
                }
                let mesh = &self.meshes[*mesh_index];
                pass.set_bind_group(
                    1,
                    &self.draw_bind_group,
                    &[(slot as u64 * DRAW_UNIFORM_STRIDE) as u32],
                );
                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        let background = palette.background;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Stage Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: background.x as f64,
                        g: background.y as f64,
                        b: background.z as f64,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.globals_bind_group, &[]);
        pass.set_bind_group(3, &target.sample_bind_group, &[]);
        for (slot, (_, _, mesh_index, _)) in draws.iter().enumerate() {
            let mesh = &self.meshes[*mesh_index];
            pass.set_bind_group(1, &self.draw_bind_group, &[(slot as u64 * DRAW_UNIFORM_STRIDE) as u32]);
            pass.set_bind_group(2, &mesh.bind_group, &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
        drop(pass);
        Ok(())
    }
}

/// Fits an orthographic light-space matrix around the shadow casters. Lateral
/// extents follow the casters where they currently are; the depth range comes
/// from the bounds measured along the light direction at configuration time.
pub fn light_space_matrix(positions: &[Vec3], light_dir: Vec3, z_min: f32, z_max: f32) -> Mat4 {
    let dir = {
        let dir = light_dir.normalize_or_zero();
        if dir.length_squared() < 0.5 { Vec3::NEG_Y } else { dir }
    };
    let mut up = Vec3::Y;
    if up.dot(dir).abs() > 0.95 {
        up = Vec3::X;
    }
    let mut center = Vec3::ZERO;
    for position in positions {
        center += *position;
    }
    if !positions.is_empty() {
        center /= positions.len() as f32;
    }
    let span = (z_max - z_min).max(1.0);
    let eye = center - dir * span;
    let view = Mat4::look_at_rh(eye, center, up);

    let mut min = Vec2::splat(-1.0);
    let mut max = Vec2::splat(1.0);
    for (index, position) in positions.iter().enumerate() {
        let local = view.transform_point3(*position).truncate();
        if index == 0 {
            min = local;
            max = local;
        } else {
            min = min.min(local);
            max = max.max(local);
        }
    }

    const PAD: f32 = 1.0;
    // Distance from the eye along the light direction, shifting the measured
    // depth bounds into view space.
    let depth_shift = span - center.dot(dir);
    let near = (z_min + depth_shift - PAD).max(0.01);
    let far = z_max + depth_shift + PAD;
    Mat4::orthographic_rh(min.x - PAD, max.x + PAD, min.y - PAD, max.y + PAD, near, far) * view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::testing::StubSource;
    use crate::config::{ShadowConfig, StageConfig};
    use crate::content::StageContent;
    use crate::theme::ThemeState;

    fn ndc_of(matrix: Mat4, point: Vec3) -> Vec3 {
        let clip = matrix * point.extend(1.0);
        clip.truncate() / clip.w
    }

    #[test]
    fn light_matrix_contains_every_caster() {
        let positions = vec![
            Vec3::new(-3.0, 0.0, 1.0),
            Vec3::new(2.0, 4.0, -2.0),
            Vec3::new(0.5, 1.0, 3.0),
        ];
        let dir = Vec3::new(-0.4, -1.0, -0.3).normalize();
        let depths: Vec<f32> = positions.iter().map(|p| p.dot(dir)).collect();
        let z_min = depths.iter().copied().fold(f32::MAX, f32::min);
        let z_max = depths.iter().copied().fold(f32::MIN, f32::max);

        let matrix = light_space_matrix(&positions, dir, z_min, z_max);
        for position in &positions {
            let ndc = ndc_of(matrix, *position);
            assert!(ndc.x.abs() < 1.0 && ndc.y.abs() < 1.0, "lateral fit missed {ndc:?}");
            assert!(ndc.z > 0.0 && ndc.z < 1.0, "depth fit missed {ndc:?}");
        }
    }

    #[test]
    fn vertical_light_and_empty_caster_list_stay_finite() {
        let matrix = light_space_matrix(&[], Vec3::NEG_Y, 0.0, 1.0);
        assert!(matrix.is_finite());
        let matrix = light_space_matrix(&[Vec3::ONE], Vec3::NEG_Y, -1.0, -1.0);
        assert!(matrix.is_finite());
    }

    #[test]
    fn configured_casters_project_into_the_shadow_map() {
        let mut stage = Stage::new(
            StageContent::builtin(),
            StageConfig::default(),
            ShadowConfig::default(),
            ThemeState::default(),
            Box::new(StubSource::new()),
        );
        stage.build_scene().unwrap();
        stage.setup_lighting().unwrap();
        stage.load_assets().unwrap();
        stage.process_assets().unwrap();
        stage.configure_shadows().unwrap();
        assert!(!stage.shadows.casters.is_empty());

        let positions: Vec<Vec3> =
            stage.shadows.casters.iter().map(|&id| stage.graph.world_position(id)).collect();
        let matrix = light_space_matrix(
            &positions,
            stage.lighting.direction,
            stage.shadows.z_min,
            stage.shadows.z_max,
        );
        for position in &positions {
            let ndc = ndc_of(matrix, *position);
            assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0);
            assert!(ndc.z >= 0.0 && ndc.z <= 1.0);
        }
    }
}
