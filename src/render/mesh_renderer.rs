//! 网格光照渲染
//!
//! 引爆前的场景：模型以逐像素 Blinn-Phong 方向光绘制。每次点击后
//! `implosion_counter` 增加，顶点着色器把顶点向模型中心收拢一点。
//!
//! 每个网格绑定漫反射与高光两张贴图；缺失的贴图用 1x1 白色纹理占位，
//! 着色器依据 `has_diffuse_tex`/`has_specular_tex` 改用材质常量。

use crate::config::LightingConfig;
use crate::render::mesh::{GpuMesh, Vertex3D};
use crate::render::particles::FrameTargets;
use crate::render::program::{Program, ProgramSlot};
use crate::render::uniforms::{UniformError, UniformKey, UniformKind};
use crate::scene::{Material, MaterialTextures, Model};
use glam::{Mat4, Vec3};
use image::RgbaImage;
use tracing::{debug, info};

/// 每次点击向中心收拢的比例
pub const IMPLOSION_STEP: f32 = 0.04;
/// 收拢比例上限
pub const IMPLOSION_LIMIT: f32 = 0.5;

/// 网格程序参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshUniform {
    Model,
    View,
    Projection,
    CameraPos,
    ImplosionCounter,
    ModelCenter,
    Shininess,
    LightDirection,
    LightAmbient,
    LightDiffuse,
    LightSpecular,
    MaterialDiffuse,
    MaterialSpecular,
    MaterialAmbient,
    HasDiffuseTex,
    HasSpecularTex,
}

impl UniformKey for MeshUniform {
    const BLOCK_SIZE: usize = 352;
    const ALL: &'static [Self] = &[
        Self::Model,
        Self::View,
        Self::Projection,
        Self::CameraPos,
        Self::ImplosionCounter,
        Self::ModelCenter,
        Self::Shininess,
        Self::LightDirection,
        Self::LightAmbient,
        Self::LightDiffuse,
        Self::LightSpecular,
        Self::MaterialDiffuse,
        Self::MaterialSpecular,
        Self::MaterialAmbient,
        Self::HasDiffuseTex,
        Self::HasSpecularTex,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::View => "view",
            Self::Projection => "projection",
            Self::CameraPos => "camera_pos",
            Self::ImplosionCounter => "implosion_counter",
            Self::ModelCenter => "model_center",
            Self::Shininess => "shininess",
            Self::LightDirection => "light_direction",
            Self::LightAmbient => "light_ambient",
            Self::LightDiffuse => "light_diffuse",
            Self::LightSpecular => "light_specular",
            Self::MaterialDiffuse => "material_diffuse",
            Self::MaterialSpecular => "material_specular",
            Self::MaterialAmbient => "material_ambient",
            Self::HasDiffuseTex => "has_diffuse_tex",
            Self::HasSpecularTex => "has_specular_tex",
        }
    }

    fn kind(self) -> UniformKind {
        match self {
            Self::Model | Self::View | Self::Projection => UniformKind::Mat4,
            Self::ImplosionCounter => UniformKind::Int,
            Self::Shininess => UniformKind::Float,
            Self::HasDiffuseTex | Self::HasSpecularTex => UniformKind::Bool,
            _ => UniformKind::Vec3,
        }
    }

    fn offset(self) -> usize {
        match self {
            Self::Model => 0,
            Self::View => 64,
            Self::Projection => 128,
            Self::CameraPos => 192,
            Self::ImplosionCounter => 204,
            Self::ModelCenter => 208,
            Self::Shininess => 220,
            Self::LightDirection => 224,
            Self::LightAmbient => 240,
            Self::LightDiffuse => 256,
            Self::LightSpecular => 272,
            Self::MaterialDiffuse => 288,
            Self::MaterialSpecular => 304,
            Self::MaterialAmbient => 320,
            Self::HasDiffuseTex => 332,
            Self::HasSpecularTex => 336,
        }
    }
}

pub const MESH_SHADER: &str = r#"
struct SceneUniforms {
    model: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    camera_pos: vec3<f32>,
    implosion_counter: i32,
    model_center: vec3<f32>,
    shininess: f32,
    light_direction: vec3<f32>,
    light_ambient: vec3<f32>,
    light_diffuse: vec3<f32>,
    light_specular: vec3<f32>,
    material_diffuse: vec3<f32>,
    material_specular: vec3<f32>,
    material_ambient: vec3<f32>,
    has_diffuse_tex: u32,
    has_specular_tex: u32,
};

@group(0) @binding(0) var<uniform> scene: SceneUniforms;
@group(0) @binding(1) var diffuse_map: texture_2d<f32>;
@group(0) @binding(2) var specular_map: texture_2d<f32>;
@group(0) @binding(3) var material_sampler: sampler;

const IMPLOSION_STEP: f32 = 0.04;
const IMPLOSION_LIMIT: f32 = 0.5;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    let pull = min(f32(scene.implosion_counter) * IMPLOSION_STEP, IMPLOSION_LIMIT);
    let local = mix(in.position, scene.model_center, pull);
    let world = scene.model * vec4<f32>(local, 1.0);

    var out: VertexOutput;
    out.clip_position = scene.projection * scene.view * world;
    out.world_pos = world.xyz;
    out.normal = normalize((scene.model * vec4<f32>(in.normal, 0.0)).xyz);
    out.uv = in.uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let normal = normalize(in.normal);
    let light_dir = normalize(-scene.light_direction);
    let view_dir = normalize(scene.camera_pos - in.world_pos);
    let halfway = normalize(light_dir + view_dir);

    // 采样放在统一控制流中，再按标志选择
    let diffuse_sample = textureSample(diffuse_map, material_sampler, in.uv).rgb;
    let specular_sample = textureSample(specular_map, material_sampler, in.uv).rgb;
    let textured = scene.has_diffuse_tex != 0u;
    let ambient_color = select(scene.material_ambient, diffuse_sample, textured);
    let diffuse_color = select(scene.material_diffuse, diffuse_sample, textured);
    let specular_color = select(scene.material_specular, specular_sample, scene.has_specular_tex != 0u);

    let ambient = scene.light_ambient * ambient_color;
    let diffuse = scene.light_diffuse * max(dot(normal, light_dir), 0.0) * diffuse_color;
    let highlight = pow(max(dot(normal, halfway), 0.0), scene.shininess);
    let specular = scene.light_specular * highlight * specular_color;

    return vec4<f32>(ambient + diffuse + specular, 1.0);
}
"#;

/// 一帧的网格绘制输入
#[derive(Debug, Clone, Copy)]
pub struct MeshFrame<'a> {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_pos: Vec3,
    /// 已完成的点击次数
    pub implosion_counter: u32,
    pub model_center: Vec3,
    pub lighting: &'a LightingConfig,
}

struct MeshEntry {
    gpu: GpuMesh,
    material: Material,
    has_diffuse_tex: bool,
    has_specular_tex: bool,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// 写入一个网格的材质参数
fn apply_material(
    program: &mut Program<MeshUniform>,
    material: &Material,
    textures: (bool, bool),
) -> Result<(), UniformError> {
    let (has_diffuse_tex, has_specular_tex) = textures;
    program.set_vector3(MeshUniform::MaterialAmbient, material.ambient)?;
    program.set_vector3(MeshUniform::MaterialDiffuse, material.diffuse)?;
    program.set_vector3(MeshUniform::MaterialSpecular, material.specular)?;
    program.set_scalar(MeshUniform::Shininess, material.shininess)?;
    program.set_bool(MeshUniform::HasDiffuseTex, has_diffuse_tex)?;
    program.set_bool(MeshUniform::HasSpecularTex, has_specular_tex)
}

fn texture_layout_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// 上传 RGBA8 图片为单层纹理
fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    rgba: &RgbaImage,
    format: wgpu::TextureFormat,
) -> wgpu::TextureView {
    let (width, height) = rgba.dimensions();
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
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
        rgba.as_raw(),
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// 网格的两张贴图视图，缺失时使用占位纹理
struct MaterialViews {
    diffuse: Option<wgpu::TextureView>,
    specular: Option<wgpu::TextureView>,
}

impl MaterialViews {
    fn upload(device: &wgpu::Device, queue: &wgpu::Queue, textures: &MaterialTextures) -> Self {
        Self {
            diffuse: textures.diffuse.as_deref().map(|img| {
                upload_texture(
                    device,
                    queue,
                    "Mesh Diffuse Map",
                    img,
                    wgpu::TextureFormat::Rgba8UnormSrgb,
                )
            }),
            specular: textures.specular.as_deref().map(|img| {
                upload_texture(
                    device,
                    queue,
                    "Mesh Specular Map",
                    img,
                    wgpu::TextureFormat::Rgba8Unorm,
                )
            }),
        }
    }
}

/// 模型的光照渲染器
pub struct MeshRenderer {
    program: Program<MeshUniform>,
    pipeline: Option<wgpu::RenderPipeline>,
    meshes: Vec<MeshEntry>,
}

impl MeshRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        model: &Model,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        let mut program = Program::link("Mesh Lighting", ProgramSlot::Mesh, MESH_SHADER);

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Mesh Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(MeshUniform::BLOCK_SIZE as u64),
                    },
                    count: None,
                },
                texture_layout_entry(1),
                texture_layout_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Mesh Material Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let placeholder = upload_texture(
            device,
            queue,
            "Mesh Placeholder Map",
            &RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255])),
            wgpu::TextureFormat::Rgba8Unorm,
        );

        // 每个网格材质不同，各自持有一份 uniform 缓冲
        let meshes = model
            .meshes()
            .iter()
            .map(|mesh| {
                let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Mesh Uniform Buffer"),
                    size: MeshUniform::BLOCK_SIZE as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let views = MaterialViews::upload(device, queue, &mesh.textures);
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Mesh Bind Group"),
                    layout: &layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: uniform_buffer.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(
                                views.diffuse.as_ref().unwrap_or(&placeholder),
                            ),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::TextureView(
                                views.specular.as_ref().unwrap_or(&placeholder),
                            ),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: wgpu::BindingResource::Sampler(&sampler),
                        },
                    ],
                });
                MeshEntry {
                    gpu: GpuMesh::new(device, &mesh.vertices, &mesh.indices),
                    material: mesh.material,
                    has_diffuse_tex: views.diffuse.is_some(),
                    has_specular_tex: views.specular.is_some(),
                    uniform_buffer,
                    bind_group,
                }
            })
            .collect();

        let pipeline = if program.is_usable() {
            build_mesh_pipeline(device, &layout, color_format, depth_format, &mut program)
        } else {
            None
        };

        let textured = model
            .meshes()
            .iter()
            .filter(|m| m.textures.has_diffuse() || m.textures.has_specular())
            .count();
        info!(
            target: "render",
            model = model.name(),
            meshes = model.meshes().len(),
            textured,
            vertices = model.total_vertices(),
            "Mesh renderer ready"
        );

        Self {
            program,
            pipeline,
            meshes,
        }
    }

    pub fn program(&self) -> &Program<MeshUniform> {
        &self.program
    }

    /// 写入各网格参数并编码一个清屏后的渲染通道
    pub fn render(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        targets: FrameTargets<'_>,
        frame: MeshFrame<'_>,
    ) -> Result<(), UniformError> {
        self.program.set_matrix4(MeshUniform::Model, Mat4::IDENTITY)?;
        self.program.set_matrix4(MeshUniform::View, frame.view)?;
        self.program.set_matrix4(MeshUniform::Projection, frame.projection)?;
        self.program.set_vector3(MeshUniform::CameraPos, frame.camera_pos)?;
        self.program.set_int(
            MeshUniform::ImplosionCounter,
            i32::try_from(frame.implosion_counter).unwrap_or(i32::MAX),
        )?;
        self.program.set_vector3(MeshUniform::ModelCenter, frame.model_center)?;
        self.program
            .set_vector3(MeshUniform::LightDirection, frame.lighting.direction)?;
        self.program.set_vector3(MeshUniform::LightAmbient, frame.lighting.ambient)?;
        self.program.set_vector3(MeshUniform::LightDiffuse, frame.lighting.diffuse)?;
        self.program.set_vector3(MeshUniform::LightSpecular, frame.lighting.specular)?;

        for entry in &self.meshes {
            apply_material(
                &mut self.program,
                &entry.material,
                (entry.has_diffuse_tex, entry.has_specular_tex),
            )?;
            queue.write_buffer(&entry.uniform_buffer, 0, self.program.uniforms().as_bytes());
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Mesh Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: targets.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(targets.clear),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: targets.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let Some(pipeline) = self.pipeline.as_ref() else {
            debug!(target: "render", "Mesh pipeline unavailable, frame cleared only");
            return Ok(());
        };
        pass.set_pipeline(pipeline);
        for entry in &self.meshes {
            pass.set_bind_group(0, &entry.bind_group, &[]);
            pass.set_vertex_buffer(0, entry.gpu.vertex_buffer.slice(..));
            pass.set_index_buffer(entry.gpu.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..entry.gpu.index_count, 0, 0..1);
        }
        Ok(())
    }
}

fn build_mesh_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
    program: &mut Program<MeshUniform>,
) -> Option<wgpu::RenderPipeline> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Mesh Shader"),
        source: wgpu::ShaderSource::Wgsl(MESH_SHADER.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Mesh Pipeline Layout"),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Mesh Pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: "vs_main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[Vertex3D::desc()],
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: "fs_main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: depth_format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    });

    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => {
            program.mark_failed(err.to_string());
            None
        }
        None => Some(pipeline),
    }
}
