//! wgpu 粒子系统
//!
//! 持有粒子存储、计算与点渲染两个程序及其管线，把逐帧命令流编码到一个
//! `wgpu::CommandEncoder` 中：计算通道、通道边界（即存储屏障）、渲染通道，
//! 三者在同一条有序队列上提交。

use super::commands::{FrameCommands, ParticleCommand};
use super::error::{ParticleError, ParticleResult};
use super::layout::{workgroup_count, ParticleArray, STEP_UNIFORM_BINDING, VIEW_UNIFORM_BINDING};
use super::seed::SeedParams;
use super::shaders::{EXPLODE_COMPUTE_SHADER, POINT_SHADER, QUAD_VERTICES};
use super::step::{ComputeUniform, SimulationStep, StepParams};
use super::store::{ParticleSource, ParticleStore};
use super::view::{PointUniform, RenderView, ViewParams};
use crate::render::program::{Program, ProgramSlot};
use crate::render::uniforms::UniformKey;
use rand::Rng;
use tracing::{debug, info};

const POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x4];
const COLOR_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x4];

/// 渲染目标
pub struct FrameTargets<'a> {
    pub color: &'a wgpu::TextureView,
    pub depth: &'a wgpu::TextureView,
    pub clear: wgpu::Color,
}

/// 粒子系统创建参数
pub struct ParticleSystemDescriptor<'a> {
    pub source: ParticleSource<'a>,
    pub capacity: u32,
    pub seed: &'a SeedParams,
    pub color_format: wgpu::TextureFormat,
    pub depth_format: wgpu::TextureFormat,
}

/// 检查粒子容量是否在设备限制之内
pub fn check_device_limits(limits: &wgpu::Limits, capacity: u32) -> ParticleResult<()> {
    let workgroups = workgroup_count(capacity);
    if workgroups > limits.max_compute_workgroups_per_dimension {
        return Err(ParticleError::CapacityExceedsDevice {
            capacity,
            reason: format!(
                "{} workgroups exceed the per-dimension limit of {}",
                workgroups, limits.max_compute_workgroups_per_dimension
            ),
        });
    }

    for array in ParticleArray::ALL {
        let size = array.byte_size(capacity);
        let limit = u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);
        if size > limit {
            return Err(ParticleError::CapacityExceedsDevice {
                capacity,
                reason: format!("{} needs {} bytes, limit is {}", array.label(), size, limit),
            });
        }
    }
    Ok(())
}

/// GPU 常驻粒子系统
pub struct GpuParticleSystem {
    store: ParticleStore<wgpu::Buffer>,
    step: SimulationStep,
    view: RenderView,
    compute_program: Program<ComputeUniform>,
    point_program: Program<PointUniform>,
    compute_uniform_buffer: wgpu::Buffer,
    point_uniform_buffer: wgpu::Buffer,
    compute_pipeline: Option<wgpu::ComputePipeline>,
    compute_bind_group: Option<wgpu::BindGroup>,
    render_pipeline: Option<wgpu::RenderPipeline>,
    point_bind_group: wgpu::BindGroup,
    frame: FrameCommands,
}

impl GpuParticleSystem {
    /// 创建粒子系统并初始化粒子存储
    pub fn new<R: Rng + ?Sized>(
        device: &wgpu::Device,
        desc: ParticleSystemDescriptor<'_>,
        rng: &mut R,
    ) -> ParticleResult<Self> {
        check_device_limits(&device.limits(), desc.capacity)?;
        let store = ParticleStore::new(device, desc.source, desc.capacity, desc.seed, rng)?;

        let mut compute_program =
            Program::link("Particle Explode Kernel", ProgramSlot::Compute, EXPLODE_COMPUTE_SHADER);
        let mut point_program = Program::link("Particle Points", ProgramSlot::Points, POINT_SHADER);

        let compute_uniform_buffer = uniform_buffer::<ComputeUniform>(device, "Particle Step Uniforms");
        let point_uniform_buffer = uniform_buffer::<PointUniform>(device, "Particle View Uniforms");

        // 计算管线
        let compute_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Compute Bind Group Layout"),
            entries: &compute_layout_entries(),
        });
        let compute_pipeline = if compute_program.is_usable() {
            build_compute_pipeline(device, &compute_layout, &mut compute_program)
        } else {
            None
        };
        let compute_bind_group = (!store.is_empty()).then(|| {
            let mut entries = vec![wgpu::BindGroupEntry {
                binding: STEP_UNIFORM_BINDING,
                resource: compute_uniform_buffer.as_entire_binding(),
            }];
            entries.extend(store.bindings().map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding,
                resource: buffer.as_entire_binding(),
            }));
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Particle Compute Bind Group"),
                layout: &compute_layout,
                entries: &entries,
            })
        });

        // 点渲染管线
        let point_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle View Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: VIEW_UNIFORM_BINDING,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(PointUniform::BLOCK_SIZE as u64),
                },
                count: None,
            }],
        });
        let point_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle View Bind Group"),
            layout: &point_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: VIEW_UNIFORM_BINDING,
                resource: point_uniform_buffer.as_entire_binding(),
            }],
        });
        let render_pipeline = if point_program.is_usable() {
            build_point_pipeline(device, &point_layout, &desc, &mut point_program)
        } else {
            None
        };

        info!(
            target: "particles",
            capacity = desc.capacity,
            compute = compute_pipeline.is_some(),
            render = render_pipeline.is_some(),
            "GPU particle system ready"
        );

        Ok(Self {
            step: SimulationStep::new(store.capacity()),
            view: RenderView::new(store.capacity()),
            store,
            compute_program,
            point_program,
            compute_uniform_buffer,
            point_uniform_buffer,
            compute_pipeline,
            compute_bind_group,
            render_pipeline,
            point_bind_group,
            frame: FrameCommands::new(),
        })
    }

    pub fn store(&self) -> &ParticleStore<wgpu::Buffer> {
        &self.store
    }

    pub fn capacity(&self) -> u32 {
        self.store.capacity()
    }

    /// 记录本帧模拟步进
    pub fn update(&mut self, params: StepParams) -> ParticleResult<()> {
        self.step.record(&mut self.compute_program, &mut self.frame, params)
    }

    /// 记录本帧绘制
    pub fn draw(&mut self, params: ViewParams) -> ParticleResult<()> {
        self.view.record(&mut self.point_program, &mut self.frame, params)
    }

    /// 本帧已记录的命令
    pub fn pending_commands(&self) -> &FrameCommands {
        &self.frame
    }

    /// 把本帧命令编码到 `encoder`，并清空命令流
    ///
    /// 没有绘制命令时渲染通道只执行清屏。
    pub fn encode(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        targets: FrameTargets<'_>,
    ) {
        let frame = std::mem::take(&mut self.frame);
        let (compute, render) = frame.split_at_barrier();

        for command in frame.commands() {
            if let ParticleCommand::Publish { program, bytes } = command {
                match program {
                    ProgramSlot::Compute => queue.write_buffer(&self.compute_uniform_buffer, 0, bytes),
                    ProgramSlot::Points => queue.write_buffer(&self.point_uniform_buffer, 0, bytes),
                    ProgramSlot::Mesh => {}
                }
            }
        }

        let dispatches: Vec<u32> = compute
            .iter()
            .filter_map(|c| match c {
                ParticleCommand::Dispatch { workgroups } => Some(*workgroups),
                _ => None,
            })
            .collect();
        if let (false, Some(pipeline), Some(bind_group)) = (
            dispatches.is_empty(),
            self.compute_pipeline.as_ref(),
            self.compute_bind_group.as_ref(),
        ) {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Particle Step Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            for workgroups in dispatches {
                pass.dispatch_workgroups(workgroups, 1, 1);
            }
        }
        // 计算通道在此结束，之后的渲染通道能看到全部存储写入

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Particle Render Pass"),
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

        for command in render {
            let ParticleCommand::DrawPoints { count } = command else {
                continue;
            };
            let (Some(pipeline), Some(positions), Some(colors)) = (
                self.render_pipeline.as_ref(),
                self.store.buffer(ParticleArray::Position),
                self.store.buffer(ParticleArray::Color),
            ) else {
                debug!(target: "particles", "Render pipeline unavailable, draw skipped");
                continue;
            };
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.point_bind_group, &[]);
            pass.set_vertex_buffer(0, positions.slice(..));
            pass.set_vertex_buffer(1, colors.slice(..));
            pass.draw(0..QUAD_VERTICES, 0..*count);
        }
        drop(pass);

        self.frame = frame;
        self.frame.reset();
    }
}

fn uniform_buffer<K: UniformKey>(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: K::BLOCK_SIZE as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn compute_layout_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = vec![wgpu::BindGroupLayoutEntry {
        binding: STEP_UNIFORM_BINDING,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(ComputeUniform::BLOCK_SIZE as u64),
        },
        count: None,
    }];
    entries.extend(ParticleArray::ALL.iter().map(|array| wgpu::BindGroupLayoutEntry {
        binding: array.binding(),
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }));
    entries
}

fn build_compute_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    program: &mut Program<ComputeUniform>,
) -> Option<wgpu::ComputePipeline> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Particle Explode Shader"),
        source: wgpu::ShaderSource::Wgsl(EXPLODE_COMPUTE_SHADER.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Particle Compute Pipeline Layout"),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some("Particle Compute Pipeline"),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: "cs_main",
        compilation_options: wgpu::PipelineCompilationOptions::default(),
    });

    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => {
            program.mark_failed(err.to_string());
            None
        }
        None => Some(pipeline),
    }
}

fn build_point_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    desc: &ParticleSystemDescriptor<'_>,
    program: &mut Program<PointUniform>,
) -> Option<wgpu::RenderPipeline> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Particle Point Shader"),
        source: wgpu::ShaderSource::Wgsl(POINT_SHADER.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Particle Render Pipeline Layout"),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Particle Render Pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: "vs_main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[
                wgpu::VertexBufferLayout {
                    array_stride: ParticleArray::Position.element_size(),
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &POSITION_ATTRIBUTES,
                },
                wgpu::VertexBufferLayout {
                    array_stride: ParticleArray::Color.element_size(),
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &COLOR_ATTRIBUTES,
                },
            ],
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: "fs_main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: desc.color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: desc.depth_format,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_accept_typical_mesh() {
        assert!(check_device_limits(&wgpu::Limits::default(), 500_000).is_ok());
        assert!(check_device_limits(&wgpu::Limits::default(), 0).is_ok());
    }

    #[test]
    fn test_workgroup_limit_enforced() {
        let limits = wgpu::Limits {
            max_compute_workgroups_per_dimension: 2,
            ..wgpu::Limits::default()
        };
        assert!(check_device_limits(&limits, 256).is_ok());
        assert!(matches!(
            check_device_limits(&limits, 257),
            Err(ParticleError::CapacityExceedsDevice { capacity: 257, .. })
        ));
    }

    #[test]
    fn test_storage_binding_limit_enforced() {
        let limits = wgpu::Limits {
            max_storage_buffer_binding_size: 1024,
            ..wgpu::Limits::default()
        };
        assert!(check_device_limits(&limits, 64).is_ok());
        assert!(check_device_limits(&limits, 65).is_err());
    }

    #[test]
    fn test_compute_layout_covers_store_bindings() {
        let bindings: Vec<u32> = compute_layout_entries().iter().map(|e| e.binding).collect();
        assert_eq!(bindings, vec![0, 4, 5, 6, 7, 8]);
    }
}
