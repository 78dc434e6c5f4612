//! GPU 粒子模块
//!
//! 把网格顶点变成 GPU 常驻的粒子模拟：
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    Particle Subsystem                     │
//! ├──────────────────────────────────────────────────────────┤
//! │  1. ParticleStore (构造时一次)                             │
//! │     - 五个并行数组：position/direction/color/speed/active  │
//! │     - 限定作用域写映射初始化，之后 CPU 不再触碰             │
//! │                                                          │
//! │  2. SimulationStep (每帧一次)                             │
//! │     - 计算核，128 线程一组                                 │
//! │     - 派发后记录存储屏障                                   │
//! │                                                          │
//! │  3. RenderView (每帧一次，步进之后)                        │
//! │     - position/color 作为顶点属性                          │
//! │     - 每个粒子一个点                                       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! 每帧的工作先记录到 [`FrameCommands`]，再由 [`GpuParticleSystem`] 编码到 wgpu，
//! 或由 [`HostExecutor`] 在 CPU 上解释执行。
//!
//! ## 使用示例
//!
//! ```ignore
//! let mut system = GpuParticleSystem::new(&device, desc, &mut rng)?;
//!
//! // 每帧
//! system.update(StepParams { delta_time, model_center })?;
//! system.draw(ViewParams { point_size: 2.0, projection, view, viewport })?;
//! system.encode(&queue, &mut encoder, targets);
//! ```

pub mod commands;
pub mod error;
pub mod host;
pub mod layout;
pub mod memory;
pub mod seed;
pub mod shaders;
pub mod step;
pub mod store;
pub mod system;
pub mod view;

#[cfg(test)]
mod property_tests;

pub use commands::{FrameCommands, ParticleCommand};
pub use error::{FrameOrderError, MappingFailed, ParticleError, ParticleResult};
pub use host::{
    DispatchStats, ExplodeKernel, HostBuffer, HostExecutor, HostFrame, HostKernel, HostMemory,
    HostPoint, KernelArrays, KernelUniforms, GUARD_BYTES,
};
pub use layout::{workgroup_count, ParticleArray, WORKGROUP_SIZE};
pub use memory::{BufferSpec, DeviceMemory, WriteMapping};
pub use seed::SeedParams;
pub use step::{ComputeUniform, SimulationStep, StepParams};
pub use store::{ParticleSource, ParticleStore, SeedReport};
pub use system::{check_device_limits, FrameTargets, GpuParticleSystem, ParticleSystemDescriptor};
pub use view::{PointUniform, RenderView, ViewParams};
