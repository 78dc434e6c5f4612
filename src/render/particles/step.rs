//! 模拟步进
//!
//! 每帧一次：激活计算核，发布 `delta_time` 与 `model_center`，按 128 线程一组
//! 派发覆盖全部粒子，最后记录存储屏障。

use super::commands::FrameCommands;
use super::error::ParticleResult;
use super::layout::workgroup_count;
use crate::render::program::Program;
use crate::render::uniforms::{UniformKey, UniformKind};
use glam::Vec3;
use tracing::debug;

/// 计算核参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeUniform {
    ModelCenter,
    DeltaTime,
}

impl UniformKey for ComputeUniform {
    const BLOCK_SIZE: usize = 16;
    const ALL: &'static [Self] = &[Self::ModelCenter, Self::DeltaTime];

    fn name(self) -> &'static str {
        match self {
            Self::ModelCenter => "model_center",
            Self::DeltaTime => "delta_time",
        }
    }

    fn kind(self) -> UniformKind {
        match self {
            Self::ModelCenter => UniformKind::Vec3,
            Self::DeltaTime => UniformKind::Float,
        }
    }

    fn offset(self) -> usize {
        match self {
            Self::ModelCenter => 0,
            Self::DeltaTime => 12,
        }
    }
}

/// 单步输入
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepParams {
    /// 距上一步的秒数；负值不做校验，直接交给计算核
    pub delta_time: f32,
    pub model_center: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationStep {
    particle_count: u32,
}

impl SimulationStep {
    pub fn new(particle_count: u32) -> Self {
        Self { particle_count }
    }

    pub fn particle_count(&self) -> u32 {
        self.particle_count
    }

    pub fn workgroups(&self) -> u32 {
        workgroup_count(self.particle_count)
    }

    /// 把一次步进记录到帧命令流
    pub fn record(
        &self,
        program: &mut Program<ComputeUniform>,
        frame: &mut FrameCommands,
        params: StepParams,
    ) -> ParticleResult<()> {
        frame.begin_step()?;

        if self.particle_count == 0 {
            debug!(target: "particles", "No particles, dispatch skipped");
        } else if program.activate(frame) {
            program.set_scalar(ComputeUniform::DeltaTime, params.delta_time)?;
            program.set_vector3(ComputeUniform::ModelCenter, params.model_center)?;
            program.publish(frame);
            frame.dispatch(self.workgroups());
        } else {
            debug!(target: "particles", program = program.label(), "Compute program unusable, dispatch skipped");
        }

        frame.storage_barrier();
        Ok(())
    }
}
