//! 粒子子系统错误类型

use super::layout::ParticleArray;
use crate::render::uniforms::UniformError;
use thiserror::Error;

/// 粒子存储与逐帧协议错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParticleError {
    #[error("Particle capacity {capacity} exceeds source vertex pool of {available} vertices")]
    CapacityExceedsSource { capacity: u32, available: usize },

    #[error("Particle capacity {capacity} exceeds device limit: {reason}")]
    CapacityExceedsDevice { capacity: u32, reason: String },

    #[error("Invalid seed range for {what}: {reason}")]
    InvalidSeedRange { what: &'static str, reason: String },

    #[error("Uniform error: {0}")]
    Uniform(#[from] UniformError),

    #[error("Frame order violation: {0}")]
    FrameOrder(#[from] FrameOrderError),
}

/// 单个缓冲区写映射失败
///
/// 该缓冲区保持分配时的初始内容（全零），执行继续。
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Failed to map {} for seeding", array.label())]
pub struct MappingFailed {
    pub array: ParticleArray,
}

/// 生产者（计算派发）/消费者（绘制）顺序错误
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOrderError {
    #[error("a simulation step was already recorded for this frame")]
    DuplicateStep,

    #[error("draw recorded before any simulation step in this frame")]
    MissingStep,

    #[error("draw would read particle storage written by a dispatch without a barrier")]
    UnsyncedRead,
}

pub type ParticleResult<T> = Result<T, ParticleError>;
