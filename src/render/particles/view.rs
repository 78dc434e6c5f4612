//! 粒子绘制
//!
//! 位置与颜色数组直接作为顶点属性读取，每个粒子一个点，包括尚未激活的粒子。

use super::commands::FrameCommands;
use super::error::ParticleResult;
use crate::render::program::Program;
use crate::render::uniforms::{UniformKey, UniformKind};
use glam::{Mat4, Vec2};
use tracing::debug;

/// 点渲染程序参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointUniform {
    Projection,
    View,
    Viewport,
    PointSize,
}

impl UniformKey for PointUniform {
    const BLOCK_SIZE: usize = 144;
    const ALL: &'static [Self] = &[Self::Projection, Self::View, Self::Viewport, Self::PointSize];

    fn name(self) -> &'static str {
        match self {
            Self::Projection => "projection",
            Self::View => "view",
            Self::Viewport => "viewport",
            Self::PointSize => "point_size",
        }
    }

    fn kind(self) -> UniformKind {
        match self {
            Self::Projection | Self::View => UniformKind::Mat4,
            Self::Viewport => UniformKind::Vec2,
            Self::PointSize => UniformKind::Float,
        }
    }

    fn offset(self) -> usize {
        match self {
            Self::Projection => 0,
            Self::View => 64,
            Self::Viewport => 128,
            Self::PointSize => 136,
        }
    }
}

/// 绘制输入
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewParams {
    /// 点的屏幕尺寸（像素）
    pub point_size: f32,
    pub projection: Mat4,
    pub view: Mat4,
    /// 视口尺寸（像素）
    pub viewport: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderView {
    particle_count: u32,
}

impl RenderView {
    pub fn new(particle_count: u32) -> Self {
        Self { particle_count }
    }

    pub fn particle_count(&self) -> u32 {
        self.particle_count
    }

    /// 把一次绘制记录到帧命令流
    ///
    /// 本帧必须已完成模拟步进，否则返回顺序错误且不记录任何命令。
    pub fn record(
        &self,
        program: &mut Program<PointUniform>,
        frame: &mut FrameCommands,
        params: ViewParams,
    ) -> ParticleResult<()> {
        frame.ensure_readable()?;

        if self.particle_count == 0 {
            debug!(target: "particles", "No particles, draw skipped");
            return Ok(());
        }
        if !program.activate(frame) {
            debug!(target: "particles", program = program.label(), "Point program unusable, draw skipped");
            return Ok(());
        }

        frame.bind_store_attributes()?;
        program.set_matrix4(PointUniform::Projection, params.projection)?;
        program.set_matrix4(PointUniform::View, params.view)?;
        program.set_vec2(PointUniform::Viewport, params.viewport)?;
        program.set_scalar(PointUniform::PointSize, params.point_size)?;
        program.publish(frame);
        frame.draw_points(self.particle_count)?;
        Ok(())
    }
}
