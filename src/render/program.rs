//! 着色器程序对象
//!
//! `Program<K>` 包装一个已链接的 GPU 程序（计算核或顶点/片段对），并持有该程序的
//! 类型化 uniform 参数表。链接失败不会中止进程：程序被标记为不可用，
//! 之后的激活请求返回 `false`，调用方据此跳过派发或绘制。

use crate::render::particles::commands::{FrameCommands, ParticleCommand};
use crate::render::uniforms::{validate_layout, UniformBlock, UniformError, UniformKey};
use glam::{Mat4, Vec2, Vec3};
use tracing::error;

/// 程序在帧命令流中的槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramSlot {
    /// 粒子计算核
    Compute,
    /// 粒子点渲染程序
    Points,
    /// 网格光照程序
    Mesh,
}

/// 链接状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramStatus {
    Linked,
    Failed(String),
}

/// 已链接程序及其 uniform 参数表
#[derive(Debug, Clone)]
pub struct Program<K: UniformKey> {
    label: String,
    slot: ProgramSlot,
    uniforms: UniformBlock<K>,
    status: ProgramStatus,
}

impl<K: UniformKey> Program<K> {
    /// 链接程序
    ///
    /// 校验 uniform 布局，并确认每个成员名都在着色器源码中声明。
    /// 失败时记录错误日志并返回不可用的程序对象。
    pub fn link(label: impl Into<String>, slot: ProgramSlot, source: &str) -> Self {
        let label = label.into();
        let status = match check_interface::<K>(source) {
            Ok(()) => ProgramStatus::Linked,
            Err(e) => {
                error!(target: "render", program = %label, "Program link failed: {}", e);
                ProgramStatus::Failed(e.to_string())
            }
        };

        Self {
            label,
            slot,
            uniforms: UniformBlock::new(),
            status,
        }
    }

    /// 标记为不可用（例如设备报告了编译错误）
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        error!(target: "render", program = %self.label, "Program marked unusable: {}", reason);
        self.status = ProgramStatus::Failed(reason);
    }

    pub fn is_usable(&self) -> bool {
        self.status == ProgramStatus::Linked
    }

    pub fn status(&self) -> &ProgramStatus {
        &self.status
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn slot(&self) -> ProgramSlot {
        self.slot
    }

    /// 在帧命令流中激活本程序；不可用时不记录任何命令
    pub fn activate(&self, frame: &mut FrameCommands) -> bool {
        if !self.is_usable() {
            return false;
        }
        frame.push(ParticleCommand::UseProgram(self.slot));
        true
    }

    /// 把当前参数表快照发布到帧命令流
    pub fn publish(&self, frame: &mut FrameCommands) {
        frame.push(ParticleCommand::Publish {
            program: self.slot,
            bytes: self.uniforms.as_bytes().to_vec(),
        });
    }

    pub fn set_scalar(&mut self, key: K, value: f32) -> Result<(), UniformError> {
        self.uniforms.set_scalar(key, value)
    }

    pub fn set_int(&mut self, key: K, value: i32) -> Result<(), UniformError> {
        self.uniforms.set_int(key, value)
    }

    pub fn set_bool(&mut self, key: K, value: bool) -> Result<(), UniformError> {
        self.uniforms.set_bool(key, value)
    }

    pub fn set_vec2(&mut self, key: K, value: Vec2) -> Result<(), UniformError> {
        self.uniforms.set_vec2(key, value)
    }

    pub fn set_vector3(&mut self, key: K, value: Vec3) -> Result<(), UniformError> {
        self.uniforms.set_vector3(key, value)
    }

    pub fn set_matrix4(&mut self, key: K, value: Mat4) -> Result<(), UniformError> {
        self.uniforms.set_matrix4(key, value)
    }

    pub fn uniforms(&self) -> &UniformBlock<K> {
        &self.uniforms
    }
}

fn check_interface<K: UniformKey>(source: &str) -> Result<(), UniformError> {
    validate_layout::<K>()?;
    match K::ALL.iter().find(|key| !declares(source, key.name())) {
        Some(key) => Err(UniformError::UnknownName(key.name())),
        None => Ok(()),
    }
}

/// 源码中是否存在与 `name` 完全匹配的标识符
fn declares(source: &str, name: &str) -> bool {
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';
    source.match_indices(name).any(|(start, _)| {
        let before = source[..start].chars().next_back();
        let after = source[start + name.len()..].chars().next();
        !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
    })
}
