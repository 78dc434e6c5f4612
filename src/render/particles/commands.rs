//! 逐帧命令流
//!
//! 一帧内的粒子工作按顺序记录为命令列表，再由执行器（wgpu 编码器或 CPU 替身）
//! 在同一条有序流上执行。列表在记录时就检查生产者/消费者顺序：
//! 每帧至多一次模拟步进，绘制前必须完成步进且之后没有未屏障的派发。

use super::error::FrameOrderError;
use crate::render::program::ProgramSlot;

/// 单条粒子命令
#[derive(Debug, Clone, PartialEq)]
pub enum ParticleCommand {
    /// 激活程序
    UseProgram(ProgramSlot),
    /// 发布程序 uniform 快照
    Publish { program: ProgramSlot, bytes: Vec<u8> },
    /// 一维计算派发
    Dispatch { workgroups: u32 },
    /// 存储缓冲区可见性屏障
    StorageBarrier,
    /// 将粒子存储的位置/颜色数组绑定为顶点属性
    BindStoreAttributes,
    /// 绘制 `count` 个粒子
    DrawPoints { count: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    /// 本帧尚无派发
    Idle,
    /// 存在屏障之前的派发写入
    Pending,
    /// 派发结果已对后续读取可见
    Visible,
}

/// 一帧的粒子命令列表
#[derive(Debug, Clone)]
pub struct FrameCommands {
    commands: Vec<ParticleCommand>,
    sync: SyncState,
    steps: u32,
}

impl FrameCommands {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            sync: SyncState::Idle,
            steps: 0,
        }
    }

    pub(crate) fn push(&mut self, command: ParticleCommand) {
        self.commands.push(command);
    }

    /// 开始本帧唯一的一次模拟步进
    pub fn begin_step(&mut self) -> Result<(), FrameOrderError> {
        if self.steps > 0 {
            return Err(FrameOrderError::DuplicateStep);
        }
        self.steps = 1;
        self.sync = SyncState::Pending;
        Ok(())
    }

    /// 记录派发；零个工作组时不记录
    pub fn dispatch(&mut self, workgroups: u32) {
        self.sync = SyncState::Pending;
        if workgroups > 0 {
            self.push(ParticleCommand::Dispatch { workgroups });
        }
    }

    /// 记录存储屏障，之前的派发写入对之后的读取可见
    pub fn storage_barrier(&mut self) {
        self.push(ParticleCommand::StorageBarrier);
        self.sync = SyncState::Visible;
    }

    /// 检查当前是否允许读取粒子存储
    pub fn ensure_readable(&self) -> Result<(), FrameOrderError> {
        if self.steps == 0 {
            return Err(FrameOrderError::MissingStep);
        }
        if self.sync == SyncState::Pending {
            return Err(FrameOrderError::UnsyncedRead);
        }
        Ok(())
    }

    /// 绑定粒子存储顶点属性
    pub fn bind_store_attributes(&mut self) -> Result<(), FrameOrderError> {
        self.ensure_readable()?;
        self.push(ParticleCommand::BindStoreAttributes);
        Ok(())
    }

    /// 记录绘制；零个粒子时只做顺序检查
    pub fn draw_points(&mut self, count: u32) -> Result<(), FrameOrderError> {
        self.ensure_readable()?;
        if count > 0 {
            self.push(ParticleCommand::DrawPoints { count });
        }
        Ok(())
    }

    pub fn commands(&self) -> &[ParticleCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// 本帧记录的派发工作组数
    pub fn dispatched_workgroups(&self) -> impl Iterator<Item = u32> + '_ {
        self.commands.iter().filter_map(|c| match c {
            ParticleCommand::Dispatch { workgroups } => Some(*workgroups),
            _ => None,
        })
    }

    /// 以第一条屏障为界拆分为计算部分与渲染部分（屏障本身不包含在内）
    pub fn split_at_barrier(&self) -> (&[ParticleCommand], &[ParticleCommand]) {
        match self
            .commands
            .iter()
            .position(|c| *c == ParticleCommand::StorageBarrier)
        {
            Some(i) => (&self.commands[..i], &self.commands[i + 1..]),
            None => (&self.commands[..], &[]),
        }
    }

    /// 清空以复用于下一帧
    pub fn reset(&mut self) {
        self.commands.clear();
        self.sync = SyncState::Idle;
        self.steps = 0;
    }
}

impl Default for FrameCommands {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_step_rejected() {
        let mut frame = FrameCommands::new();
        frame.begin_step().unwrap();
        frame.dispatch(3);
        frame.storage_barrier();
        assert_eq!(frame.begin_step(), Err(FrameOrderError::DuplicateStep));
    }

    #[test]
    fn test_draw_requires_step() {
        let mut frame = FrameCommands::new();
        assert_eq!(frame.draw_points(10), Err(FrameOrderError::MissingStep));
    }

    #[test]
    fn test_draw_requires_barrier() {
        let mut frame = FrameCommands::new();
        frame.begin_step().unwrap();
        frame.dispatch(1);
        assert_eq!(frame.draw_points(10), Err(FrameOrderError::UnsyncedRead));

        frame.storage_barrier();
        assert!(frame.draw_points(10).is_ok());
    }

    #[test]
    fn test_zero_sized_work_is_not_recorded() {
        let mut frame = FrameCommands::new();
        frame.begin_step().unwrap();
        frame.dispatch(0);
        frame.storage_barrier();
        frame.draw_points(0).unwrap();
        assert_eq!(frame.commands(), &[ParticleCommand::StorageBarrier]);
        assert_eq!(frame.dispatched_workgroups().count(), 0);
    }

    #[test]
    fn test_split_at_barrier() {
        let mut frame = FrameCommands::new();
        frame.begin_step().unwrap();
        frame.dispatch(2);
        frame.storage_barrier();
        frame.bind_store_attributes().unwrap();
        frame.draw_points(200).unwrap();

        let (compute, render) = frame.split_at_barrier();
        assert_eq!(compute, &[ParticleCommand::Dispatch { workgroups: 2 }]);
        assert_eq!(
            render,
            &[
                ParticleCommand::BindStoreAttributes,
                ParticleCommand::DrawPoints { count: 200 }
            ]
        );
    }

    #[test]
    fn test_reset_allows_next_frame() {
        let mut frame = FrameCommands::new();
        frame.begin_step().unwrap();
        frame.storage_barrier();
        frame.reset();
        assert!(frame.is_empty());
        assert!(frame.begin_step().is_ok());
    }
}
