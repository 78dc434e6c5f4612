//! CPU 侧粒子替身
//!
//! `HostMemory` 在主存中模拟设备缓冲区（每个数组后面跟一段哨兵保护区），
//! `HostExecutor` 按顺序解释帧命令流，用与 WGSL 计算核一致的参考核推进粒子，
//! 并在绘制命令处截取一帧可见数据。派发结果在屏障之前不可见。

use super::commands::{FrameCommands, ParticleCommand};
use super::layout::{ParticleArray, WORKGROUP_SIZE};
use super::memory::{BufferSpec, DeviceMemory, WriteMapping};
use super::shaders::RADIAL_PUSH;
use super::step::ComputeUniform;
use super::store::ParticleStore;
use super::view::PointUniform;
use crate::render::program::ProgramSlot;
use crate::render::uniforms::UniformBlock;
use glam::{Mat4, Vec2, Vec3};
use std::cell::{Cell, RefCell, RefMut};
use tracing::warn;

/// 每个数组之后的保护区字节数，足以容纳最后一个工作组的全部越界索引
pub const GUARD_BYTES: usize = WORKGROUP_SIZE as usize * 16;

const GUARD_WORD: u32 = 0xDEAD_BEEF;

/// 主存中的设备内存替身
#[derive(Debug, Default)]
pub struct HostMemory {
    failing: Vec<&'static str>,
}

impl HostMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 对指定数组的写映射返回空视图
    pub fn failing_on(arrays: &[ParticleArray]) -> Self {
        Self {
            failing: arrays.iter().map(|a| a.label()).collect(),
        }
    }
}

/// 主存缓冲区
#[derive(Debug)]
pub struct HostBuffer {
    label: &'static str,
    len: usize,
    words: RefCell<Vec<u32>>,
    mapped: Cell<bool>,
    releases: Cell<u32>,
    refuse_mapping: bool,
}

impl HostBuffer {
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// 逻辑字节数（不含保护区）
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped.get()
    }

    pub fn release_count(&self) -> u32 {
        self.releases.get()
    }

    /// 读取逻辑区域
    pub fn read<T: bytemuck::Pod>(&self) -> Vec<T> {
        let words = self.words.borrow();
        bytemuck::cast_slice(&words[..self.len / 4]).to_vec()
    }

    /// 保护区是否未被改写
    pub fn guard_intact(&self) -> bool {
        self.words.borrow()[self.len / 4..]
            .iter()
            .all(|w| *w == GUARD_WORD)
    }
}

/// 主存缓冲区写映射；析构时释放
pub struct HostMapping<'a> {
    buffer: &'a HostBuffer,
    words: Option<RefMut<'a, Vec<u32>>>,
}

impl WriteMapping for HostMapping<'_> {
    fn contents_mut(&mut self) -> Option<&mut [u8]> {
        let logical = self.buffer.len / 4;
        self.words
            .as_mut()
            .map(|words| bytemuck::cast_slice_mut(&mut words[..logical]))
    }
}

impl Drop for HostMapping<'_> {
    fn drop(&mut self) {
        self.words.take();
        if self.buffer.mapped.replace(false) {
            self.buffer.releases.set(self.buffer.releases.get() + 1);
        }
    }
}

impl DeviceMemory for HostMemory {
    type Buffer = HostBuffer;
    type Mapping<'a> = HostMapping<'a>;

    fn allocate(&self, spec: &BufferSpec) -> HostBuffer {
        let logical = spec.size as usize / 4;
        let mut words = vec![0u32; logical + GUARD_BYTES / 4];
        words[logical..].fill(GUARD_WORD);

        HostBuffer {
            label: spec.label,
            len: spec.size as usize,
            words: RefCell::new(words),
            mapped: Cell::new(true),
            releases: Cell::new(0),
            refuse_mapping: self.failing.contains(&spec.label),
        }
    }

    fn map_write<'a>(&'a self, buffer: &'a HostBuffer) -> HostMapping<'a> {
        let words = (buffer.mapped.get() && !buffer.refuse_mapping)
            .then(|| buffer.words.borrow_mut());
        HostMapping { buffer, words }
    }
}

/// 计算核看到的数组视图；切片包含保护区，`count` 为逻辑长度
pub struct KernelArrays<'a> {
    pub count: u32,
    pub positions: &'a mut [[f32; 4]],
    pub directions: &'a mut [[f32; 4]],
    pub colors: &'a mut [[f32; 4]],
    pub speeds: &'a mut [f32],
    pub active: &'a mut [i32],
}

/// 计算核参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelUniforms {
    pub model_center: Vec3,
    pub delta_time: f32,
}

/// CPU 计算核
pub trait HostKernel {
    /// 处理全局索引 `index` 的一次调用
    fn invoke(&self, index: u32, arrays: &mut KernelArrays<'_>, uniforms: &KernelUniforms);
}

/// 与 WGSL `cs_main` 一致的参考核
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplodeKernel;

impl HostKernel for ExplodeKernel {
    fn invoke(&self, index: u32, arrays: &mut KernelArrays<'_>, uniforms: &KernelUniforms) {
        if index >= arrays.count {
            return;
        }
        let i = index as usize;
        arrays.active[i] = 1;

        let pos = Vec3::from_slice(&arrays.positions[i]);
        let dir = Vec3::from_slice(&arrays.directions[i]);
        let velocity = dir * arrays.speeds[i] + (pos - uniforms.model_center) * RADIAL_PUSH;
        arrays.positions[i] = (pos + velocity * uniforms.delta_time).extend(1.0).to_array();
    }
}

/// 一次派发的统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub workgroups: u32,
    pub invocations: u32,
    /// 索引落在逻辑范围内的调用数
    pub in_range: u32,
}

/// 截取的单个粒子
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostPoint {
    pub position: [f32; 4],
    pub color: [f32; 4],
}

/// 绘制命令截取的一帧
#[derive(Debug, Clone, PartialEq)]
pub struct HostFrame {
    pub points: Vec<HostPoint>,
    pub projection: Mat4,
    pub view: Mat4,
    pub viewport: Vec2,
    pub point_size: f32,
}

/// 帧命令流的 CPU 解释器
pub struct HostExecutor<'s, K = ExplodeKernel> {
    store: &'s ParticleStore<HostBuffer>,
    kernel: K,
    pending: Option<[Vec<u32>; 5]>,
    dispatches: Vec<DispatchStats>,
}

impl<'s> HostExecutor<'s, ExplodeKernel> {
    pub fn new(store: &'s ParticleStore<HostBuffer>) -> Self {
        Self::with_kernel(store, ExplodeKernel)
    }
}

impl<'s, K: HostKernel> HostExecutor<'s, K> {
    pub fn with_kernel(store: &'s ParticleStore<HostBuffer>, kernel: K) -> Self {
        Self {
            store,
            kernel,
            pending: None,
            dispatches: Vec::new(),
        }
    }

    /// 已执行的派发
    pub fn dispatches(&self) -> &[DispatchStats] {
        &self.dispatches
    }

    /// 按顺序执行一帧命令；若包含绘制则返回截取结果
    pub fn execute(&mut self, frame: &FrameCommands) -> Option<HostFrame> {
        let mut current = None;
        let mut compute = None;
        let mut points = None;
        let mut attributes_bound = false;
        let mut captured = None;

        for command in frame.commands() {
            match command {
                ParticleCommand::UseProgram(slot) => current = Some(*slot),
                ParticleCommand::Publish { program, bytes } => match program {
                    ProgramSlot::Compute => compute = UniformBlock::<ComputeUniform>::from_bytes(bytes),
                    ProgramSlot::Points => points = UniformBlock::<PointUniform>::from_bytes(bytes),
                    ProgramSlot::Mesh => {}
                },
                ParticleCommand::Dispatch { workgroups } => {
                    if current != Some(ProgramSlot::Compute) {
                        warn!(target: "particles", "Dispatch without an active compute program");
                        continue;
                    }
                    match compute.as_ref().and_then(kernel_uniforms) {
                        Some(uniforms) => self.dispatch(*workgroups, &uniforms),
                        None => warn!(target: "particles", "Dispatch without published uniforms"),
                    }
                }
                ParticleCommand::StorageBarrier => self.commit(),
                ParticleCommand::BindStoreAttributes => attributes_bound = true,
                ParticleCommand::DrawPoints { count } => {
                    if current == Some(ProgramSlot::Points) && attributes_bound {
                        captured = points.as_ref().and_then(|u| self.capture(*count, u));
                    }
                }
            }
        }
        captured
    }

    fn dispatch(&mut self, workgroups: u32, uniforms: &KernelUniforms) {
        if self.store.is_empty() {
            return;
        }
        let count = self.store.capacity();
        let invocations = workgroups.saturating_mul(WORKGROUP_SIZE);

        let store = self.store;
        let pending = self.pending.get_or_insert_with(|| {
            std::array::from_fn(|i| {
                store
                    .buffer(ParticleArray::ALL[i])
                    .map(|b| b.words.borrow().clone())
                    .unwrap_or_default()
            })
        });
        let [position, direction, color, speed, active] = pending;
        let mut arrays = KernelArrays {
            count,
            positions: bytemuck::cast_slice_mut(position),
            directions: bytemuck::cast_slice_mut(direction),
            colors: bytemuck::cast_slice_mut(color),
            speeds: bytemuck::cast_slice_mut(speed),
            active: bytemuck::cast_slice_mut(active),
        };
        for index in 0..invocations {
            self.kernel.invoke(index, &mut arrays, uniforms);
        }

        self.dispatches.push(DispatchStats {
            workgroups,
            invocations,
            in_range: invocations.min(count),
        });
    }

    /// 屏障：提交派发写入
    fn commit(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        for (array, words) in ParticleArray::ALL.into_iter().zip(pending) {
            if let Some(buffer) = self.store.buffer(array) {
                *buffer.words.borrow_mut() = words;
            }
        }
    }

    fn capture(&self, count: u32, uniforms: &UniformBlock<PointUniform>) -> Option<HostFrame> {
        let positions: Vec<[f32; 4]> = self.store.buffer(ParticleArray::Position)?.read();
        let colors: Vec<[f32; 4]> = self.store.buffer(ParticleArray::Color)?.read();
        let points = positions
            .into_iter()
            .zip(colors)
            .take(count as usize)
            .map(|(position, color)| HostPoint { position, color })
            .collect();

        Some(HostFrame {
            points,
            projection: uniforms.matrix4(PointUniform::Projection).ok()?,
            view: uniforms.matrix4(PointUniform::View).ok()?,
            viewport: uniforms.vec2(PointUniform::Viewport).ok()?,
            point_size: uniforms.scalar(PointUniform::PointSize).ok()?,
        })
    }
}

fn kernel_uniforms(block: &UniformBlock<ComputeUniform>) -> Option<KernelUniforms> {
    Some(KernelUniforms {
        model_center: block.vector3(ComputeUniform::ModelCenter).ok()?,
        delta_time: block.scalar(ComputeUniform::DeltaTime).ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_is_zeroed_with_guard() {
        let memory = HostMemory::new();
        let buffer = memory.allocate(&BufferSpec {
            label: "Particle Speeds",
            size: 40,
            vertex: false,
        });
        assert!(buffer.read::<f32>().iter().all(|s| *s == 0.0));
        assert!(buffer.guard_intact());
        assert!(buffer.is_mapped());
    }

    #[test]
    fn test_mapping_released_on_drop() {
        let memory = HostMemory::new();
        let buffer = memory.allocate(&BufferSpec {
            label: "Particle Speeds",
            size: 8,
            vertex: false,
        });
        {
            let mut mapping = memory.map_write(&buffer);
            let bytes = mapping.contents_mut().unwrap();
            assert_eq!(bytes.len(), 8);
            bytes[..4].copy_from_slice(&2.5f32.to_ne_bytes());
        }
        assert!(!buffer.is_mapped());
        assert_eq!(buffer.release_count(), 1);
        assert_eq!(buffer.read::<f32>(), vec![2.5, 0.0]);

        // 已释放的缓冲区不能再次映射
        let mut mapping = memory.map_write(&buffer);
        assert!(mapping.contents_mut().is_none());
    }

    #[test]
    fn test_refused_mapping_still_released() {
        let memory = HostMemory::failing_on(&[ParticleArray::Color]);
        let buffer = memory.allocate(&BufferSpec {
            label: ParticleArray::Color.label(),
            size: 16,
            vertex: true,
        });
        {
            let mut mapping = memory.map_write(&buffer);
            assert!(mapping.contents_mut().is_none());
        }
        assert!(!buffer.is_mapped());
        assert_eq!(buffer.release_count(), 1);
    }
}
