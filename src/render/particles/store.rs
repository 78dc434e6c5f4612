//! 粒子存储
//!
//! 五个并行数组驻留在设备内存中，构造时通过限定作用域的写映射一次性初始化，
//! 之后 CPU 不再读写。每个数组的初始化结果单独记录在 [`SeedReport`] 中。

use super::error::{MappingFailed, ParticleError, ParticleResult};
use super::layout::{workgroup_count, ParticleArray};
use super::memory::{BufferSpec, DeviceMemory, WriteMapping};
use super::seed::{self, SeedParams};
use glam::Vec3;
use rand::Rng;
use tracing::{debug, info, warn};

/// 初始化数据来源
#[derive(Debug, Clone, Copy)]
pub struct ParticleSource<'a> {
    /// 按网格、顶点顺序拼接的源顶点位置
    pub pool: &'a [Vec3],
    /// 统一初始颜色
    pub diffuse: Vec3,
}

/// 各数组的初始化结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedReport {
    outcomes: Vec<(ParticleArray, Result<(), MappingFailed>)>,
}

impl SeedReport {
    fn record(&mut self, array: ParticleArray, outcome: Result<(), MappingFailed>) {
        self.outcomes.push((array, outcome));
    }

    /// 指定数组的结果；空存储没有任何记录
    pub fn outcome(&self, array: ParticleArray) -> Option<Result<(), MappingFailed>> {
        self.outcomes
            .iter()
            .find(|(a, _)| *a == array)
            .map(|(_, outcome)| *outcome)
    }

    pub fn failures(&self) -> Vec<MappingFailed> {
        self.outcomes
            .iter()
            .filter_map(|(_, outcome)| outcome.err())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| outcome.is_ok())
    }
}

/// 固定容量的粒子存储
#[derive(Debug)]
pub struct ParticleStore<B> {
    capacity: u32,
    /// 按 `ParticleArray::ALL` 顺序；容量为 0 时为空
    buffers: Vec<B>,
    report: SeedReport,
}

impl<B> ParticleStore<B> {
    /// 分配并初始化粒子存储
    ///
    /// 源顶点池少于 `capacity` 时返回 [`ParticleError::CapacityExceedsSource`]。
    /// 容量为 0 时不分配任何缓冲区。单个缓冲区映射失败不会中止构造，
    /// 该数组保持全零并记录为 [`MappingFailed`]。
    pub fn new<M, R>(
        memory: &M,
        source: ParticleSource<'_>,
        capacity: u32,
        params: &SeedParams,
        rng: &mut R,
    ) -> ParticleResult<Self>
    where
        M: DeviceMemory<Buffer = B>,
        R: Rng + ?Sized,
    {
        if source.pool.len() < capacity as usize {
            return Err(ParticleError::CapacityExceedsSource {
                capacity,
                available: source.pool.len(),
            });
        }
        params.validate()?;

        let mut store = Self {
            capacity,
            buffers: Vec::with_capacity(ParticleArray::ALL.len()),
            report: SeedReport::default(),
        };

        if capacity == 0 {
            debug!(target: "particles", "Empty particle store, no buffers allocated");
            return Ok(store);
        }

        let source = ParticleSource {
            pool: &source.pool[..capacity as usize],
            diffuse: source.diffuse,
        };

        for array in ParticleArray::ALL {
            let buffer = memory.allocate(&BufferSpec {
                label: array.label(),
                size: array.byte_size(capacity),
                vertex: array.vertex_attribute().is_some(),
            });
            let outcome = seed_array(memory, &buffer, array, source, params, rng);
            store.report.record(array, outcome);
            store.buffers.push(buffer);
        }

        info!(
            target: "particles",
            capacity,
            workgroups = workgroup_count(capacity),
            complete = store.report.is_complete(),
            "Particle store created"
        );
        Ok(store)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.capacity == 0
    }

    pub fn report(&self) -> &SeedReport {
        &self.report
    }

    pub fn buffer(&self, array: ParticleArray) -> Option<&B> {
        self.buffers.get(array.index())
    }

    /// 计算核绑定：(绑定编号, 缓冲区)
    pub fn bindings(&self) -> impl Iterator<Item = (u32, &B)> + '_ {
        ParticleArray::ALL
            .iter()
            .zip(&self.buffers)
            .map(|(array, buffer)| (array.binding(), buffer))
    }

    /// 渲染程序顶点属性：(属性编号, 缓冲区)
    pub fn vertex_attributes(&self) -> impl Iterator<Item = (u32, &B)> + '_ {
        ParticleArray::ALL
            .iter()
            .zip(&self.buffers)
            .filter_map(|(array, buffer)| array.vertex_attribute().map(|slot| (slot, buffer)))
    }
}

/// 映射单个缓冲区并写入初始数据；映射在返回时释放
fn seed_array<M, R>(
    memory: &M,
    buffer: &M::Buffer,
    array: ParticleArray,
    source: ParticleSource<'_>,
    params: &SeedParams,
    rng: &mut R,
) -> Result<(), MappingFailed>
where
    M: DeviceMemory,
    R: Rng + ?Sized,
{
    let mut mapping = memory.map_write(buffer);
    let Some(bytes) = mapping.contents_mut() else {
        warn!(target: "particles", array = array.label(), "Buffer mapping failed, seeding skipped");
        return Err(MappingFailed { array });
    };

    let count = source.pool.len();
    match array {
        ParticleArray::Position => write(bytes, &seed::positions(source.pool)),
        ParticleArray::Direction => write(bytes, &seed::directions(count, params, rng)),
        ParticleArray::Color => write(bytes, &seed::colors(count, source.diffuse)),
        ParticleArray::Speed => write(bytes, &seed::speeds(count, params, rng)),
        ParticleArray::Active => write(bytes, &seed::inactive(count)),
    }
    Ok(())
}

fn write<T: bytemuck::Pod>(bytes: &mut [u8], data: &[T]) {
    bytes.copy_from_slice(bytemuck::cast_slice(data));
}
