//! 粒子存储布局约定
//!
//! 计算核与渲染程序按固定编号寻址粒子数组，这里集中定义这些编号：
//!
//! | 数组 | 元素 | 存储绑定 | 顶点属性 |
//! |------|------|----------|----------|
//! | position  | vec4 (w = 1) | 4 | 0 |
//! | direction | vec4 (w = 0) | 5 | - |
//! | color     | vec4 (a = 1) | 6 | 1 |
//! | speed     | f32          | 7 | - |
//! | active    | i32          | 8 | - |

/// 计算核每个工作组的线程数
pub const WORKGROUP_SIZE: u32 = 128;

/// 计算核参数 uniform 的绑定编号
pub const STEP_UNIFORM_BINDING: u32 = 0;

/// 点渲染程序参数 uniform 的绑定编号
pub const VIEW_UNIFORM_BINDING: u32 = 0;

/// 粒子存储中的五个并行数组
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticleArray {
    Position,
    Direction,
    Color,
    Speed,
    Active,
}

impl ParticleArray {
    /// 按分配顺序排列的全部数组
    pub const ALL: [ParticleArray; 5] = [
        ParticleArray::Position,
        ParticleArray::Direction,
        ParticleArray::Color,
        ParticleArray::Speed,
        ParticleArray::Active,
    ];

    /// 在 `ALL` 中的位置
    pub const fn index(self) -> usize {
        match self {
            Self::Position => 0,
            Self::Direction => 1,
            Self::Color => 2,
            Self::Speed => 3,
            Self::Active => 4,
        }
    }

    /// 计算核中的存储缓冲区绑定编号
    pub const fn binding(self) -> u32 {
        match self {
            Self::Position => 4,
            Self::Direction => 5,
            Self::Color => 6,
            Self::Speed => 7,
            Self::Active => 8,
        }
    }

    /// 渲染程序中的顶点属性编号（仅 position 与 color 有）
    pub const fn vertex_attribute(self) -> Option<u32> {
        match self {
            Self::Position => Some(0),
            Self::Color => Some(1),
            _ => None,
        }
    }

    /// 单个元素的字节数
    pub const fn element_size(self) -> u64 {
        match self {
            Self::Position | Self::Direction | Self::Color => 16,
            Self::Speed | Self::Active => 4,
        }
    }

    /// 容量为 `capacity` 时该数组的字节数
    pub const fn byte_size(self, capacity: u32) -> u64 {
        self.element_size() * capacity as u64
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Position => "Particle Positions",
            Self::Direction => "Particle Directions",
            Self::Color => "Particle Colors",
            Self::Speed => "Particle Speeds",
            Self::Active => "Particle Active Flags",
        }
    }
}

/// 覆盖 `particle_count` 个工作项所需的一维工作组数
///
/// 最后一个工作组可能包含越界索引，由计算核自行做边界检查。
pub const fn workgroup_count(particle_count: u32) -> u32 {
    particle_count.div_ceil(WORKGROUP_SIZE)
}
