//! 类型化 uniform 参数表
//!
//! 每个着色器程序的外部参数用一个枚举键描述（名字、类型、字节偏移），
//! 布局在程序链接时校验一次；逐帧写参数只是按偏移拷贝字节，不做字符串查找。

use glam::{Mat4, Vec2, Vec3};
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

/// uniform 成员类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Int,
    Bool,
    Vec2,
    Vec3,
    Mat4,
}

impl UniformKind {
    /// 在 uniform 块中占用的字节数
    pub const fn size(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::Bool => 4,
            Self::Vec2 => 8,
            Self::Vec3 => 12,
            Self::Mat4 => 64,
        }
    }

    /// WGSL uniform 地址空间的对齐要求
    pub const fn alignment(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::Bool => 4,
            Self::Vec2 => 8,
            Self::Vec3 | Self::Mat4 => 16,
        }
    }
}

/// uniform 参数表错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UniformError {
    #[error("uniform `{name}` is {expected:?}, not {actual:?}")]
    KindMismatch {
        name: &'static str,
        expected: UniformKind,
        actual: UniformKind,
    },

    #[error("uniform `{first}` overlaps `{second}`")]
    Overlap {
        first: &'static str,
        second: &'static str,
    },

    #[error("uniform `{name}` at offset {offset} does not fit the {block_size}-byte block")]
    OutOfBounds {
        name: &'static str,
        offset: usize,
        block_size: usize,
    },

    #[error("uniform `{name}` at offset {offset} breaks {alignment}-byte alignment")]
    Misaligned {
        name: &'static str,
        offset: usize,
        alignment: usize,
    },

    #[error("uniform `{0}` is not declared by the shader source")]
    UnknownName(&'static str),
}

/// uniform 参数键
///
/// 实现者通常是一个无字段枚举，`ALL` 列出全部成员。
pub trait UniformKey: Copy + Eq + fmt::Debug + 'static {
    /// uniform 块字节数（WGSL 结构体大小）
    const BLOCK_SIZE: usize;
    /// 全部键
    const ALL: &'static [Self];

    /// 着色器中的成员名（与着色器源码的稳定约定）
    fn name(self) -> &'static str;
    fn kind(self) -> UniformKind;
    fn offset(self) -> usize;
}

/// 校验键布局：越界、对齐、重叠
pub fn validate_layout<K: UniformKey>() -> Result<(), UniformError> {
    for &key in K::ALL {
        let kind = key.kind();
        let offset = key.offset();
        if offset + kind.size() > K::BLOCK_SIZE {
            return Err(UniformError::OutOfBounds {
                name: key.name(),
                offset,
                block_size: K::BLOCK_SIZE,
            });
        }
        if offset % kind.alignment() != 0 {
            return Err(UniformError::Misaligned {
                name: key.name(),
                offset,
                alignment: kind.alignment(),
            });
        }
    }

    for (i, &a) in K::ALL.iter().enumerate() {
        for &b in &K::ALL[i + 1..] {
            let a_range = a.offset()..a.offset() + a.kind().size();
            let b_range = b.offset()..b.offset() + b.kind().size();
            if a_range.start < b_range.end && b_range.start < a_range.end {
                return Err(UniformError::Overlap {
                    first: a.name(),
                    second: b.name(),
                });
            }
        }
    }
    Ok(())
}

/// CPU 侧 uniform 块镜像
#[derive(Clone)]
pub struct UniformBlock<K: UniformKey> {
    data: Vec<u8>,
    _key: PhantomData<K>,
}

impl<K: UniformKey> UniformBlock<K> {
    /// 创建全零 uniform 块
    pub fn new() -> Self {
        Self {
            data: vec![0; K::BLOCK_SIZE],
            _key: PhantomData,
        }
    }

    /// 从已发布的字节快照恢复
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        (bytes.len() == K::BLOCK_SIZE).then(|| Self {
            data: bytes.to_vec(),
            _key: PhantomData,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn set_scalar(&mut self, key: K, value: f32) -> Result<(), UniformError> {
        self.write(key, UniformKind::Float, bytemuck::bytes_of(&value))
    }

    pub fn set_int(&mut self, key: K, value: i32) -> Result<(), UniformError> {
        self.write(key, UniformKind::Int, bytemuck::bytes_of(&value))
    }

    pub fn set_bool(&mut self, key: K, value: bool) -> Result<(), UniformError> {
        let value = u32::from(value);
        self.write(key, UniformKind::Bool, bytemuck::bytes_of(&value))
    }

    pub fn set_vec2(&mut self, key: K, value: Vec2) -> Result<(), UniformError> {
        self.write(key, UniformKind::Vec2, bytemuck::bytes_of(&value.to_array()))
    }

    pub fn set_vector3(&mut self, key: K, value: Vec3) -> Result<(), UniformError> {
        self.write(key, UniformKind::Vec3, bytemuck::bytes_of(&value.to_array()))
    }

    pub fn set_matrix4(&mut self, key: K, value: Mat4) -> Result<(), UniformError> {
        self.write(
            key,
            UniformKind::Mat4,
            bytemuck::bytes_of(&value.to_cols_array()),
        )
    }

    pub fn scalar(&self, key: K) -> Result<f32, UniformError> {
        let bytes = self.read(key, UniformKind::Float)?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    pub fn int(&self, key: K) -> Result<i32, UniformError> {
        let bytes = self.read(key, UniformKind::Int)?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    pub fn boolean(&self, key: K) -> Result<bool, UniformError> {
        let bytes = self.read(key, UniformKind::Bool)?;
        Ok(bytemuck::pod_read_unaligned::<u32>(bytes) != 0)
    }

    pub fn vec2(&self, key: K) -> Result<Vec2, UniformError> {
        let bytes = self.read(key, UniformKind::Vec2)?;
        Ok(Vec2::from_array(bytemuck::pod_read_unaligned(bytes)))
    }

    pub fn vector3(&self, key: K) -> Result<Vec3, UniformError> {
        let bytes = self.read(key, UniformKind::Vec3)?;
        Ok(Vec3::from_array(bytemuck::pod_read_unaligned(bytes)))
    }

    pub fn matrix4(&self, key: K) -> Result<Mat4, UniformError> {
        let bytes = self.read(key, UniformKind::Mat4)?;
        Ok(Mat4::from_cols_array(&bytemuck::pod_read_unaligned(bytes)))
    }

    fn write(&mut self, key: K, kind: UniformKind, bytes: &[u8]) -> Result<(), UniformError> {
        let range = Self::range(key, kind)?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    fn read(&self, key: K, kind: UniformKind) -> Result<&[u8], UniformError> {
        let range = Self::range(key, kind)?;
        Ok(&self.data[range])
    }

    fn range(key: K, kind: UniformKind) -> Result<std::ops::Range<usize>, UniformError> {
        if key.kind() != kind {
            return Err(UniformError::KindMismatch {
                name: key.name(),
                expected: key.kind(),
                actual: kind,
            });
        }
        let start = key.offset();
        let end = start + kind.size();
        if end > K::BLOCK_SIZE {
            return Err(UniformError::OutOfBounds {
                name: key.name(),
                offset: start,
                block_size: K::BLOCK_SIZE,
            });
        }
        Ok(start..end)
    }
}

impl<K: UniformKey> Default for UniformBlock<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: UniformKey> fmt::Debug for UniformBlock<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniformBlock")
            .field("size", &self.data.len())
            .finish()
    }
}
