//! 设备内存接口
//!
//! 粒子存储只通过这两个 trait 接触设备内存：分配缓冲区、获取限定作用域的写映射。
//! 写映射在析构时释放，因此无论填充成功、被跳过还是提前返回，释放都一定执行。

use tracing::trace;

/// 缓冲区分配描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferSpec {
    pub label: &'static str,
    /// 字节数，必须是 4 的倍数
    pub size: u64,
    /// 是否同时作为顶点缓冲区
    pub vertex: bool,
}

/// 限定作用域的 CPU 写窗口
pub trait WriteMapping {
    /// 映射成功时返回可写字节视图
    fn contents_mut(&mut self) -> Option<&mut [u8]>;
}

/// 设备内存分配器
pub trait DeviceMemory {
    type Buffer;
    type Mapping<'a>: WriteMapping
    where
        Self: 'a;

    /// 分配缓冲区；新缓冲区内容为零
    fn allocate(&self, spec: &BufferSpec) -> Self::Buffer;

    /// 获取写映射
    fn map_write<'a>(&'a self, buffer: &'a Self::Buffer) -> Self::Mapping<'a>;
}

/// wgpu 缓冲区的写映射
///
/// 缓冲区以 `mapped_at_creation` 创建，析构时若仍处于映射状态则 `unmap`。
pub struct WgpuWriteMapping<'a> {
    buffer: &'a wgpu::Buffer,
    view: Option<wgpu::BufferViewMut<'a>>,
}

impl WriteMapping for WgpuWriteMapping<'_> {
    fn contents_mut(&mut self) -> Option<&mut [u8]> {
        self.view.as_deref_mut()
    }
}

impl Drop for WgpuWriteMapping<'_> {
    fn drop(&mut self) {
        // 视图必须先于 unmap 释放
        self.view.take();
        if matches!(self.buffer.map_state(), wgpu::MapState::Mapped) {
            self.buffer.unmap();
            trace!(target: "particles", "Released buffer mapping");
        }
    }
}

impl DeviceMemory for wgpu::Device {
    type Buffer = wgpu::Buffer;
    type Mapping<'a> = WgpuWriteMapping<'a>;

    fn allocate(&self, spec: &BufferSpec) -> wgpu::Buffer {
        let mut usage =
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST;
        if spec.vertex {
            usage |= wgpu::BufferUsages::VERTEX;
        }

        self.create_buffer(&wgpu::BufferDescriptor {
            label: Some(spec.label),
            size: spec.size,
            usage,
            mapped_at_creation: true,
        })
    }

    fn map_write<'a>(&'a self, buffer: &'a wgpu::Buffer) -> WgpuWriteMapping<'a> {
        let view = match buffer.map_state() {
            wgpu::MapState::Mapped => Some(buffer.slice(..).get_mapped_range_mut()),
            _ => None,
        };
        WgpuWriteMapping { buffer, view }
    }
}
