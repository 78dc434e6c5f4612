use crate::config::GraphicsConfig;
use crate::core::error::{EngineError, EngineResult};
use std::sync::Arc;
use tracing::warn;
use winit::dpi::PhysicalSize;
use winit::event_loop::EventLoop;
use winit::window::{CursorGrabMode, Window, WindowBuilder};

/// 按图形配置创建窗口
pub fn create_window(event_loop: &EventLoop<()>, config: &GraphicsConfig) -> EngineResult<Arc<Window>> {
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(PhysicalSize::new(
            config.resolution.width,
            config.resolution.height,
        ))
        .build(event_loop)
        .map_err(|e| EngineError::Window(e.to_string()))?;
    Ok(Arc::new(window))
}

/// 隐藏并锁定光标；平台不支持时只记录警告
pub fn capture_cursor(window: &Window) {
    let grabbed = window
        .set_cursor_grab(CursorGrabMode::Confined)
        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked));
    if let Err(e) = grabbed {
        warn!(target: "input", "Cursor grab unavailable: {}", e);
    }
    window.set_cursor_visible(false);
}
