//! 核心模块
//!
//! - `engine` - 主循环与逐帧状态
//! - `error` - 错误类型定义
//! - `time` - 帧计时与 FPS 统计

pub mod engine;
pub mod error;
#[macro_use]
pub mod macros;
pub mod time;

pub use engine::{AppState, DemoMode, Engine};
pub use error::{
    AssetError, AssetResult, EngineError, EngineResult, RenderError, RenderResult,
};
pub use time::{FpsSummary, FpsTracker, FrameClock};
