//! 平台层：窗口创建与输入状态

pub mod input;
pub mod winit;

pub use input::{InputState, MoveIntent};
