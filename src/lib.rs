//! # Mesh Destruction
//!
//! 实时网格破碎演示：一个光照模型在若干次点击后碎裂成 GPU 常驻的粒子模拟。
//!
//! ## Features
//!
//! - **Particle Store**: 五个并行数组（位置、方向、颜色、速度、激活标记）驻留在设备内存，
//!   构造时通过限定作用域的写映射一次性播种
//! - **Simulation Step**: 每帧一次计算派发（每工作组 128 个调用），随后是存储屏障
//! - **Render View**: 直接把位置/颜色数组作为顶点属性绘制粒子
//! - **CPU 替身**: `HostMemory` / `HostExecutor` 在没有 GPU 的环境里执行同一份逐帧命令流
//!
//! ## Modules
//!
//! - [`core`]: 主循环、错误类型、计时
//! - [`config`]: TOML/JSON 配置与环境变量覆盖
//! - [`platform`]: 窗口与输入
//! - [`render`]: 设备、网格光照、粒子子系统
//! - [`scene`]: 模型与相机

/// Core loop, errors and timing
pub mod core;
/// Configuration system
pub mod config;
/// Window creation and input state
pub mod platform;
/// Rendering: device, lit mesh, GPU particles
pub mod render;
/// Model and camera
pub mod scene;

pub use config::DemoConfig;
pub use core::{Engine, EngineError, EngineResult};
pub use render::particles::{
    FrameCommands, HostExecutor, HostMemory, ParticleArray, ParticleError, ParticleSource,
    ParticleStore, RenderView, SeedParams, SimulationStep, StepParams, ViewParams,
};
