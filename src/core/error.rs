//! 统一错误处理模块
//!
//! ## 错误类型分层
//!
//! - **应用层** (`EngineError`): 窗口、事件循环、各子系统错误的汇总
//! - **渲染层** (`RenderError`): 适配器、设备、表面
//! - **资源层** (`AssetError`): 模型导入
//! - **粒子核心** (`render::particles::error`): 存储构造与逐帧顺序
//! - **配置** (`config::ConfigError`)

use crate::config::ConfigError;
use crate::render::particles::ParticleError;
use crate::render::uniforms::UniformError;
use thiserror::Error;

/// 应用顶层错误
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Initialization error: {0}")]
    Init(String),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Particle error: {0}")]
    Particles(#[from] ParticleError),

    #[error("Uniform error: {0}")]
    Uniform(#[from] UniformError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Window creation failed: {0}")]
    Window(String),

    #[error("Event loop error: {0}")]
    EventLoop(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 渲染系统错误
#[derive(Error, Debug, Clone)]
pub enum RenderError {
    #[error("Failed to create surface: {0}")]
    SurfaceCreation(String),

    #[error("Failed to request adapter: no compatible GPU found")]
    NoAdapter,

    #[error("Failed to request device: {0}")]
    DeviceRequest(String),

    #[error("Failed to create shader: {0}")]
    ShaderCompilation(String),

    #[error("Surface error: {0}")]
    Surface(String),
}

/// 模型导入错误
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Asset not found: {path}")]
    NotFound { path: String },

    #[error("Failed to load asset: {path}, reason: {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Invalid asset format: {path}, expected: {expected}")]
    InvalidFormat { path: String, expected: String },

    #[error("Model contains no vertices: {0}")]
    EmptyModel(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
pub type RenderResult<T> = Result<T, RenderError>;
pub type AssetResult<T> = Result<T, AssetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let asset_err = AssetError::NotFound {
            path: "wall.glb".to_string(),
        };
        let engine_err: EngineError = asset_err.into();
        assert!(matches!(engine_err, EngineError::Asset(_)));

        let particle_err = ParticleError::CapacityExceedsSource {
            capacity: 10,
            available: 4,
        };
        let engine_err: EngineError = particle_err.into();
        assert!(matches!(engine_err, EngineError::Particles(_)));
    }

    #[test]
    fn test_error_display() {
        let err = RenderError::NoAdapter;
        assert_eq!(
            err.to_string(),
            "Failed to request adapter: no compatible GPU found"
        );

        let err = ParticleError::CapacityExceedsSource {
            capacity: 10,
            available: 4,
        };
        assert_eq!(
            EngineError::from(err).to_string(),
            "Particle error: Particle capacity 10 exceeds source vertex pool of 4 vertices"
        );
    }
}
