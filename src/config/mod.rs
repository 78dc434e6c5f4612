/// 统一配置系统
///
/// 提供TOML/JSON配置文件与环境变量覆盖
use crate::{impl_default, impl_default_and_new};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub mod camera;
pub mod graphics;
pub mod lighting;
pub mod model;
pub mod particles;

pub use camera::CameraConfig;
pub use graphics::{GraphicsConfig, Resolution};
pub use lighting::LightingConfig;
pub use model::{ModelConfig, WallConfig};
pub use particles::ParticleConfig;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 演示程序主配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub graphics: GraphicsConfig,
    pub camera: CameraConfig,
    pub particles: ParticleConfig,
    pub model: ModelConfig,
    pub lighting: LightingConfig,
    pub logging: LoggingConfig,

    /// 配置来源文件（不序列化）
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl_default_and_new!(DemoConfig {
    graphics: GraphicsConfig::default(),
    camera: CameraConfig::default(),
    particles: ParticleConfig::default(),
    model: ModelConfig::default(),
    lighting: LightingConfig::default(),
    logging: LoggingConfig::default(),
    source: None,
});

impl DemoConfig {
    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let mut config = Self::from_toml_str(&content)?;
        config.source = Some(path.as_ref().to_path_buf());
        Ok(config)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let mut config = Self::from_json_str(&content)?;
        config.source = Some(path.as_ref().to_path_buf());
        Ok(config)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 保存为JSON文件
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// 按 `lookup` 提供的键值覆盖配置；无法解析的值被忽略
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(width) = lookup("DEMO_WIDTH").and_then(|v| v.parse().ok()) {
            self.graphics.resolution.width = width;
        }
        if let Some(height) = lookup("DEMO_HEIGHT").and_then(|v| v.parse().ok()) {
            self.graphics.resolution.height = height;
        }
        if let Some(vsync) = lookup("DEMO_VSYNC").and_then(|v| v.parse().ok()) {
            self.graphics.vsync = vsync;
        }
        if let Some(size) = lookup("DEMO_POINT_SIZE").and_then(|v| v.parse().ok()) {
            self.particles.point_size = size;
        }
        if let Some(clicks) = lookup("DEMO_EXPLODE_AFTER").and_then(|v| v.parse().ok()) {
            self.particles.explode_after_clicks = clicks;
        }
        if let Some(seed) = lookup("DEMO_SEED").and_then(|v| v.parse().ok()) {
            self.particles.seed = Some(seed);
        }
        if let Some(path) = lookup("DEMO_MODEL").filter(|v| !v.is_empty()) {
            self.model.path = Some(PathBuf::from(path));
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.graphics.validate()?;
        self.camera.validate()?;
        self.particles.validate()?;
        self.model.validate()?;
        Ok(())
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. ./demo.toml
    /// 2. ./demo.json
    /// 3. ~/.config/mesh_destruction/demo.toml
    /// 4. 使用默认配置
    pub fn load_or_default() -> Self {
        if let Ok(config) = Self::from_toml_file("demo.toml") {
            return config;
        }

        if let Ok(config) = Self::from_json_file("demo.json") {
            return config;
        }

        if let Some(home) = env::var_os("HOME") {
            let config_path = PathBuf::from(home)
                .join(".config")
                .join("mesh_destruction")
                .join("demo.toml");

            match Self::from_toml_file(&config_path) {
                Ok(config) => return config,
                Err(e) => debug!(target: "config", "No user config at {:?}: {}", config_path, e),
            }
        }

        Self::default()
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 未设置 RUST_LOG 时使用的日志级别
    pub level: LogLevel,
}

impl_default!(LoggingConfig {
    level: LogLevel::Info,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// 跟踪
    Trace,
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}

impl LogLevel {
    /// `EnvFilter` 指令
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}
