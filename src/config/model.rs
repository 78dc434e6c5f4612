use super::{ConfigError, ConfigResult};
use crate::impl_default;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 模型配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// glTF 模型路径；未设置时使用程序生成的砖墙
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub wall: WallConfig,
}

impl ModelConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.wall.validate()
    }
}

/// 程序生成砖墙
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WallConfig {
    pub columns: u32,
    pub rows: u32,
    /// 单块砖的尺寸
    pub brick_size: Vec3,
    /// 砖缝宽度
    pub mortar: f32,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
}

impl_default!(WallConfig {
    columns: 16,
    rows: 12,
    brick_size: Vec3::new(0.4, 0.18, 0.2),
    mortar: 0.02,
    ambient: Vec3::new(0.62, 0.27, 0.18),
    diffuse: Vec3::new(0.62, 0.27, 0.18),
    specular: Vec3::splat(0.2),
    shininess: 16.0,
});

impl WallConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.columns == 0 || self.rows == 0 {
            return Err(ConfigError::ValidationError(
                "Wall needs at least one row and one column".to_string(),
            ));
        }
        if self.brick_size.min_element() <= 0.0 || self.mortar < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "Invalid brick size {:?} or mortar {}",
                self.brick_size, self.mortar
            )));
        }
        Ok(())
    }
}
