use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};

/// 图形配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    /// 窗口标题
    pub title: String,

    /// 分辨率
    pub resolution: Resolution,

    /// 垂直同步
    pub vsync: bool,

    /// 清屏颜色（线性 RGB）
    pub clear_color: [f64; 3],
}

impl_default!(GraphicsConfig {
    title: "Mesh Destruction Demo".to_string(),
    resolution: Resolution::default(),
    vsync: false,
    clear_color: [0.05, 0.05, 0.05],
});

impl GraphicsConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(ConfigError::ValidationError(
                "Invalid resolution".to_string(),
            ));
        }
        Ok(())
    }

    pub fn clear_color(&self) -> wgpu::Color {
        let [r, g, b] = self.clear_color;
        wgpu::Color { r, g, b, a: 1.0 }
    }
}

/// 分辨率
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// 宽度（像素）
    pub width: u32,
    /// 高度（像素）
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

impl Resolution {
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}
