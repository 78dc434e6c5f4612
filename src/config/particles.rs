use super::{ConfigError, ConfigResult};
use crate::impl_default;
use crate::render::particles::SeedParams;
use serde::{Deserialize, Serialize};

/// 粒子配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    /// 粒子屏幕尺寸（像素）
    pub point_size: f32,
    /// 切换到粒子模式所需的点击次数
    pub explode_after_clicks: u32,
    /// 初始速度范围 [min, max)，必须为负
    pub speed: [f32; 2],
    /// 方向 x/y 分量范围
    pub lateral: [f32; 2],
    /// 方向 z 分量范围
    pub depth: [f32; 2],
    /// 随机种子；未设置时使用系统熵
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// 粒子容量；未设置时等于模型顶点总数
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

impl_default!(ParticleConfig {
    point_size: 2.0,
    explode_after_clicks: 5,
    speed: [-5.0, -1.0],
    lateral: [-1.0, 1.0],
    depth: [-1.0, 0.0],
    seed: None,
    capacity: None,
});

impl ParticleConfig {
    pub fn seed_params(&self) -> SeedParams {
        SeedParams {
            lateral: self.lateral[0]..self.lateral[1],
            depth: self.depth[0]..self.depth[1],
            speed: self.speed[0]..self.speed[1],
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.point_size.is_finite() && self.point_size > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "Point size must be positive, got {}",
                self.point_size
            )));
        }
        if self.speed[1] >= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "Speed range must be strictly negative, got {:?}",
                self.speed
            )));
        }
        self.seed_params()
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
