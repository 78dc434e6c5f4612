use super::{ConfigError, ConfigResult};
use crate::impl_default;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// 相机配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// 初始位置
    pub position: Vec3,
    /// 初始偏航角（度），-90 朝向 -Z
    pub yaw: f32,
    /// 初始俯仰角（度）
    pub pitch: f32,
    /// 垂直视场角（度）
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// 行走速度（单位/秒）
    pub walk_speed: f32,
    /// 按住 Shift 时的速度
    pub sprint_speed: f32,
    /// 鼠标灵敏度（度/像素）
    pub sensitivity: f32,
}

impl_default!(CameraConfig {
    position: Vec3::new(0.0, 0.0, 3.0),
    yaw: -90.0,
    pitch: 0.0,
    fov: 45.0,
    near: 0.1,
    far: 100.0,
    walk_speed: 2.5,
    sprint_speed: 10.0,
    sensitivity: 0.1,
});

impl CameraConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.fov > 0.0 && self.fov < 180.0) {
            return Err(ConfigError::ValidationError(format!(
                "Field of view must be in (0, 180), got {}",
                self.fov
            )));
        }
        if !(self.near > 0.0 && self.far > self.near) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid clip planes: near {} far {}",
                self.near, self.far
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fov_bounds() {
        let mut config = CameraConfig::default();
        assert!(config.validate().is_ok());
        config.fov = 180.0;
        assert!(config.validate().is_err());
        config.fov = 0.0;
        assert!(config.validate().is_err());
    }
}
