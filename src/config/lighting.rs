use crate::impl_default;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// 方向光配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// 光照方向（从光源指向场景）
    pub direction: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl_default!(LightingConfig {
    direction: Vec3::new(-0.1, -0.2, -0.9),
    ambient: Vec3::splat(0.33),
    diffuse: Vec3::ONE,
    specular: Vec3::new(1.0, 0.6, 0.3),
});
