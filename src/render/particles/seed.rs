//! 粒子初始数据生成
//!
//! 这些函数只产生 CPU 侧数组，写入设备内存由 [`super::store`] 负责。

use super::error::{ParticleError, ParticleResult};
use glam::Vec3;
use rand::Rng;
use std::ops::Range;

/// 方向采样失败时的最大重试次数
const DIRECTION_RETRIES: usize = 16;

/// 随机初始化参数
#[derive(Debug, Clone, PartialEq)]
pub struct SeedParams {
    /// 方向 x/y 分量的对称取值范围
    pub lateral: Range<f32>,
    /// 方向 z 分量的单侧取值范围
    pub depth: Range<f32>,
    /// 初始速度范围（负值：沿方向的反向运动）
    pub speed: Range<f32>,
}

impl Default for SeedParams {
    fn default() -> Self {
        Self {
            lateral: -1.0..1.0,
            depth: -1.0..0.0,
            speed: -5.0..-1.0,
        }
    }
}

impl SeedParams {
    /// 校验采样范围
    pub fn validate(&self) -> ParticleResult<()> {
        check_range("lateral", &self.lateral)?;
        check_range("depth", &self.depth)?;
        check_range("speed", &self.speed)?;
        if self.speed.end >= 0.0 {
            return Err(ParticleError::InvalidSeedRange {
                what: "speed",
                reason: format!("upper bound {} must be negative", self.speed.end),
            });
        }
        Ok(())
    }
}

fn check_range(what: &'static str, range: &Range<f32>) -> ParticleResult<()> {
    if !range.start.is_finite() || !range.end.is_finite() {
        return Err(ParticleError::InvalidSeedRange {
            what,
            reason: "bounds must be finite".to_string(),
        });
    }
    if range.start >= range.end {
        return Err(ParticleError::InvalidSeedRange {
            what,
            reason: format!("{}..{} is empty", range.start, range.end),
        });
    }
    Ok(())
}

/// 位置：源顶点，w = 1
pub fn positions(pool: &[Vec3]) -> Vec<[f32; 4]> {
    pool.iter().map(|p| p.extend(1.0).to_array()).collect()
}

/// 方向：归一化随机向量，w = 0
pub fn directions<R: Rng + ?Sized>(count: usize, params: &SeedParams, rng: &mut R) -> Vec<[f32; 4]> {
    (0..count)
        .map(|_| sample_direction(params, rng).extend(0.0).to_array())
        .collect()
}

/// 采样单位方向向量
///
/// 采到（近似）零向量时重采样，多次失败后退回 -Z。
pub fn sample_direction<R: Rng + ?Sized>(params: &SeedParams, rng: &mut R) -> Vec3 {
    for _ in 0..DIRECTION_RETRIES {
        let v = Vec3::new(
            rng.gen_range(params.lateral.clone()),
            rng.gen_range(params.lateral.clone()),
            rng.gen_range(params.depth.clone()),
        );
        if v.length_squared() > f32::EPSILON {
            return v.normalize();
        }
    }
    Vec3::NEG_Z
}

/// 速度：在 `params.speed` 内均匀采样
pub fn speeds<R: Rng + ?Sized>(count: usize, params: &SeedParams, rng: &mut R) -> Vec<f32> {
    (0..count)
        .map(|_| rng.gen_range(params.speed.clone()))
        .collect()
}

/// 颜色：统一漫反射色，alpha = 1
pub fn colors(count: usize, diffuse: Vec3) -> Vec<[f32; 4]> {
    vec![diffuse.extend(1.0).to_array(); count]
}

/// 活动标记：全部为 0
pub fn inactive(count: usize) -> Vec<i32> {
    vec![0; count]
}
