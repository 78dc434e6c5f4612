//! 帧计时与 FPS 统计

use std::time::Instant;

/// 帧间隔计时
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    last: Instant,
    elapsed: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
            elapsed: 0.0,
        }
    }

    /// 进入新的一帧，返回距上一帧的秒数
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let delta = now.saturating_duration_since(self.last).as_secs_f32();
        self.last = now;
        self.elapsed += delta;
        delta
    }

    /// 累计运行秒数
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// 每秒采样一次的 FPS 统计
#[derive(Debug, Clone, Default)]
pub struct FpsTracker {
    frames: u32,
    window: f32,
    samples: Vec<f32>,
}

/// FPS 汇总
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsSummary {
    pub mean: f32,
    pub min: f32,
    pub max: f32,
    pub samples: usize,
}

impl FpsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一帧；每满一秒产生一个样本并返回
    pub fn record(&mut self, delta: f32) -> Option<f32> {
        self.frames += 1;
        self.window += delta;
        if self.window < 1.0 {
            return None;
        }

        let fps = self.frames as f32;
        self.samples.push(fps);
        self.frames = 0;
        self.window = 0.0;
        Some(fps)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// 至少有一个样本时返回汇总
    pub fn summary(&self) -> Option<FpsSummary> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f32 = self.samples.iter().sum();
        Some(FpsSummary {
            mean: sum / self.samples.len() as f32,
            min: self.samples.iter().copied().fold(f32::MAX, f32::min),
            max: self.samples.iter().copied().fold(0.0, f32::max),
            samples: self.samples.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_frame_clock_delta() {
        let mut clock = FrameClock::new();
        let start = clock.last;
        let delta = clock.tick_at(start + Duration::from_millis(250));
        assert!((delta - 0.25).abs() < 1e-6);
        assert!((clock.elapsed() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_fps_samples_once_per_second() {
        let mut tracker = FpsTracker::new();
        for _ in 0..59 {
            assert_eq!(tracker.record(1.0 / 60.0), None);
        }
        // 浮点累加可能略小于 1 秒
        let sample = tracker.record(1.0 / 60.0).or_else(|| tracker.record(1.0 / 60.0));
        assert!(matches!(sample, Some(fps) if fps == 60.0 || fps == 61.0));
    }

    #[test]
    fn test_summary() {
        let mut tracker = FpsTracker::new();
        assert!(tracker.summary().is_none());

        tracker.record(1.0);
        for _ in 0..3 {
            tracker.record(0.5);
        }
        // 样本：1 帧，然后 2 帧
        let summary = tracker.summary().unwrap();
        assert_eq!(summary.samples, 2);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 2.0);
        assert_eq!(summary.mean, 1.5);
    }
}
