//! 第一人称飞行相机（限制在地面平面上）

use crate::config::CameraConfig;
use crate::platform::input::MoveIntent;
use glam::{Mat4, Vec3};

const PITCH_LIMIT: f32 = 89.0;

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    /// 偏航角（度）
    pub yaw: f32,
    /// 俯仰角（度），限制在 ±89°
    pub pitch: f32,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    walk_speed: f32,
    sprint_speed: f32,
    sensitivity: f32,
}

impl Camera {
    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            position: config.position,
            yaw: config.yaw,
            pitch: config.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            fov: config.fov,
            near: config.near,
            far: config.far,
            walk_speed: config.walk_speed,
            sprint_speed: config.sprint_speed,
            sensitivity: config.sensitivity,
        }
    }

    /// 视线方向
    pub fn front(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.front().cross(Vec3::Y).normalize()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front(), Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), aspect, self.near, self.far)
    }

    /// 鼠标移动（像素，y 向下为正）
    pub fn apply_mouse(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch = (self.pitch - dy * self.sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// 按移动意图推进 `dt` 秒，结束后回到地面平面
    pub fn update(&mut self, intent: MoveIntent, dt: f32) {
        let speed = if intent.sprint {
            self.sprint_speed
        } else {
            self.walk_speed
        };
        let front = self.front();
        let right = self.right();
        self.position += (front * intent.forward + right * intent.strafe) * speed * dt;
        self.position.y = 0.0;
    }
}
