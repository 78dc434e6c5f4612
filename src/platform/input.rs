//! 输入状态
//!
//! 记录按住的按键、左键点击次数以及“引爆”阈值锁存。点击在松开时计数，
//! 达到阈值后锁存并停止计数。

use std::collections::HashSet;
use winit::keyboard::KeyCode;

/// 由按键状态得出的移动意图
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoveIntent {
    /// 前进为正
    pub forward: f32,
    /// 向右为正
    pub strafe: f32,
    pub sprint: bool,
}

#[derive(Debug, Clone)]
pub struct InputState {
    pressed: HashSet<KeyCode>,
    mouse_down: bool,
    clicks: u32,
    threshold: u32,
    triggered: bool,
}

impl InputState {
    /// `threshold` 次点击后触发；为 0 时立即触发
    pub fn new(threshold: u32) -> Self {
        Self {
            pressed: HashSet::new(),
            mouse_down: false,
            clicks: 0,
            threshold,
            triggered: threshold == 0,
        }
    }

    pub fn key_down(&mut self, key: KeyCode) {
        self.pressed.insert(key);
    }

    pub fn key_up(&mut self, key: KeyCode) {
        self.pressed.remove(&key);
    }

    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.pressed.contains(&key)
    }

    /// 左键状态变化；返回本次是否完成了一次点击
    pub fn mouse_button(&mut self, pressed: bool) -> bool {
        let released = self.mouse_down && !pressed;
        self.mouse_down = pressed;
        if !released || self.triggered {
            return false;
        }

        self.clicks += 1;
        if self.clicks >= self.threshold {
            self.triggered = true;
        }
        true
    }

    pub fn clicks(&self) -> u32 {
        self.clicks
    }

    /// 是否已达到点击阈值（锁存）
    pub fn threshold_reached(&self) -> bool {
        self.triggered
    }

    pub fn move_intent(&self) -> MoveIntent {
        let axis = |positive: KeyCode, negative: KeyCode| {
            f32::from(u8::from(self.is_pressed(positive))) - f32::from(u8::from(self.is_pressed(negative)))
        };
        MoveIntent {
            forward: axis(KeyCode::KeyW, KeyCode::KeyS),
            strafe: axis(KeyCode::KeyD, KeyCode::KeyA),
            sprint: self.is_pressed(KeyCode::ShiftLeft) || self.is_pressed(KeyCode::ShiftRight),
        }
    }

    /// 失去焦点时清空按键
    pub fn clear_keys(&mut self) {
        self.pressed.clear();
        self.mouse_down = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click(input: &mut InputState) -> bool {
        input.mouse_button(true);
        input.mouse_button(false)
    }

    #[test]
    fn test_clicks_counted_on_release() {
        let mut input = InputState::new(5);
        input.mouse_button(true);
        assert_eq!(input.clicks(), 0);
        assert!(input.mouse_button(false));
        assert_eq!(input.clicks(), 1);
        // 重复松开不计数
        assert!(!input.mouse_button(false));
        assert_eq!(input.clicks(), 1);
    }

    #[test]
    fn test_threshold_latches() {
        let mut input = InputState::new(5);
        for _ in 0..4 {
            click(&mut input);
        }
        assert!(!input.threshold_reached());
        click(&mut input);
        assert!(input.threshold_reached());

        assert!(!click(&mut input));
        assert_eq!(input.clicks(), 5);
        assert!(input.threshold_reached());
    }

    #[test]
    fn test_zero_threshold_starts_triggered() {
        assert!(InputState::new(0).threshold_reached());
    }

    #[test]
    fn test_move_intent() {
        let mut input = InputState::new(5);
        input.key_down(KeyCode::KeyW);
        input.key_down(KeyCode::KeyA);
        input.key_down(KeyCode::ShiftLeft);
        assert_eq!(
            input.move_intent(),
            MoveIntent {
                forward: 1.0,
                strafe: -1.0,
                sprint: true
            }
        );

        input.key_down(KeyCode::KeyS);
        input.key_up(KeyCode::ShiftLeft);
        let intent = input.move_intent();
        assert_eq!(intent.forward, 0.0);
        assert!(!intent.sprint);
    }
}
